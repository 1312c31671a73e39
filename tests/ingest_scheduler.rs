// tests/ingest_scheduler.rs
//
// Gating, overlap and timing of the ingestion scheduler.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Notify;

use crypto_news_ingest::ingest::dedup::Deduplicator;
use crypto_news_ingest::ingest::scheduler::SchedulerCfg;
use crypto_news_ingest::ingest::types::{FeedFetch, FeedSource, SourceLanguage};
use crypto_news_ingest::ingest::{Ingestor, Scheduler, SkipReason, TickOutcome};
use crypto_news_ingest::notify::{Notifier, SiteLink};
use crypto_news_ingest::store::{
    MemoryStore, OfflineStore, RuntimeFlags, SettingsStore, FLAG_INGESTION_ENABLED,
};
use crypto_news_ingest::translate::Translator;

const FEED: &str = include_str!("fixtures/native_zh.xml");

/// Serves the native fixture and counts calls. Optionally blocks until
/// released, or panics on its first call.
#[derive(Default)]
struct TestFetcher {
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
    panic_first: bool,
}

#[async_trait]
impl FeedFetch for TestFetcher {
    async fn fetch(&self, _source: &FeedSource) -> Result<Vec<u8>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_first && n == 0 {
            panic!("fetcher blew up");
        }
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(FEED.as_bytes().to_vec())
    }
}

fn scheduler(
    fetcher: Arc<TestFetcher>,
    store: Arc<MemoryStore>,
    settings: Arc<dyn SettingsStore>,
    cfg: SchedulerCfg,
) -> Scheduler {
    let flags = RuntimeFlags::new(settings);
    let site = SiteLink {
        url: "https://news.example.com".into(),
        name: "Example".into(),
    };
    let ingestor = Ingestor::new(
        fetcher,
        store,
        Deduplicator::new(200, 20),
        Translator::disabled(),
        Notifier::disabled(flags.clone(), site),
    );
    Scheduler::new(
        Arc::new(ingestor),
        flags,
        vec![FeedSource::new(
            "链闻",
            "https://native.example.com/rss",
            SourceLanguage::Native,
        )],
        cfg,
    )
}

#[tokio::test]
async fn disabled_flag_means_no_fetch_and_no_write() {
    let fetcher = Arc::new(TestFetcher::default());
    let store = Arc::new(MemoryStore::new());
    store.set_setting(FLAG_INGESTION_ENABLED, "false");
    let s = scheduler(fetcher.clone(), store.clone(), store.clone(), SchedulerCfg::default());

    assert_eq!(s.tick().await, TickOutcome::Skipped(SkipReason::Disabled));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    assert!(store.is_empty());
    assert_eq!(s.state().cycles_skipped(), 1);

    // Re-read on every tick.
    store.set_setting(FLAG_INGESTION_ENABLED, " TRUE ");
    match s.tick().await {
        TickOutcome::Ran(report) => assert_eq!(report.inserted, 3),
        other => panic!("expected a cycle, got {other:?}"),
    }
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn missing_flag_defaults_to_enabled() {
    let fetcher = Arc::new(TestFetcher::default());
    let store = Arc::new(MemoryStore::new());
    let s = scheduler(fetcher.clone(), store.clone(), store.clone(), SchedulerCfg::default());

    assert!(matches!(s.tick().await, TickOutcome::Ran(_)));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreadable_settings_skip_the_cycle() {
    let fetcher = Arc::new(TestFetcher::default());
    let store = Arc::new(MemoryStore::new());
    let s = scheduler(
        fetcher.clone(),
        store.clone(),
        Arc::new(OfflineStore::new("connection refused")),
        SchedulerCfg::default(),
    );

    assert_eq!(
        s.tick().await,
        TickOutcome::Skipped(SkipReason::FlagUnavailable)
    );
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    assert!(!s.state().in_progress());
}

#[tokio::test]
async fn overlapping_tick_is_skipped() {
    let gate = Arc::new(Notify::new());
    let fetcher = Arc::new(TestFetcher {
        gate: Some(gate.clone()),
        ..TestFetcher::default()
    });
    let store = Arc::new(MemoryStore::new());
    let s = scheduler(fetcher.clone(), store.clone(), store.clone(), SchedulerCfg::default());

    let first = {
        let s = s.clone();
        tokio::spawn(async move { s.tick().await })
    };
    while fetcher.calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    assert!(s.state().in_progress());

    assert_eq!(
        s.tick().await,
        TickOutcome::Skipped(SkipReason::AlreadyRunning)
    );

    gate.notify_one();
    let outcome = first.await.unwrap();
    assert!(matches!(outcome, TickOutcome::Ran(_)));
    assert!(!s.state().in_progress());
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn timer_honours_initial_delay_and_interval() {
    let fetcher = Arc::new(TestFetcher::default());
    let store = Arc::new(MemoryStore::new());
    let s = scheduler(
        fetcher.clone(),
        store.clone(),
        store.clone(),
        SchedulerCfg {
            interval: Duration::from_secs(60),
            initial_delay: Duration::from_secs(5),
        },
    );
    let state = s.state();
    let handle = s.spawn();

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(state.cycles_run(), 0);

    // Cycles at t=5, 65 and 125.
    tokio::time::sleep(Duration::from_secs(146)).await;
    assert_eq!(state.cycles_run(), 3);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    // Only the first cycle found anything new.
    assert_eq!(store.len(), 3);

    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn panicking_cycle_does_not_stop_the_timer() {
    let fetcher = Arc::new(TestFetcher {
        panic_first: true,
        ..TestFetcher::default()
    });
    let store = Arc::new(MemoryStore::new());
    let s = scheduler(
        fetcher.clone(),
        store.clone(),
        store.clone(),
        SchedulerCfg {
            interval: Duration::from_secs(60),
            initial_delay: Duration::from_secs(1),
        },
    );
    let state = s.state();
    let handle = s.spawn();

    tokio::time::sleep(Duration::from_secs(90)).await;
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    assert_eq!(state.cycles_run(), 1);
    assert!(!state.in_progress());
    assert_eq!(store.len(), 3);

    handle.abort();
}
