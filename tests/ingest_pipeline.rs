// tests/ingest_pipeline.rs
//
// End-to-end runs of the per-source pipeline over fixture feeds and
// in-memory doubles. No network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crypto_news_ingest::ingest::dedup::Deduplicator;
use crypto_news_ingest::ingest::fetcher::FixtureFetcher;
use crypto_news_ingest::ingest::types::{Category, FeedFetch, FeedSource, SourceLanguage};
use crypto_news_ingest::ingest::Ingestor;
use crypto_news_ingest::notify::{Notifier, RecordingChannel, SiteLink};
use crypto_news_ingest::store::{MemoryStore, RuntimeFlags, FLAG_NOTIFICATION_ENABLED};
use crypto_news_ingest::translate::client::ScriptedLlm;
use crypto_news_ingest::translate::Translator;

const NATIVE_URL: &str = "https://native.example.com/rss";
const FOREIGN_URL: &str = "https://wire.example.com/rss";
const BROKEN_URL: &str = "https://broken.example.com/rss";

fn native() -> FeedSource {
    FeedSource::new("链闻", NATIVE_URL, SourceLanguage::Native)
}

fn foreign() -> FeedSource {
    FeedSource::new("Wire", FOREIGN_URL, SourceLanguage::Foreign)
}

fn fixtures() -> FixtureFetcher {
    FixtureFetcher::new()
        .with_doc(NATIVE_URL, include_str!("fixtures/native_zh.xml"))
        .with_doc(FOREIGN_URL, include_str!("fixtures/foreign_en.xml"))
        .with_doc(BROKEN_URL, include_str!("fixtures/malformed.xml"))
}

fn site() -> SiteLink {
    SiteLink {
        url: "https://news.example.com".into(),
        name: "Example".into(),
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    channel: Arc<RecordingChannel>,
    ingestor: Ingestor,
}

fn harness(fetcher: Arc<dyn FeedFetch>, translator: Translator) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let channel = Arc::new(RecordingChannel::new());
    let flags = RuntimeFlags::new(store.clone());
    let notifier = Notifier::new(channel.clone(), flags, site());
    let ingestor = Ingestor::new(
        fetcher,
        store.clone(),
        Deduplicator::new(200, 20),
        translator,
        notifier,
    );
    Harness {
        store,
        channel,
        ingestor,
    }
}

const ZH_REPLY: &str = r#"{"translations":[
  {"title":"美国证监会推迟现货以太坊ETF决议","summary":"监管机构将截止日期推迟45天。"},
  {"title":"Uniswap交易量创纪录","summary":"该协议处理的交易量创历史新高。"},
  {"title":"无聊猿地板价下滑","summary":"NFT收藏者正在撤退。"},
  {"title":"币安上线新的永续合约","summary":"三个合约将于周五上线。"},
  {"title":"比特币矿工准备迎接难度上调","summary":"算力持续攀升。"}
]}"#;

#[tokio::test]
async fn native_feed_is_stored_categorized_and_notified() {
    let h = harness(Arc::new(fixtures()), Translator::disabled());

    let n = h.ingestor.ingest(&native()).await;
    assert_eq!(n, 3);

    let records = h.store.records();
    assert_eq!(records[0].title, "比特币突破新高");
    assert_eq!(records[0].category, Category::Market);
    assert_eq!(records[0].source, "链闻");
    assert_eq!(
        records[0].summary.as_deref(),
        Some("比特币价格今日突破历史新高，市场情绪高涨。")
    );
    assert_eq!(records[1].category, Category::Policy);
    assert_eq!(records[2].category, Category::Exchange);

    let sent = h.channel.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent[0].contains("比特币突破新高"));
}

#[tokio::test]
async fn rerun_on_unchanged_feed_inserts_nothing() {
    let h = harness(Arc::new(fixtures()), Translator::disabled());

    assert_eq!(h.ingestor.ingest(&native()).await, 3);
    assert_eq!(h.ingestor.ingest(&native()).await, 0);
    assert_eq!(h.store.len(), 3);
    assert_eq!(h.channel.sent().len(), 3);
}

#[tokio::test]
async fn foreign_items_are_translated_before_categorizing() {
    let llm = Arc::new(ScriptedLlm::new(vec![Some(ZH_REPLY.to_string())]));
    let h = harness(Arc::new(fixtures()), Translator::new(llm.clone(), 5));

    assert_eq!(h.ingestor.ingest(&foreign()).await, 5);
    assert_eq!(llm.prompts().len(), 1);

    let records = h.store.records();
    assert_eq!(records[0].title, "美国证监会推迟现货以太坊ETF决议");
    assert_eq!(records[0].category, Category::Policy);
    assert_eq!(records[1].category, Category::Defi);
    assert_eq!(records[2].category, Category::Nft);
    assert_eq!(records[3].category, Category::Exchange);
    // Link and attribution are never translated.
    assert_eq!(
        records[0].url.as_deref(),
        Some("https://wire.example.com/sec-ether-etf")
    );
    assert_eq!(records[0].source, "Wire");
}

#[tokio::test]
async fn rerun_on_translated_feed_inserts_nothing() {
    let llm = Arc::new(ScriptedLlm::new(vec![Some(ZH_REPLY.to_string())]));
    let h = harness(Arc::new(fixtures()), Translator::new(llm.clone(), 5));

    assert_eq!(h.ingestor.ingest(&foreign()).await, 5);
    assert_eq!(h.ingestor.ingest(&foreign()).await, 0);
    assert_eq!(h.store.len(), 5);
    assert_eq!(h.channel.sent().len(), 5);
    // Nothing new, so nothing is sent to the model the second time.
    assert_eq!(llm.prompts().len(), 1);

    let records = h.store.records();
    assert_eq!(
        records[0].source_title.as_deref(),
        Some("SEC delays decision on spot Ether ETF")
    );
}

#[tokio::test]
async fn unreachable_translator_stores_originals() {
    let llm = Arc::new(ScriptedLlm::unreachable());
    let h = harness(Arc::new(fixtures()), Translator::new(llm, 5));

    assert_eq!(h.ingestor.ingest(&foreign()).await, 5);
    let records = h.store.records();
    assert_eq!(records[0].title, "SEC delays decision on spot Ether ETF");
    assert_eq!(records[1].title, "Uniswap volume hits record");
}

#[tokio::test]
async fn short_reply_fails_the_whole_batch() {
    // Four translations for a batch of five: none may be applied.
    let four = r#"{"translations":[
      {"title":"一","summary":""},{"title":"二","summary":""},
      {"title":"三","summary":""},{"title":"四","summary":""}
    ]}"#;
    let llm = Arc::new(ScriptedLlm::new(vec![Some(four.to_string())]));
    let h = harness(Arc::new(fixtures()), Translator::new(llm, 5));

    assert_eq!(h.ingestor.ingest(&foreign()).await, 5);
    let titles: Vec<String> = h.store.records().into_iter().map(|r| r.title).collect();
    assert_eq!(
        titles,
        vec![
            "SEC delays decision on spot Ether ETF",
            "Uniswap volume hits record",
            "Bored Ape floor price slides",
            "Binance lists new perpetuals",
            "Bitcoin miners brace for difficulty jump",
        ]
    );
}

#[tokio::test]
async fn batches_fail_independently() {
    // Batch size 2 over five items: batches [0,1] [2,3] [4].
    let pair = |a: &str, b: &str| {
        format!(r#"{{"translations":[{{"title":"{a}","summary":""}},{{"title":"{b}","summary":""}}]}}"#)
    };
    let llm = Arc::new(ScriptedLlm::new(vec![
        Some(pair("甲", "乙")),
        None,
        Some(r#"[{"title":"戊","summary":"算力"}]"#.to_string()),
    ]));
    let h = harness(Arc::new(fixtures()), Translator::new(llm.clone(), 2));

    assert_eq!(h.ingestor.ingest(&foreign()).await, 5);
    assert_eq!(llm.prompts().len(), 3);
    let titles: Vec<String> = h.store.records().into_iter().map(|r| r.title).collect();
    assert_eq!(
        titles,
        vec![
            "甲",
            "乙",
            "Bored Ape floor price slides",
            "Binance lists new perpetuals",
            "戊",
        ]
    );
}

#[tokio::test]
async fn broken_source_does_not_affect_the_others() {
    let h = harness(Arc::new(fixtures()), Translator::disabled());
    let sources = vec![
        FeedSource::new("Gone", "https://gone.example.com/rss", SourceLanguage::Native),
        FeedSource::new("Broken", BROKEN_URL, SourceLanguage::Native),
        native(),
    ];

    let report = h.ingestor.run_cycle(&sources).await;
    assert_eq!(report.sources, 3);
    assert_eq!(report.inserted, 3);
    assert_eq!(report.failed_sources, vec!["Gone".to_string()]);
    assert_eq!(h.store.len(), 3);
}

#[tokio::test]
async fn failed_insert_skips_only_that_record() {
    let h = harness(Arc::new(fixtures()), Translator::disabled());
    h.store.fail_insert_of("美国证监会推迟以太坊ETF决议");

    assert_eq!(h.ingestor.ingest(&native()).await, 2);
    let titles: Vec<String> = h.store.records().into_iter().map(|r| r.title).collect();
    assert_eq!(titles, vec!["比特币突破新高", "某交易所上线新币种"]);
    assert_eq!(h.channel.sent().len(), 2);
}

#[tokio::test]
async fn notification_flag_off_still_persists() {
    let h = harness(Arc::new(fixtures()), Translator::disabled());
    h.store.set_setting(FLAG_NOTIFICATION_ENABLED, "false");

    assert_eq!(h.ingestor.ingest(&native()).await, 3);
    assert_eq!(h.store.len(), 3);
    assert!(h.channel.sent().is_empty());
}

#[tokio::test]
async fn failing_channel_does_not_roll_back_inserts() {
    let store = Arc::new(MemoryStore::new());
    let channel = Arc::new(RecordingChannel::failing());
    let notifier = Notifier::new(channel.clone(), RuntimeFlags::new(store.clone()), site());
    let ingestor = Ingestor::new(
        Arc::new(fixtures()),
        store.clone(),
        Deduplicator::new(200, 20),
        Translator::disabled(),
        notifier,
    );

    assert_eq!(ingestor.ingest(&native()).await, 3);
    assert_eq!(store.len(), 3);
    assert_eq!(channel.sent().len(), 3);
}

/// Counts fetches and serves one fixed document.
struct CountingFetcher {
    calls: AtomicUsize,
    body: &'static str,
}

#[async_trait]
impl FeedFetch for CountingFetcher {
    async fn fetch(&self, _source: &FeedSource) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.as_bytes().to_vec())
    }
}

#[tokio::test]
async fn per_source_cap_applies_before_dedup() {
    let fetcher = Arc::new(CountingFetcher {
        calls: AtomicUsize::new(0),
        body: include_str!("fixtures/foreign_en.xml"),
    });
    let store = Arc::new(MemoryStore::new());
    let ingestor = Ingestor::new(
        fetcher.clone(),
        store.clone(),
        Deduplicator::new(200, 2),
        Translator::disabled(),
        Notifier::disabled(RuntimeFlags::new(store.clone()), site()),
    );

    assert_eq!(ingestor.ingest(&foreign()).await, 2);
    // The first two are now known, so the cap yields nothing new.
    assert_eq!(ingestor.ingest(&foreign()).await, 0);
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    assert_eq!(store.len(), 2);
}
