// src/ingest/scheduler.rs
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::ingest::types::FeedSource;
use crate::ingest::{CycleReport, Ingestor};
use crate::store::RuntimeFlags;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval: Duration,
    pub initial_delay: Duration,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30 * 60),
            initial_delay: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// `ingestion_enabled` is off.
    Disabled,
    /// The settings store could not be read.
    FlagUnavailable,
    /// A previous cycle is still running.
    AlreadyRunning,
}

impl SkipReason {
    fn label(self) -> &'static str {
        match self {
            SkipReason::Disabled => "disabled",
            SkipReason::FlagUnavailable => "flag_unavailable",
            SkipReason::AlreadyRunning => "already_running",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Ran(CycleReport),
    Skipped(SkipReason),
}

/// Mutable scheduler state, owned per scheduler instance.
#[derive(Debug, Default)]
pub struct SchedulerState {
    in_progress: AtomicBool,
    cycles_run: AtomicU64,
    cycles_skipped: AtomicU64,
}

impl SchedulerState {
    pub fn in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    pub fn cycles_run(&self) -> u64 {
        self.cycles_run.load(Ordering::SeqCst)
    }

    pub fn cycles_skipped(&self) -> u64 {
        self.cycles_skipped.load(Ordering::SeqCst)
    }
}

/// Clears `in_progress` on drop, including when a cycle panics.
struct CycleGuard(Arc<SchedulerState>);

impl CycleGuard {
    fn acquire(state: &Arc<SchedulerState>) -> Option<Self> {
        state
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| CycleGuard(state.clone()))
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.0.in_progress.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct Scheduler {
    ingestor: Arc<Ingestor>,
    flags: RuntimeFlags,
    sources: Arc<Vec<FeedSource>>,
    cfg: SchedulerCfg,
    state: Arc<SchedulerState>,
}

impl Scheduler {
    pub fn new(
        ingestor: Arc<Ingestor>,
        flags: RuntimeFlags,
        sources: Vec<FeedSource>,
        cfg: SchedulerCfg,
    ) -> Self {
        Self {
            ingestor,
            flags,
            sources: Arc::new(sources),
            cfg,
            state: Arc::new(SchedulerState::default()),
        }
    }

    pub fn state(&self) -> Arc<SchedulerState> {
        self.state.clone()
    }

    pub fn sources(&self) -> &[FeedSource] {
        &self.sources
    }

    fn skip(&self, reason: SkipReason) -> TickOutcome {
        self.state.cycles_skipped.fetch_add(1, Ordering::SeqCst);
        counter!("news_cycles_skipped_total", "reason" => reason.label()).increment(1);
        TickOutcome::Skipped(reason)
    }

    /// One gated ingestion cycle.
    pub async fn tick(&self) -> TickOutcome {
        let Some(_guard) = CycleGuard::acquire(&self.state) else {
            tracing::warn!(target: "ingest", "previous cycle still running, skipping tick");
            return self.skip(SkipReason::AlreadyRunning);
        };

        match self.flags.ingestion_enabled().await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(target: "ingest", "ingestion disabled by flag, cycle skipped");
                return self.skip(SkipReason::Disabled);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, "ingestion flag unreadable, cycle skipped");
                return self.skip(SkipReason::FlagUnavailable);
            }
        }

        let started = Instant::now();
        let report = self.ingestor.run_cycle(&self.sources).await;
        self.state.cycles_run.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            target: "ingest",
            sources = report.sources,
            inserted = report.inserted,
            failed = report.failed_sources.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ingestion cycle finished"
        );
        TickOutcome::Ran(report)
    }

    /// Arm the timer: first cycle after `initial_delay`, then every
    /// `interval`. Runs until the runtime shuts down.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let period = self.cfg.interval.max(Duration::from_secs(1));
            let mut ticker = interval_at(Instant::now() + self.cfg.initial_delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(
                target: "ingest",
                sources = self.sources.len(),
                interval_secs = period.as_secs(),
                "ingestion scheduler armed"
            );

            loop {
                ticker.tick().await;
                // Own task per cycle so a panic cannot take the loop down.
                let this = self.clone();
                if let Err(e) = tokio::spawn(async move { this.tick().await }).await {
                    tracing::error!(target: "ingest", error = %e, "ingestion cycle aborted");
                }
            }
        })
    }
}
