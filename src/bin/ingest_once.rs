//! Run exactly one gated ingestion cycle against the configured store, then exit.
//! Suitable for cron or for checking a new source list by hand.

use crypto_news_ingest::ingest::TickOutcome;
use crypto_news_ingest::{init_tracing, AppConfig, NewsRuntime};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default()?;
    let runtime = NewsRuntime::build(cfg).await?;

    match runtime.scheduler.tick().await {
        TickOutcome::Ran(report) => {
            println!(
                "ingest-once: {} sources, {} inserted, {} failed {:?}",
                report.sources,
                report.inserted,
                report.failed_sources.len(),
                report.failed_sources
            );
        }
        TickOutcome::Skipped(reason) => {
            println!("ingest-once: cycle skipped ({reason:?})");
        }
    }
    Ok(())
}
