//! Crypto news ingestion service. Binary entrypoint.
//! Boots the scheduler in the background and serves `/health` + `/metrics`.

use crypto_news_ingest::metrics::Metrics;
use crypto_news_ingest::{init_tracing, router, AppConfig, NewsRuntime};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default()?;
    let metrics = match Metrics::init(cfg.scheduler.interval_secs) {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = ?e, "metrics recorder not installed");
            None
        }
    };

    let runtime = NewsRuntime::build(cfg).await?;
    if cfg!(feature = "ingest") {
        let _handle = runtime.scheduler.clone().spawn();
    } else {
        tracing::info!("built without the `ingest` feature, scheduler not started");
    }

    Ok(router(metrics.as_ref()).into())
}
