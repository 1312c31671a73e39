// src/lib.rs
// Public library surface for the service binary, the one-shot tool and
// integration tests.

pub mod bootstrap;
pub mod config;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod store;
pub mod translate;

pub use crate::bootstrap::NewsRuntime;
pub use crate::config::AppConfig;
pub use crate::metrics::router;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `LOG_FORMAT=json` switches to JSON lines.
/// A subscriber installed by the host (e.g. Shuttle) is left in place.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("crypto_news_ingest=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
