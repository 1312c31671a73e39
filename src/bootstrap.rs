// src/bootstrap.rs
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::ingest::dedup::Deduplicator;
use crate::ingest::fetcher::HttpFetcher;
use crate::ingest::types::FeedFetch;
use crate::ingest::{Ingestor, Scheduler};
use crate::notify::{Notifier, SiteLink, TelegramChannel};
use crate::store::{NewsStore, OfflineStore, RuntimeFlags, SettingsStore, SqliteStore};
use crate::translate::client::OpenAiCompatClient;
use crate::translate::Translator;

/// Everything the service needs, wired from one `AppConfig`.
pub struct NewsRuntime {
    pub cfg: AppConfig,
    pub scheduler: Scheduler,
}

impl NewsRuntime {
    /// Open the store and build the pipeline. A store that cannot be opened
    /// is replaced by an offline one, so ticks are skipped instead of the
    /// process exiting.
    pub async fn build(cfg: AppConfig) -> anyhow::Result<Self> {
        let (news, settings): (Arc<dyn NewsStore>, Arc<dyn SettingsStore>) =
            match SqliteStore::open(cfg.db_path()).await {
                Ok(store) => {
                    info!(db_path = cfg.db_path(), "news store opened");
                    let store = Arc::new(store);
                    (store.clone(), store)
                }
                Err(e) => {
                    warn!(db_path = cfg.db_path(), error = ?e, "news store unreachable, running offline");
                    let offline = Arc::new(OfflineStore::new(format!("{e:#}")));
                    (offline.clone(), offline)
                }
            };

        let fetcher: Arc<dyn FeedFetch> = Arc::new(HttpFetcher::new(cfg.ingest.fetch_timeout_secs)?);
        Self::with_parts(cfg, fetcher, news, settings)
    }

    /// Build over caller-supplied fetcher and stores. Network clients for
    /// translation and notification are still derived from `cfg`.
    pub fn with_parts(
        cfg: AppConfig,
        fetcher: Arc<dyn FeedFetch>,
        news: Arc<dyn NewsStore>,
        settings: Arc<dyn SettingsStore>,
    ) -> anyhow::Result<Self> {
        let flags = RuntimeFlags::new(settings);

        let translator = match cfg.translator.credentials() {
            Some((base, key)) => {
                let client = OpenAiCompatClient::new(
                    base,
                    key,
                    cfg.translator.model(),
                    cfg.translator.timeout_secs,
                )?;
                let translator = Translator::new(Arc::new(client), cfg.translator.batch_size);
                info!(
                    model = cfg.translator.model(),
                    batch = translator.batch_size(),
                    "translator configured"
                );
                translator
            }
            None => {
                debug!("translator credentials absent, foreign items stored untranslated");
                Translator::disabled()
            }
        };

        let site = SiteLink {
            url: cfg.notifier.site_url().to_string(),
            name: cfg.notifier.site_name().to_string(),
        };
        let notifier = match cfg.notifier.credentials() {
            Some((token, chat)) => {
                let channel = TelegramChannel::new(
                    &cfg.notifier.api_base,
                    token,
                    chat,
                    cfg.notifier.timeout_secs,
                )?;
                info!(chat, "telegram notifier configured");
                Notifier::new(Arc::new(channel), flags.clone(), site)
            }
            None => {
                debug!("telegram credentials absent, notifications off");
                Notifier::disabled(flags.clone(), site)
            }
        };

        let translating = translator.is_enabled();
        let dedup = Deduplicator::new(cfg.ingest.dedup_window, cfg.ingest.max_items_per_source);
        let ingestor = Arc::new(Ingestor::new(fetcher, news, dedup, translator, notifier));
        let scheduler = Scheduler::new(ingestor, flags, cfg.sources.clone(), cfg.scheduler.to_cfg());
        info!(
            sources = scheduler.sources().len(),
            translating,
            "ingestion pipeline wired"
        );

        Ok(Self { cfg, scheduler })
    }
}
