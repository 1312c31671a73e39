// src/ingest/config.rs
use serde::Deserialize;

use crate::ingest::fetcher::DEFAULT_FETCH_TIMEOUT_SECS;
use crate::ingest::types::{FeedSource, SourceLanguage};

fn default_max_items() -> usize {
    20
}
fn default_window() -> usize {
    200
}
fn default_fetch_timeout() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

/// Per-cycle limits for the ingestor.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Candidates kept per source per cycle.
    #[serde(default = "default_max_items")]
    pub max_items_per_source: usize,
    /// Most recent titles checked for duplicates.
    #[serde(default = "default_window")]
    pub dedup_window: usize,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_items_per_source: default_max_items(),
            dedup_window: default_window(),
            fetch_timeout_secs: default_fetch_timeout(),
        }
    }
}

impl IngestConfig {
    pub fn sanitized(mut self) -> Self {
        if self.max_items_per_source == 0 {
            self.max_items_per_source = default_max_items();
        }
        if self.dedup_window == 0 {
            self.dedup_window = default_window();
        }
        if self.fetch_timeout_secs == 0 {
            self.fetch_timeout_secs = default_fetch_timeout();
        }
        self
    }
}

/// Built-in source list used when the config file names none.
pub fn default_sources() -> Vec<FeedSource> {
    vec![
        FeedSource::new(
            "Cointelegraph",
            "https://cointelegraph.com/rss",
            SourceLanguage::Foreign,
        ),
        FeedSource::new(
            "CoinDesk",
            "https://www.coindesk.com/arc/outboundfeeds/rss/",
            SourceLanguage::Foreign,
        ),
        FeedSource::new("Decrypt", "https://decrypt.co/feed", SourceLanguage::Foreign),
        FeedSource::new(
            "PANews",
            "https://www.panewslab.com/rss/zh/index.xml",
            SourceLanguage::Native,
        ),
    ]
}

/// Trim names/urls, drop incomplete entries, keep order.
pub fn clean_sources(sources: Vec<FeedSource>) -> Vec<FeedSource> {
    sources
        .into_iter()
        .filter_map(|s| {
            let name = s.name.trim();
            let url = s.url.trim();
            if name.is_empty() || url.is_empty() {
                return None;
            }
            Some(FeedSource::new(name, url, s.language))
        })
        .collect()
}
