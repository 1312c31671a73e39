// src/ingest/fetcher.rs
use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;

use crate::ingest::types::{FeedFetch, FeedSource};

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 12;
const USER_AGENT: &str = concat!(
    "crypto-news-ingest/",
    env!("CARGO_PKG_VERSION"),
    " (RSS aggregator)"
);

/// HTTP feed fetcher with a bounded per-request timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(timeout_secs.min(5)))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("building feed http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetch for HttpFetcher {
    async fn fetch(&self, source: &FeedSource) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(&source.url)
            .header(
                reqwest::header::ACCEPT,
                "application/rss+xml, application/atom+xml, application/xml;q=0.9, */*;q=0.8",
            )
            .send()
            .await
            .with_context(|| format!("GET {}", source.url))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("feed {} returned HTTP {status}", source.name));
        }
        let body = resp
            .bytes()
            .await
            .with_context(|| format!("reading body of {}", source.url))?;
        Ok(body.to_vec())
    }
}

/// Serves canned documents keyed by feed URL; unknown URLs fail like a
/// network error. Used for fixture runs and tests.
#[derive(Default)]
pub struct FixtureFetcher {
    docs: HashMap<String, Vec<u8>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doc(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.docs.insert(url.to_string(), body.into());
        self
    }
}

#[async_trait]
impl FeedFetch for FixtureFetcher {
    async fn fetch(&self, source: &FeedSource) -> Result<Vec<u8>> {
        self.docs
            .get(&source.url)
            .cloned()
            .ok_or_else(|| anyhow!("no fixture for {}", source.url))
    }
}
