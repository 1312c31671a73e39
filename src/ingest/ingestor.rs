// src/ingest/ingestor.rs
//! Per-source orchestration: fetch → parse → cap + dedup → translate →
//! categorize → insert → notify. Failures stay inside the source (or the
//! single record) that caused them.

use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, gauge};

use crate::ingest::categorize::categorize;
use crate::ingest::dedup::Deduplicator;
use crate::ingest::lang::needs_translation;
use crate::ingest::parser::parse_feed;
use crate::ingest::types::{FeedFetch, FeedSource, NewNewsRecord, RawItem, SourceLanguage};
use crate::notify::Notifier;
use crate::store::NewsStore;
use crate::translate::{TranslationPair, Translator};

/// Per-cycle summary, used for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub sources: usize,
    pub inserted: usize,
    /// Sources whose fetch or dedup read failed.
    pub failed_sources: Vec<String>,
}

pub struct Ingestor {
    fetcher: Arc<dyn FeedFetch>,
    news: Arc<dyn NewsStore>,
    dedup: Deduplicator,
    translator: Translator,
    notifier: Notifier,
}

enum SourceError {
    Fetch(anyhow::Error),
    Dedup(anyhow::Error),
}

impl Ingestor {
    pub fn new(
        fetcher: Arc<dyn FeedFetch>,
        news: Arc<dyn NewsStore>,
        dedup: Deduplicator,
        translator: Translator,
        notifier: Notifier,
    ) -> Self {
        super::ensure_metrics_described();
        Self {
            fetcher,
            news,
            dedup,
            translator,
            notifier,
        }
    }

    /// Ingest one source; returns how many records were inserted.
    /// Never fails: problems are logged and count as zero inserts.
    pub async fn ingest(&self, source: &FeedSource) -> usize {
        match self.try_ingest(source).await {
            Ok(n) => n,
            Err(err) => {
                log_source_error(source, err);
                0
            }
        }
    }

    async fn try_ingest(&self, source: &FeedSource) -> Result<usize, SourceError> {
        let raw = self
            .fetcher
            .fetch(source)
            .await
            .map_err(SourceError::Fetch)?;

        let items = parse_feed(&raw, Utc::now());
        if items.is_empty() {
            tracing::warn!(target: "ingest", source = %source.name, bytes = raw.len(), "feed yielded no items");
            return Ok(0);
        }
        let parsed = items.len();

        let fresh = self
            .dedup
            .filter(self.news.as_ref(), items)
            .await
            .map_err(SourceError::Dedup)?;
        tracing::debug!(target: "ingest", source = %source.name, parsed, fresh = fresh.len(), "dedup done");
        if fresh.is_empty() {
            return Ok(0);
        }

        // Dedup keys on the feed's wording, so keep it across translation.
        let originals: Vec<String> = fresh.iter().map(|it| it.title.clone()).collect();
        let items = match source.language {
            SourceLanguage::Foreign => self.translate_foreign(fresh).await,
            SourceLanguage::Native => fresh,
        };

        let mut inserted = 0usize;
        for (item, original) in items.into_iter().zip(originals) {
            let category = categorize(&item.title, &item.summary);
            let record =
                NewNewsRecord::from_item(item, &source.name, category).with_source_title(original);
            let title = record.title.clone();
            match self.news.insert(record).await {
                Ok(saved) => {
                    inserted += 1;
                    counter!("news_records_inserted_total").increment(1);
                    self.notifier.notify(&saved).await;
                }
                Err(e) => {
                    counter!("news_insert_errors_total").increment(1);
                    tracing::warn!(target: "ingest", source = %source.name, %title, error = ?e, "insert failed");
                }
            }
        }
        Ok(inserted)
    }

    /// Translate the subset that needs it and merge back by position.
    async fn translate_foreign(&self, mut items: Vec<RawItem>) -> Vec<RawItem> {
        let positions: Vec<usize> = items
            .iter()
            .enumerate()
            .filter(|(_, it)| needs_translation(&format!("{} {}", it.title, it.summary)))
            .map(|(i, _)| i)
            .collect();
        if positions.is_empty() {
            return items;
        }

        let pairs: Vec<TranslationPair> = positions
            .iter()
            .map(|&i| TranslationPair::new(&items[i].title, &items[i].summary))
            .collect();
        let translated = self.translator.translate_all(pairs).await;

        for (&i, pair) in positions.iter().zip(translated) {
            items[i].title = pair.title;
            items[i].summary = pair.summary;
        }
        items
    }

    /// One pass over `sources`, sequentially and in list order.
    pub async fn run_cycle(&self, sources: &[FeedSource]) -> CycleReport {
        let mut report = CycleReport {
            sources: sources.len(),
            ..CycleReport::default()
        };
        for source in sources {
            match self.try_ingest(source).await {
                Ok(n) => {
                    report.inserted += n;
                    tracing::info!(target: "ingest", source = %source.name, inserted = n, "source ingested");
                }
                Err(err) => {
                    log_source_error(source, err);
                    report.failed_sources.push(source.name.clone());
                }
            }
        }

        counter!("news_cycles_total").increment(1);
        gauge!("news_cycle_last_run_ts").set(Utc::now().timestamp() as f64);
        report
    }
}

fn log_source_error(source: &FeedSource, err: SourceError) {
    match err {
        SourceError::Fetch(e) => {
            counter!("news_fetch_errors_total").increment(1);
            tracing::warn!(target: "ingest", source = %source.name, error = ?e, "feed fetch failed, continuing");
        }
        SourceError::Dedup(e) => {
            tracing::warn!(target: "ingest", source = %source.name, error = ?e, "dedup read failed, skipping source");
        }
    }
}
