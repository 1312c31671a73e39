// src/ingest/dedup.rs
use std::collections::HashSet;

use anyhow::{Context, Result};
use metrics::counter;

use crate::ingest::types::RawItem;
use crate::store::NewsStore;

/// Bounded-window title dedup against the news store.
#[derive(Debug, Clone, Copy)]
pub struct Deduplicator {
    /// How many of the most recent titles (all sources) are checked.
    pub window: usize,
    /// Per-source, per-cycle candidate cap.
    pub max_items: usize,
}

impl Deduplicator {
    pub fn new(window: usize, max_items: usize) -> Self {
        Self {
            window: window.max(1),
            max_items: max_items.max(1),
        }
    }

    /// Cap to the first `max_items`, then drop titles already present in the
    /// window (or repeated within `items`). Feed order is preserved.
    pub async fn filter(&self, store: &dyn NewsStore, items: Vec<RawItem>) -> Result<Vec<RawItem>> {
        let capped: Vec<RawItem> = items.into_iter().take(self.max_items).collect();
        if capped.is_empty() {
            return Ok(capped);
        }

        let known = store
            .recent_titles(self.window)
            .await
            .context("loading dedup window")?;
        let (kept, dropped) = filter_known(capped, known.into_iter().collect());

        counter!("news_dedup_dropped_total").increment(dropped as u64);
        Ok(kept)
    }
}

/// Exact title match; returns `(kept, dropped_count)`.
pub fn filter_known(items: Vec<RawItem>, mut seen: HashSet<String>) -> (Vec<RawItem>, usize) {
    let before = items.len();
    let kept: Vec<RawItem> = items
        .into_iter()
        .filter(|it| seen.insert(it.title.clone()))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}
