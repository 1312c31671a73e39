use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use super::{NewsStore, SettingsStore};
use crate::ingest::types::{NewNewsRecord, NewsRecord};

/// In-process store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<NewsRecord>>,
    settings: Mutex<HashMap<String, String>>,
    fail_inserts_for: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_setting(&self, key: &str, value: &str) {
        self.settings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
    }

    /// Make every insert whose title equals `title` fail.
    pub fn fail_insert_of(&self, title: &str) {
        self.fail_inserts_for
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(title.to_string());
    }

    pub fn records(&self) -> Vec<NewsRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl NewsStore for MemoryStore {
    async fn recent_titles(&self, limit: usize) -> Result<Vec<String>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .iter()
            .rev()
            .take(limit)
            .flat_map(|r| std::iter::once(r.title.clone()).chain(r.source_title.clone()))
            .collect())
    }

    async fn insert(&self, record: NewNewsRecord) -> Result<NewsRecord> {
        let failing = self
            .fail_inserts_for
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&record.title);
        if failing {
            return Err(anyhow!("insert rejected for {:?}", record.title));
        }

        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let saved = NewsRecord {
            id: records.len() as i64 + 1,
            title: record.title,
            source_title: record.source_title,
            summary: record.summary,
            source: record.source,
            url: record.url,
            category: record.category,
            is_pinned: false,
            is_active: true,
            published_at: record.published_at,
            created_at: Utc::now(),
        };
        records.push(saved.clone());
        Ok(saved)
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .settings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }
}

/// Stand-in used when the real store could not be opened at startup.
/// Every call fails, so each scheduler tick is skipped instead of the
/// process crash-looping.
pub struct OfflineStore {
    reason: String,
}

impl OfflineStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl NewsStore for OfflineStore {
    async fn recent_titles(&self, _limit: usize) -> Result<Vec<String>> {
        Err(anyhow!("news store offline: {}", self.reason))
    }

    async fn insert(&self, _record: NewNewsRecord) -> Result<NewsRecord> {
        Err(anyhow!("news store offline: {}", self.reason))
    }
}

#[async_trait]
impl SettingsStore for OfflineStore {
    async fn get_setting(&self, _key: &str) -> Result<Option<String>> {
        Err(anyhow!("settings store offline: {}", self.reason))
    }
}
