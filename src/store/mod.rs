// src/store/mod.rs
//! Store seams consumed by the pipeline: the shared news table (append-only
//! from our side) and the read-only runtime settings.

pub mod memory;
pub mod schema;
pub mod sqlite;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::ingest::types::{NewNewsRecord, NewsRecord};

pub use memory::{MemoryStore, OfflineStore};
pub use sqlite::SqliteStore;

pub const FLAG_INGESTION_ENABLED: &str = "ingestion_enabled";
pub const FLAG_NOTIFICATION_ENABLED: &str = "notification_enabled";

/// Value a flag resolves to when its key is absent.
pub const FLAG_DEFAULT: &str = "true";

#[async_trait]
pub trait NewsStore: Send + Sync {
    /// Titles of the `limit` most recently created records, newest first,
    /// across every source. A record stored under a translated title also
    /// contributes its original feed title.
    async fn recent_titles(&self, limit: usize) -> Result<Vec<String>>;

    /// Append one record. No uniqueness constraint is enforced here.
    async fn insert(&self, record: NewNewsRecord) -> Result<NewsRecord>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<String>>;
}

/// Parse a stored flag value. Only a (trimmed, case-insensitive) `"true"` enables.
pub fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Cooperative kill-switches, re-read on every call (never cached).
#[derive(Clone)]
pub struct RuntimeFlags {
    store: Arc<dyn SettingsStore>,
}

impl RuntimeFlags {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    pub async fn flag(&self, key: &str) -> Result<bool> {
        let value = self.store.get_setting(key).await?;
        Ok(parse_flag(value.as_deref().unwrap_or(FLAG_DEFAULT)))
    }

    pub async fn ingestion_enabled(&self) -> Result<bool> {
        self.flag(FLAG_INGESTION_ENABLED).await
    }

    pub async fn notification_enabled(&self) -> Result<bool> {
        self.flag(FLAG_NOTIFICATION_ENABLED).await
    }
}
