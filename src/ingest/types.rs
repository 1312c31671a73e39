// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TITLE_MAX_CHARS: usize = 200;
pub const SUMMARY_MAX_CHARS: usize = 300;
pub const URL_MAX_CHARS: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceLanguage {
    #[default]
    Native,
    Foreign,
}

/// Deployment-time feed definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub language: SourceLanguage,
}

impl FeedSource {
    pub fn new(name: &str, url: &str, language: SourceLanguage) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            language,
        }
    }
}

/// One normalized feed entry, alive for a single cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub title: String,
    pub summary: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Market,
    Policy,
    Exchange,
    Defi,
    Nft,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Market,
        Category::Policy,
        Category::Exchange,
        Category::Defi,
        Category::Nft,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Market => "market",
            Category::Policy => "policy",
            Category::Exchange => "exchange",
            Category::Defi => "defi",
            Category::Nft => "nft",
            Category::Other => "other",
        }
    }

    /// Unknown values map to the default category.
    pub fn parse(s: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .unwrap_or_default()
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Category::Market => "📈",
            Category::Policy => "🏛",
            Category::Exchange => "🏦",
            Category::Defi => "🧩",
            Category::Nft => "🖼",
            Category::Other => "📰",
        }
    }
}

/// Insert payload produced by the ingestor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNewsRecord {
    pub title: String,
    /// Feed title before translation; `None` when stored as fetched.
    pub source_title: Option<String>,
    pub summary: Option<String>,
    pub source: String,
    pub url: Option<String>,
    pub category: Category,
    pub published_at: DateTime<Utc>,
}

impl NewNewsRecord {
    pub fn from_item(item: RawItem, source: &str, category: Category) -> Self {
        Self {
            title: item.title,
            source_title: None,
            summary: Some(item.summary).filter(|s| !s.is_empty()),
            source: source.to_string(),
            url: Some(item.url).filter(|u| !u.is_empty()),
            category,
            published_at: item.published_at,
        }
    }

    /// Remember the feed's own title when it differs from the stored one.
    pub fn with_source_title(mut self, original: String) -> Self {
        self.source_title = Some(original).filter(|t| *t != self.title);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsRecord {
    pub id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_title: Option<String>,
    pub summary: Option<String>,
    pub source: String,
    pub url: Option<String>,
    pub category: Category,
    pub is_pinned: bool,
    pub is_active: bool,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait FeedFetch: Send + Sync {
    /// Raw document bytes for `source`.
    async fn fetch(&self, source: &FeedSource) -> Result<Vec<u8>>;
}
