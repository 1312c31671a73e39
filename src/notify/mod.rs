// src/notify/mod.rs
//! Best-effort fan-out of freshly persisted records to a chat channel.

pub mod telegram;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use html_escape::{encode_double_quoted_attribute, encode_text};
use metrics::counter;
use thiserror::Error;

use crate::ingest::types::NewsRecord;
use crate::store::RuntimeFlags;

pub use telegram::TelegramChannel;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("notification API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
}

#[async_trait]
pub trait ChatChannel: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
    fn name(&self) -> &'static str;
}

/// Link back to the host site appended to every message.
#[derive(Debug, Clone)]
pub struct SiteLink {
    pub url: String,
    pub name: String,
}

/// Render a record as a Telegram HTML message.
pub fn format_message(record: &NewsRecord, site: &SiteLink) -> String {
    let mut msg = format!(
        "{} <b>{}</b>\n\n",
        record.category.emoji(),
        encode_text(&record.title)
    );
    if let Some(summary) = record.summary.as_deref().filter(|s| !s.is_empty()) {
        msg.push_str(&encode_text(summary));
        msg.push_str("\n\n");
    }
    if let Some(url) = record.url.as_deref().filter(|u| !u.is_empty()) {
        msg.push_str(&format!(
            "🔗 <a href=\"{}\">阅读原文</a>\n",
            encode_double_quoted_attribute(url)
        ));
    }
    msg.push_str(&format!("📰 来源：{}\n", encode_text(&record.source)));
    msg.push_str(&format!(
        "🌐 <a href=\"{}\">{}</a>",
        encode_double_quoted_attribute(&site.url),
        encode_text(&site.name)
    ));
    msg
}

/// Flag-gated notifier. Never returns an error to the caller.
#[derive(Clone)]
pub struct Notifier {
    channel: Option<Arc<dyn ChatChannel>>,
    flags: RuntimeFlags,
    site: SiteLink,
}

impl Notifier {
    pub fn new(channel: Arc<dyn ChatChannel>, flags: RuntimeFlags, site: SiteLink) -> Self {
        Self {
            channel: Some(channel),
            flags,
            site,
        }
    }

    /// No credentials: every `notify` is a no-op.
    pub fn disabled(flags: RuntimeFlags, site: SiteLink) -> Self {
        Self {
            channel: None,
            flags,
            site,
        }
    }

    pub async fn notify(&self, record: &NewsRecord) {
        let Some(channel) = &self.channel else {
            return;
        };

        match self.flags.notification_enabled().await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(target: "ingest", id = record.id, "notifications disabled by flag");
                return;
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, "notification flag unreadable, not sending");
                return;
            }
        }

        let text = format_message(record, &self.site);
        match channel.send(&text).await {
            Ok(()) => {
                counter!("news_notify_sent_total").increment(1);
                tracing::debug!(target: "ingest", id = record.id, channel = channel.name(), "notification sent");
            }
            Err(e) => {
                counter!("news_notify_errors_total").increment(1);
                tracing::warn!(
                    target: "ingest",
                    id = record.id,
                    channel = channel.name(),
                    error = %e,
                    "notification failed"
                );
            }
        }
    }
}

/// Records every message instead of sending it; can be told to fail.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ChatChannel for RecordingChannel {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
        if self.fail {
            return Err(NotifyError::Api {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Category;
    use crate::store::{MemoryStore, FLAG_NOTIFICATION_ENABLED};
    use chrono::Utc;

    fn record() -> NewsRecord {
        NewsRecord {
            id: 7,
            title: "SEC <delays> ETF & more".to_string(),
            source_title: None,
            summary: Some("Decision pushed".to_string()),
            source: "Cointelegraph".to_string(),
            url: Some("https://example.com/a?b=1&c=2".to_string()),
            category: Category::Policy,
            is_pinned: false,
            is_active: true,
            published_at: Utc::now(),
            created_at: Utc::now(),
        }
    }

    fn site() -> SiteLink {
        SiteLink {
            url: "https://news.example.com".to_string(),
            name: "Example News".to_string(),
        }
    }

    #[test]
    fn message_is_escaped_and_complete() {
        let msg = format_message(&record(), &site());
        assert!(msg.starts_with("🏛 <b>SEC &lt;delays&gt; ETF &amp; more</b>"));
        assert!(msg.contains("Decision pushed"));
        assert!(msg.contains(r#"href="https://example.com/a?b=1&amp;c=2""#));
        assert!(msg.contains("来源：Cointelegraph"));
        assert!(msg.ends_with(r#"<a href="https://news.example.com">Example News</a>"#));
    }

    #[test]
    fn empty_summary_and_url_are_omitted() {
        let mut r = record();
        r.summary = None;
        r.url = None;
        let msg = format_message(&r, &site());
        assert!(!msg.contains("阅读原文"));
        assert!(!msg.contains("\n\n\n"));
    }

    #[tokio::test]
    async fn flag_off_suppresses_send() {
        let store = Arc::new(MemoryStore::new());
        store.set_setting(FLAG_NOTIFICATION_ENABLED, "false");
        let channel = Arc::new(RecordingChannel::new());
        let n = Notifier::new(channel.clone(), RuntimeFlags::new(store.clone()), site());

        n.notify(&record()).await;
        assert!(channel.sent().is_empty());

        // Re-read per call, not cached.
        store.set_setting(FLAG_NOTIFICATION_ENABLED, "true");
        n.notify(&record()).await;
        assert_eq!(channel.sent().len(), 1);
    }

    #[tokio::test]
    async fn channel_failure_is_swallowed() {
        let store = Arc::new(MemoryStore::new());
        let channel = Arc::new(RecordingChannel::failing());
        let n = Notifier::new(channel.clone(), RuntimeFlags::new(store), site());
        n.notify(&record()).await;
        assert_eq!(channel.sent().len(), 1);
    }
}
