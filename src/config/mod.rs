// src/config/mod.rs
//! Deployment configuration: one TOML (or JSON) file plus environment
//! overrides for endpoints and secrets.

use std::{env, fs, path::Path};

use anyhow::Context;
use serde::Deserialize;

use crate::ingest::config::{clean_sources, default_sources, IngestConfig};
use crate::ingest::scheduler::SchedulerCfg;
use crate::ingest::types::FeedSource;
use crate::notify::telegram::DEFAULT_API_BASE;
use crate::translate::DEFAULT_BATCH_SIZE;

pub const ENV_CONFIG_PATH: &str = "NEWS_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/news.toml";

/// Placeholder meaning "read this value from the environment".
const ENV_SENTINEL: &str = "ENV";

const DEFAULT_DB_PATH: &str = "data/news.db";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_SITE_URL: &str = "https://example.com";
const DEFAULT_SITE_NAME: &str = "Crypto News";

fn default_interval() -> u64 {
    1800
}
fn default_initial_delay() -> u64 {
    10
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_translator_timeout() -> u64 {
    30
}
fn default_notifier_timeout() -> u64 {
    10
}
fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            initial_delay_secs: default_initial_delay(),
        }
    }
}

impl SchedulerConfig {
    pub fn to_cfg(&self) -> SchedulerCfg {
        SchedulerCfg {
            interval: std::time::Duration::from_secs(self.interval_secs),
            initial_delay: std::time::Duration::from_secs(self.initial_delay_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslatorConfig {
    /// OpenAI-compatible base URL, e.g. `https://api.openai.com/v1`.
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_translator_timeout")]
    pub timeout_secs: u64,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            api_key: None,
            model: None,
            batch_size: default_batch_size(),
            timeout_secs: default_translator_timeout(),
        }
    }
}

impl TranslatorConfig {
    /// `(base, key)` when both are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.api_base.as_deref(), self.api_key.as_deref()) {
            (Some(base), Some(key)) => Some((base, key)),
            _ => None,
        }
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_notifier_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            channel_id: None,
            api_base: default_api_base(),
            timeout_secs: default_notifier_timeout(),
            site_url: None,
            site_name: None,
        }
    }
}

impl NotifierConfig {
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.bot_token.as_deref(), self.channel_id.as_deref()) {
            (Some(token), Some(chat)) => Some((token, chat)),
            _ => None,
        }
    }

    pub fn site_url(&self) -> &str {
        self.site_url.as_deref().unwrap_or(DEFAULT_SITE_URL)
    }

    pub fn site_name(&self) -> &str {
        self.site_name.as_deref().unwrap_or(DEFAULT_SITE_NAME)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub db_path: Option<String>,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub translator: TranslatorConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub sources: Vec<FeedSource>,
}

impl AppConfig {
    /// `$NEWS_CONFIG_PATH`, then `config/news.toml`, then built-in defaults.
    pub fn load_default() -> anyhow::Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            return Self::load_from(&p);
        }
        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            return Self::load_from(DEFAULT_CONFIG_PATH);
        }
        tracing::info!("no config file found, using built-in defaults");
        Ok(Self::default().finish())
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            Self::from_json_str(&data)
        } else {
            Self::from_toml_str(&data)
        }
        .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg)
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(s)?;
        Ok(cfg.finish())
    }

    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = serde_json::from_str(s)?;
        Ok(cfg.finish())
    }

    /// Resolve environment placeholders and sanitize tunables.
    fn finish(mut self) -> Self {
        self.db_path = resolve(self.db_path, "NEWS_DB_PATH");
        self.translator.api_base = resolve(self.translator.api_base, "TRANSLATE_API_BASE");
        self.translator.api_key = resolve(self.translator.api_key, "TRANSLATE_API_KEY");
        self.translator.model = resolve(self.translator.model, "TRANSLATE_MODEL");
        self.notifier.bot_token = resolve(self.notifier.bot_token, "TELEGRAM_BOT_TOKEN");
        self.notifier.channel_id = resolve(self.notifier.channel_id, "TELEGRAM_CHANNEL_ID");
        self.notifier.site_url = resolve(self.notifier.site_url, "NEWS_SITE_URL");

        if self.scheduler.interval_secs == 0 {
            self.scheduler.interval_secs = default_interval();
        }
        if self.translator.batch_size == 0 {
            self.translator.batch_size = default_batch_size();
        }
        if self.translator.timeout_secs == 0 {
            self.translator.timeout_secs = default_translator_timeout();
        }
        if self.notifier.timeout_secs == 0 {
            self.notifier.timeout_secs = default_notifier_timeout();
        }
        self.ingest = self.ingest.sanitized();

        self.sources = clean_sources(std::mem::take(&mut self.sources));
        if self.sources.is_empty() {
            self.sources = default_sources();
        }
        self
    }

    pub fn db_path(&self) -> &str {
        self.db_path.as_deref().unwrap_or(DEFAULT_DB_PATH)
    }
}

/// Literal values win; absent, blank or `"ENV"` values come from `var`.
fn resolve(value: Option<String>, var: &str) -> Option<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() && !v.eq_ignore_ascii_case(ENV_SENTINEL) => Some(v),
        _ => env::var(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
    }
}
