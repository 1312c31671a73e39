//! Batched LLM translation with all-or-nothing fallback per batch.
//!
//! A batch either comes back fully translated (same length, same order, every
//! title non-empty) or every item in it keeps its original text. Items are
//! never partially substituted from one reply.

pub mod client;

use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ingest::truncate_chars;
use crate::ingest::types::{SUMMARY_MAX_CHARS, TITLE_MAX_CHARS};
pub use client::{LlmClient, OpenAiCompatClient, ScriptedLlm};

pub const DEFAULT_BATCH_SIZE: usize = 5;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("translation API returned HTTP {0}")]
    Status(u16),
    #[error("translation API returned no content")]
    EmptyReply,
    #[error("translation reply is not the expected JSON shape: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("translation reply has {got} entries, expected {expected}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("translation entry {0} has an empty title")]
    EmptyTitle(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationPair {
    pub title: String,
    #[serde(default)]
    pub summary: String,
}

impl TranslationPair {
    pub fn new(title: &str, summary: &str) -> Self {
        Self {
            title: title.to_string(),
            summary: summary.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum BatchOutcome {
    Translated,
    /// No credentials configured; inputs returned untouched.
    Passthrough,
    /// The call or its decode failed; inputs returned untouched.
    Fallback(TranslateError),
}

impl BatchOutcome {
    fn label(&self) -> &'static str {
        match self {
            BatchOutcome::Translated => "translated",
            BatchOutcome::Passthrough => "passthrough",
            BatchOutcome::Fallback(_) => "fallback",
        }
    }
}

const SYSTEM_PROMPT: &str = "You are a professional translator for a Chinese-language crypto news site. \
Translate English crypto news into concise, natural Simplified Chinese. \
Keep project names, token tickers, numbers and URLs unchanged. \
Respond with strict JSON only: no markdown, no commentary.";

#[derive(Serialize)]
struct PromptEntry<'a> {
    index: usize,
    title: &'a str,
    summary: &'a str,
}

/// Build the user prompt for one batch.
pub fn build_prompt(batch: &[TranslationPair]) -> String {
    let entries: Vec<PromptEntry> = batch
        .iter()
        .enumerate()
        .map(|(index, p)| PromptEntry {
            index,
            title: &p.title,
            summary: &p.summary,
        })
        .collect();
    let input = serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Translate the {n} news items below into Simplified Chinese.\n\
         Return exactly this JSON object and nothing else:\n\
         {{\"translations\":[{{\"title\":\"...\",\"summary\":\"...\"}}]}}\n\
         The \"translations\" array MUST contain exactly {n} entries in the same order as the input \
         (entry i translates input index i). Use an empty string for an empty summary.\n\n\
         Input:\n{input}",
        n = batch.len()
    )
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct StrictPair {
    title: String,
    #[serde(default)]
    summary: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Reply {
    Wrapped { translations: Vec<StrictPair> },
    Bare(Vec<StrictPair>),
}

/// Strip an optional markdown code fence around the reply.
fn unfence(raw: &str) -> &str {
    let t = raw.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Typed decode of a model reply; any shape or length mismatch is an error.
pub fn decode_reply(raw: &str, expected: usize) -> Result<Vec<TranslationPair>, TranslateError> {
    let reply: Reply = serde_json::from_str(unfence(raw))?;
    let pairs = match reply {
        Reply::Wrapped { translations } => translations,
        Reply::Bare(v) => v,
    };
    if pairs.len() != expected {
        return Err(TranslateError::LengthMismatch {
            expected,
            got: pairs.len(),
        });
    }
    pairs
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            let title = p.title.trim().to_string();
            if title.is_empty() {
                return Err(TranslateError::EmptyTitle(i));
            }
            Ok(TranslationPair {
                title: truncate_chars(title, TITLE_MAX_CHARS),
                summary: truncate_chars(p.summary.trim().to_string(), SUMMARY_MAX_CHARS),
            })
        })
        .collect()
}

/// Translator front-end. Without a client every call is a passthrough.
#[derive(Clone)]
pub struct Translator {
    client: Option<Arc<dyn LlmClient>>,
    batch_size: usize,
}

impl Translator {
    pub fn new(client: Arc<dyn LlmClient>, batch_size: usize) -> Self {
        Self {
            client: Some(client),
            batch_size: batch_size.max(1),
        }
    }

    pub fn disabled() -> Self {
        Self {
            client: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Translate one batch. The returned vec always has `batch.len()` entries.
    pub async fn translate_batch(
        &self,
        batch: &[TranslationPair],
    ) -> (Vec<TranslationPair>, BatchOutcome) {
        let Some(client) = &self.client else {
            return (batch.to_vec(), BatchOutcome::Passthrough);
        };
        if batch.is_empty() {
            return (Vec::new(), BatchOutcome::Translated);
        }

        let prompt = build_prompt(batch);
        let result = match client.complete(SYSTEM_PROMPT, &prompt).await {
            Ok(raw) => decode_reply(&raw, batch.len()),
            Err(e) => Err(e),
        };
        match result {
            Ok(translated) => (translated, BatchOutcome::Translated),
            Err(e) => (batch.to_vec(), BatchOutcome::Fallback(e)),
        }
    }

    /// Translate `items` in sequential batches, preserving order and length.
    pub async fn translate_all(&self, items: Vec<TranslationPair>) -> Vec<TranslationPair> {
        if items.is_empty() {
            return items;
        }
        let Some(client) = &self.client else {
            tracing::debug!(
                target: "ingest",
                items = items.len(),
                "translator not configured, keeping original text"
            );
            counter!("news_translate_batches_total", "outcome" => "passthrough").increment(1);
            return items;
        };

        let mut out = Vec::with_capacity(items.len());
        for (n, batch) in items.chunks(self.batch_size).enumerate() {
            let (translated, outcome) = self.translate_batch(batch).await;
            counter!("news_translate_batches_total", "outcome" => outcome.label()).increment(1);
            if let BatchOutcome::Fallback(e) = &outcome {
                tracing::warn!(
                    target: "ingest",
                    provider = client.name(),
                    batch = n,
                    size = batch.len(),
                    error = %e,
                    "translation batch failed, keeping original text"
                );
            }
            out.extend(translated);
        }
        out
    }
}
