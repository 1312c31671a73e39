//! LLM provider abstraction for the translator.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::TranslateError;

pub type LlmFuture<'a> = Pin<Box<dyn Future<Output = Result<String, TranslateError>> + Send + 'a>>;

/// One prompt in, the model's raw text reply out.
pub trait LlmClient: Send + Sync {
    fn complete<'a>(&'a self, system: &'a str, prompt: &'a str) -> LlmFuture<'a>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

/// OpenAI-compatible Chat Completions provider.
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout_secs: u64,
    ) -> Result<Self, TranslateError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("crypto-news-ingest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

impl LlmClient for OpenAiCompatClient {
    fn complete<'a>(&'a self, system: &'a str, prompt: &'a str) -> LlmFuture<'a> {
        Box::pin(async move {
            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: system,
                    },
                    Msg {
                        role: "user",
                        content: prompt,
                    },
                ],
                temperature: 0.2,
            };

            let resp = self
                .http
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                return Err(TranslateError::Status(status.as_u16()));
            }

            let body: Resp = resp.json().await?;
            body.choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .filter(|s| !s.trim().is_empty())
                .ok_or(TranslateError::EmptyReply)
        })
    }

    fn name(&self) -> &'static str {
        "openai-compatible"
    }
}

/// Replays canned replies in order and records every prompt it saw.
/// `None` simulates an unreachable API (HTTP 503). Once the script runs
/// out the last reply repeats.
pub struct ScriptedLlm {
    replies: Mutex<Vec<Option<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<Option<String>>) -> Self {
        let mut replies = replies;
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails.
    pub fn unreachable() -> Self {
        Self::new(vec![None])
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl LlmClient for ScriptedLlm {
    fn complete<'a>(&'a self, _system: &'a str, prompt: &'a str) -> LlmFuture<'a> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
        let reply = {
            let mut replies = self.replies.lock().unwrap_or_else(|e| e.into_inner());
            if replies.len() > 1 {
                replies.pop().flatten()
            } else {
                replies.last().cloned().flatten()
            }
        };
        Box::pin(async move { reply.ok_or(TranslateError::Status(503)) })
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
