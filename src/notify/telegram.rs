use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{ChatChannel, NotifyError};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API channel (`sendMessage`, HTML parse mode).
#[derive(Clone)]
pub struct TelegramChannel {
    client: Client,
    endpoint: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

impl TelegramChannel {
    pub fn new(
        api_base: &str,
        bot_token: &str,
        chat_id: &str,
        timeout_secs: u64,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                api_base.trim_end_matches('/'),
                bot_token
            ),
            chat_id: chat_id.to_string(),
        })
    }
}

#[async_trait]
impl ChatChannel for TelegramChannel {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: false,
        };

        // The endpoint embeds the bot token; never let it reach error text.
        let rsp = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.without_url()))?;
        let status = rsp.status();
        if !status.is_success() {
            let body = rsp.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transport_error_does_not_leak_the_token() {
        let channel = TelegramChannel::new("http://127.0.0.1:1", "123456:SECRETTOKEN", "@news", 2)
            .unwrap();
        let err = channel.send("hi").await.unwrap_err();
        assert!(matches!(err, NotifyError::Http(_)));
        let text = err.to_string();
        assert!(!text.contains("SECRETTOKEN"), "token leaked: {text}");
    }
}
