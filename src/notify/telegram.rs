use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::Notifier;
use crate::config::TelegramConfig;

const MAX_RETRIES: u8 = 10;

/// 500ms, 1s, 2s, ... capped at 32s.
fn backoff_delay(attempt: u8) -> Duration {
    let exp = attempt.saturating_sub(1).min(6);
    Duration::from_millis(500u64 << exp)
}

#[derive(Clone)]
pub struct TelegramNotifier {
    endpoint: String,
    chat_id: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl TelegramNotifier {
    pub fn new(cfg: &TelegramConfig) -> Self {
        Self {
            endpoint: format!(
                "{}/bot{}/sendMessage",
                cfg.api_base.trim_end_matches('/'),
                cfg.token
            ),
            chat_id: cfg.chat_id.clone(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.clamp(1, MAX_RETRIES);
        self
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, chunk: &str) -> Result<()> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text: chunk,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.endpoint)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            // Errors never include the endpoint: it embeds the bot token.
            let err = match res {
                Ok(rsp) if rsp.status().is_success() => return Ok(()),
                Ok(rsp) => {
                    let status = rsp.status();
                    let body = rsp.text().await.unwrap_or_default();
                    // 4xx other than rate limiting will not get better on retry.
                    if status.is_client_error() && status.as_u16() != 429 {
                        return Err(anyhow!("telegram rejected message: {status} {body}"));
                    }
                    anyhow!("telegram HTTP error: {status} {body}")
                }
                Err(e) => anyhow!("telegram request failed: {}", e.without_url()),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            tracing::debug!(attempt, error = %err, "telegram send retry");
            tokio::time::sleep(backoff_delay(attempt)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_built_from_base_and_token() {
        let n = TelegramNotifier::new(&TelegramConfig {
            token: "123:abc".into(),
            chat_id: "42".into(),
            api_base: "http://127.0.0.1:9/".into(),
        });
        assert_eq!(n.endpoint, "http://127.0.0.1:9/bot123:abc/sendMessage");
        assert_eq!(n.name(), "telegram");
    }

    #[test]
    fn retries_and_backoff_are_bounded() {
        let n = TelegramNotifier::new(&TelegramConfig {
            token: "t".into(),
            chat_id: "1".into(),
            api_base: "http://127.0.0.1:9".into(),
        });
        assert_eq!(n.clone().with_retries(255).max_retries, MAX_RETRIES);
        assert_eq!(n.with_retries(0).max_retries, 1);
        assert_eq!(backoff_delay(1), Duration::from_millis(500));
        assert_eq!(backoff_delay(3), Duration::from_secs(2));
        assert_eq!(backoff_delay(200), Duration::from_secs(32));
    }

    #[test]
    fn payload_shape() {
        let p = SendMessage {
            chat_id: "42",
            text: "<b>x</b>",
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["parse_mode"], "HTML");
        assert_eq!(v["disable_web_page_preview"], true);
        assert_eq!(v["chat_id"], "42");
    }
}
