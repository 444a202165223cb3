// src/notify/mod.rs
//! Outbound notifications: message formatting, chunking, and transports.

pub mod chunk;
pub mod email;
pub mod format;
pub mod telegram;

use anyhow::Result;
use metrics::counter;

use crate::config::AppConfig;

pub use chunk::chunk;
pub use email::EmailNotifier;
pub use format::{build_message, lint_message};
pub use telegram::TelegramNotifier;

/// One delivery channel. `send` receives a chunk that already fits the limit.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send(&self, chunk: &str) -> Result<()>;
}

/// Fallback channel when nothing is configured: the chunk goes to the log.
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, chunk: &str) -> Result<()> {
        tracing::info!(chars = chunk.chars().count(), "notification:\n{chunk}");
        Ok(())
    }
}

/// Fans each chunk out to every channel. Failures are logged and counted,
/// never propagated.
pub struct NotifierMux {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();
        if let Some(tg) = &cfg.telegram {
            notifiers.push(Box::new(TelegramNotifier::new(tg)));
        }
        if let Some(em) = &cfg.email {
            match EmailNotifier::new(em) {
                Ok(n) => notifiers.push(Box::new(n)),
                Err(e) => tracing::warn!(error = ?e, "email disabled: bad SMTP settings"),
            }
        }
        if notifiers.is_empty() {
            tracing::info!("no notification channel configured; logging only");
            notifiers.push(Box::new(LogNotifier));
        }
        Self::new(notifiers)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.notifiers.iter().map(|n| n.name()).collect()
    }

    /// Returns the number of channels that accepted the chunk.
    pub async fn notify(&self, chunk: &str) -> usize {
        let mut delivered = 0;
        for n in &self.notifiers {
            match n.send(chunk).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    counter!("watch_notify_failures_total", "channel" => n.name()).increment(1);
                    tracing::warn!(channel = n.name(), error = ?e, "notification failed");
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    struct Broken;

    #[async_trait::async_trait]
    impl Notifier for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        async fn send(&self, _chunk: &str) -> Result<()> {
            bail!("down")
        }
    }

    #[tokio::test]
    async fn failures_are_isolated() {
        let mux = NotifierMux::new(vec![Box::new(Broken), Box::new(LogNotifier)]);
        assert_eq!(mux.notify("hello").await, 1);
    }

    #[test]
    fn falls_back_to_log() {
        let mux = NotifierMux::from_config(&AppConfig::default());
        assert_eq!(mux.names(), vec!["log"]);
    }
}
