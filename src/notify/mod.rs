// src/notify/mod.rs
//! Outbound notifications (digest and alerts). Delivery is best effort:
//! failures are logged by the caller and never change the cycle outcome.

pub mod email;
pub mod webhook;

use anyhow::Result;
use std::sync::Arc;

pub use email::EmailNotifier;
pub use webhook::WebhookNotifier;

use crate::config::BotConfig;

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Writes notifications to the log only; used when no channel is configured.
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        tracing::info!(target: "notify", subject, "{body}");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Fans one notification out to every configured channel.
#[derive(Clone, Default)]
pub struct NotifierMux {
    channels: Vec<Arc<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(channels: Vec<Arc<dyn Notifier>>) -> Self {
        Self { channels }
    }

    /// Email and webhook channels from config; log-only when neither is set.
    pub fn from_config(cfg: &BotConfig) -> Self {
        let mut channels: Vec<Arc<dyn Notifier>> = Vec::new();
        if let Some(mail) = &cfg.mail {
            match EmailNotifier::from_config(mail, &cfg.digest.subject_tag) {
                Ok(n) => channels.push(Arc::new(n)),
                Err(e) => tracing::warn!("email notifier disabled: {e:#}"),
            }
        }
        if let Some(hook) = &cfg.webhook {
            channels.push(Arc::new(WebhookNotifier::new(hook.url.clone())));
        }
        if channels.is_empty() {
            channels.push(Arc::new(LogNotifier));
        }
        Self { channels }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[async_trait::async_trait]
impl Notifier for NotifierMux {
    /// Succeeds if at least one channel delivered.
    async fn notify(&self, subject: &str, body: &str) -> Result<()> {
        let mut last_err = None;
        let mut delivered = false;
        for ch in &self.channels {
            match ch.notify(subject, body).await {
                Ok(()) => delivered = true,
                Err(e) => {
                    tracing::warn!(channel = ch.name(), "notification failed: {e:#}");
                    last_err = Some(e);
                }
            }
        }
        match (delivered, last_err) {
            (false, Some(e)) => Err(e),
            _ => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "mux"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Failing;

    #[async_trait::async_trait]
    impl Notifier for Failing {
        async fn notify(&self, _subject: &str, _body: &str) -> Result<()> {
            anyhow::bail!("smtp down")
        }
        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<String>>);

    #[async_trait::async_trait]
    impl Notifier for Recording {
        async fn notify(&self, subject: &str, _body: &str) -> Result<()> {
            self.0.lock().unwrap().push(subject.to_string());
            Ok(())
        }
        fn name(&self) -> &'static str {
            "recording"
        }
    }

    #[tokio::test]
    async fn mux_tolerates_one_failing_channel() {
        let rec = Arc::new(Recording::default());
        let mux = NotifierMux::new(vec![Arc::new(Failing), rec.clone()]);
        mux.notify("Daily digest", "x").await.unwrap();
        assert_eq!(rec.0.lock().unwrap().as_slice(), ["Daily digest".to_string()]);

        let only_failing = NotifierMux::new(vec![Arc::new(Failing)]);
        assert!(only_failing.notify("s", "b").await.is_err());
    }

    #[test]
    fn log_only_without_channels() {
        let mux = NotifierMux::from_config(&BotConfig::default());
        assert_eq!(mux.len(), 1);
    }
}
