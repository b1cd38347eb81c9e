// src/notify/mod.rs
//! Outbound notifications raised by watch triggers.

pub mod antiflutter;
pub mod discord;
pub mod email;
pub mod pushdeer;
pub mod slack;

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::counter;
use std::sync::Arc;

use crate::config::NotifyConfig;

#[derive(Debug, Clone)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub ts: DateTime<Utc>,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            ts: Utc::now(),
        }
    }

    /// Title and body as one plain-text message.
    pub fn text(&self) -> String {
        format!("{}\n{}", self.title, self.body)
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;
    async fn send(&self, n: &Notification) -> Result<()>;
}

/// Fans a notification out to every configured channel.
#[derive(Clone, Default)]
pub struct NotifierMux {
    channels: Vec<Arc<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(channels: Vec<Arc<dyn Notifier>>) -> Self {
        Self { channels }
    }

    /// Build channels from config; invalid channel settings are logged and skipped.
    pub fn from_config(cfg: &NotifyConfig) -> Self {
        let mut channels: Vec<Arc<dyn Notifier>> = Vec::new();

        if let Some(key) = &cfg.pushdeer_key {
            channels.push(Arc::new(pushdeer::PushDeerNotifier::new(
                cfg.pushdeer_endpoint.clone(),
                key.clone(),
            )));
        }
        if let Some(url) = &cfg.slack_webhook {
            channels.push(Arc::new(slack::SlackNotifier::new(url.clone())));
        }
        if let Some(url) = &cfg.discord_webhook {
            channels.push(Arc::new(discord::DiscordNotifier::new(url.clone())));
        }
        if let Some(email) = &cfg.email {
            match email::EmailSender::from_config(email) {
                Ok(sender) => channels.push(Arc::new(sender)),
                Err(e) => tracing::error!(target: "notify", error = %e, "email channel disabled"),
            }
        }

        if channels.is_empty() {
            tracing::warn!(target: "notify", "no notification channel configured; alerts are only logged");
        }
        Self { channels }
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Send to all channels, returning how many accepted the message.
    /// Channel failures are logged, never propagated.
    pub async fn notify(&self, n: &Notification) -> usize {
        if self.channels.is_empty() {
            tracing::info!(target: "notify", title = %n.title, body = %n.body, "notification (no channel)");
            return 0;
        }

        let mut delivered = 0;
        for ch in &self.channels {
            match ch.send(n).await {
                Ok(()) => {
                    delivered += 1;
                    tracing::debug!(target: "notify", channel = ch.name(), "notification sent");
                }
                Err(e) => {
                    counter!("fx_notify_errors_total", "channel" => ch.name()).increment(1);
                    tracing::warn!(target: "notify", channel = ch.name(), error = %e, "notification failed");
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording {
        fail: bool,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl Notifier for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }
        async fn send(&self, n: &Notification) -> Result<()> {
            self.seen.lock().unwrap().push(n.title.clone());
            if self.fail {
                anyhow::bail!("boom");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn failures_are_counted_not_raised() {
        let ok = Arc::new(Recording {
            fail: false,
            seen: Mutex::new(vec![]),
        });
        let bad = Arc::new(Recording {
            fail: true,
            seen: Mutex::new(vec![]),
        });
        let mux = NotifierMux::new(vec![bad.clone(), ok.clone()]);
        let delivered = mux.notify(&Notification::new("t", "b")).await;
        assert_eq!(delivered, 1);
        assert_eq!(bad.seen.lock().unwrap().len(), 1);
        assert_eq!(*ok.seen.lock().unwrap(), vec!["t".to_string()]);
    }

    #[tokio::test]
    async fn empty_mux_only_logs() {
        let mux = NotifierMux::from_config(&NotifyConfig::default());
        assert!(mux.is_empty());
        assert_eq!(mux.notify(&Notification::new("t", "b")).await, 0);
    }
}
