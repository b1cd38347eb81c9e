// src/trigger/watch.rs
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::Trigger;
use crate::config::WatchConfig;
use crate::ingest::types::RateTable;
use crate::notify::antiflutter::AntiFlutter;
use crate::notify::{Notification, NotifierMux};

/// Alerts when the watched currency's exchange sell price drops below a threshold.
pub struct PriceBelowThreshold {
    currency: String,
    threshold: f64,
    notifier: Arc<NotifierMux>,
    gate: Mutex<AntiFlutter>,
}

impl PriceBelowThreshold {
    pub const NAME: &'static str = "trigger_when_price_is_lower_than";

    pub fn new(cfg: &WatchConfig, notifier: Arc<NotifierMux>) -> Self {
        Self {
            currency: cfg.currency.trim().to_ascii_uppercase(),
            threshold: cfg.below,
            notifier,
            gate: Mutex::new(AntiFlutter::new(cfg.cooldown_secs)),
        }
    }

    fn gate(&self) -> MutexGuard<'_, AntiFlutter> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl Trigger for PriceBelowThreshold {
    async fn check(&self, table: &RateTable) -> anyhow::Result<bool> {
        let Some(row) = table.get(&self.currency) else {
            tracing::warn!(target: "trigger", currency = %self.currency, "watched currency not quoted");
            return Ok(false);
        };
        let Some(price) = row.exchange_sell else {
            tracing::warn!(target: "trigger", currency = %self.currency, "no exchange sell price");
            return Ok(false);
        };
        tracing::debug!(target: "trigger", currency = %self.currency, price, threshold = self.threshold, "watch check");

        if price >= self.threshold {
            return Ok(true);
        }

        let now = Utc::now();
        let allowed = self.gate().should_alert(now);
        if !allowed {
            tracing::debug!(target: "trigger", currency = %self.currency, "alert suppressed by cooldown");
            return Ok(true);
        }

        tracing::info!(
            target: "trigger",
            currency = %self.currency,
            price,
            threshold = self.threshold,
            "exchange sell price below threshold"
        );
        let n = Notification::new(
            "Currency Watcher",
            format!(
                "{} exchange sell price is now at {} (threshold: {}), published {}.",
                self.currency,
                price,
                self.threshold,
                table.published_at()
            ),
        );
        let delivered = self.notifier.notify(&n).await;
        if delivered > 0 || self.notifier.is_empty() {
            self.gate().record_alert(now);
        }
        Ok(true)
    }
}
