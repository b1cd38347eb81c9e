// src/trigger/mod.rs
//! Watch conditions evaluated against every freshly parsed rate table.
//!
//! A trigger that errors or panics is disabled for the rest of the process lifetime.
//! Disabling happens after the sweep over a snapshot of live entries, never while
//! iterating the registry itself.

pub mod watch;

use futures::FutureExt;
use metrics::counter;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::AppConfig;
use crate::ingest::types::RateTable;
use crate::notify::NotifierMux;

/// Naming convention that marks a callable as a trigger.
pub const TRIGGER_PREFIX: &str = "trigger_";

#[async_trait::async_trait]
pub trait Trigger: Send + Sync {
    /// `Ok(true)` executed, `Ok(false)` handled failure, `Err` is a crash.
    async fn check(&self, table: &RateTable) -> anyhow::Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Succeeded,
    FailedCondition,
    Crashed,
}

impl TriggerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::FailedCondition => "failed",
            Self::Crashed => "crashed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerStatus {
    Live,
    Disabled,
}

struct TriggerRecord {
    name: String,
    trigger: Arc<dyn Trigger>,
    status: TriggerStatus,
}

#[derive(Default)]
pub struct TriggerRegistry {
    records: RwLock<Vec<TriggerRecord>>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every built-in trigger.
    pub fn discover(cfg: &AppConfig, notifier: Arc<NotifierMux>) -> Self {
        let reg = Self::new();
        reg.register(
            watch::PriceBelowThreshold::NAME,
            Arc::new(watch::PriceBelowThreshold::new(&cfg.watch, notifier)),
        );
        reg
    }

    /// Add a trigger. Names must carry the `trigger_` prefix and be unique.
    pub fn register(&self, name: impl Into<String>, trigger: Arc<dyn Trigger>) -> bool {
        let name = name.into();
        if !name.starts_with(TRIGGER_PREFIX) {
            tracing::warn!(target: "trigger", %name, "not registered: name lacks the `{TRIGGER_PREFIX}` prefix");
            return false;
        }
        let mut records = self.write();
        if records.iter().any(|r| r.name == name) {
            tracing::warn!(target: "trigger", %name, "not registered: duplicate name");
            return false;
        }
        tracing::debug!(target: "trigger", %name, "trigger registered");
        records.push(TriggerRecord {
            name,
            trigger,
            status: TriggerStatus::Live,
        });
        true
    }

    pub fn status(&self, name: &str) -> Option<TriggerStatus> {
        self.read().iter().find(|r| r.name == name).map(|r| r.status)
    }

    /// Names of live triggers, in registration order.
    pub fn live(&self) -> Vec<String> {
        self.read()
            .iter()
            .filter(|r| r.status == TriggerStatus::Live)
            .map(|r| r.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Run every live trigger once, sequentially, in registration order.
    pub async fn run_all(&self, table: &RateTable) -> Vec<(String, TriggerOutcome)> {
        let live: Vec<(String, Arc<dyn Trigger>)> = self
            .read()
            .iter()
            .filter(|r| r.status == TriggerStatus::Live)
            .map(|r| (r.name.clone(), Arc::clone(&r.trigger)))
            .collect();

        let mut results = Vec::with_capacity(live.len());
        for (name, trigger) in live {
            let outcome = match AssertUnwindSafe(trigger.check(table)).catch_unwind().await {
                Ok(Ok(true)) => {
                    tracing::info!(target: "trigger", trigger = %name, "trigger executed");
                    TriggerOutcome::Succeeded
                }
                Ok(Ok(false)) => {
                    tracing::warn!(target: "trigger", trigger = %name, "trigger failed");
                    TriggerOutcome::FailedCondition
                }
                Ok(Err(e)) => {
                    tracing::error!(
                        target: "trigger",
                        trigger = %name,
                        error = %e,
                        "uncaught error in trigger; disabled until restart"
                    );
                    TriggerOutcome::Crashed
                }
                Err(panic) => {
                    tracing::error!(
                        target: "trigger",
                        trigger = %name,
                        panic = panic_message(panic.as_ref()),
                        "trigger panicked; disabled until restart"
                    );
                    TriggerOutcome::Crashed
                }
            };
            counter!(
                "fx_trigger_runs_total",
                "trigger" => name.clone(),
                "outcome" => outcome.as_str()
            )
            .increment(1);
            results.push((name, outcome));
        }

        let crashed: Vec<&str> = results
            .iter()
            .filter(|(_, o)| *o == TriggerOutcome::Crashed)
            .map(|(n, _)| n.as_str())
            .collect();
        if !crashed.is_empty() {
            let mut records = self.write();
            for r in records.iter_mut().filter(|r| crashed.contains(&r.name.as_str())) {
                r.status = TriggerStatus::Disabled;
            }
        }

        results
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<TriggerRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<TriggerRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Always(bool);

    #[async_trait::async_trait]
    impl Trigger for Always {
        async fn check(&self, _table: &RateTable) -> anyhow::Result<bool> {
            Ok(self.0)
        }
    }

    #[test]
    fn register_enforces_prefix_and_uniqueness() {
        let reg = TriggerRegistry::new();
        assert!(reg.register("trigger_a", Arc::new(Always(true))));
        assert!(!reg.register("trigger_a", Arc::new(Always(true))));
        assert!(!reg.register("watch_b", Arc::new(Always(true))));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.status("trigger_a"), Some(TriggerStatus::Live));
        assert_eq!(reg.status("watch_b"), None);
    }

    #[test]
    fn discover_registers_builtin_watch() {
        let reg = TriggerRegistry::discover(&AppConfig::default(), Arc::new(NotifierMux::default()));
        assert_eq!(reg.live(), vec![watch::PriceBelowThreshold::NAME.to_string()]);
    }
}
