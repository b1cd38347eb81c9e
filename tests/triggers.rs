// tests/triggers.rs
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fx_rate_watcher::trigger::{Trigger, TriggerStatus};
use fx_rate_watcher::{RateRow, RateTable, TriggerOutcome, TriggerRegistry};

fn table() -> RateTable {
    let ts = NaiveDate::from_ymd_opt(2023, 4, 5)
        .unwrap()
        .and_hms_opt(3, 21, 2)
        .unwrap();
    RateTable::new(
        vec![RateRow {
            code: "EUR".into(),
            name: "欧元".into(),
            exchange_buy: Some(745.8),
            exchange_sell: Some(751.23),
            cash_buy: Some(722.58),
            cash_sell: Some(751.23),
        }],
        ts,
    )
    .unwrap()
}

enum Behaviour {
    Succeed,
    Decline,
    Error,
    Panic,
}

struct Scripted {
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl Scripted {
    fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Trigger for Scripted {
    async fn check(&self, _table: &RateTable) -> anyhow::Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::Succeed => Ok(true),
            Behaviour::Decline => Ok(false),
            Behaviour::Error => anyhow::bail!("threshold source unavailable"),
            Behaviour::Panic => panic!("trigger blew up"),
        }
    }
}

#[tokio::test]
async fn crashed_trigger_is_disabled_and_others_keep_running() {
    let reg = TriggerRegistry::new();
    let bad = Scripted::new(Behaviour::Panic);
    let good = Scripted::new(Behaviour::Succeed);
    reg.register("trigger_bad", bad.clone());
    reg.register("trigger_good", good.clone());

    let first = reg.run_all(&table()).await;
    assert_eq!(
        first,
        vec![
            ("trigger_bad".to_string(), TriggerOutcome::Crashed),
            ("trigger_good".to_string(), TriggerOutcome::Succeeded),
        ]
    );
    assert_eq!(reg.status("trigger_bad"), Some(TriggerStatus::Disabled));

    let second = reg.run_all(&table()).await;
    assert_eq!(
        second,
        vec![("trigger_good".to_string(), TriggerOutcome::Succeeded)]
    );
    assert_eq!(bad.calls(), 1);
    assert_eq!(good.calls(), 2);
    assert_eq!(reg.live(), vec!["trigger_good".to_string()]);
}

#[tokio::test]
async fn error_counts_as_crash_but_false_does_not() {
    let reg = TriggerRegistry::new();
    reg.register("trigger_err", Scripted::new(Behaviour::Error));
    reg.register("trigger_no", Scripted::new(Behaviour::Decline));

    let out = reg.run_all(&table()).await;
    assert_eq!(out[0].1, TriggerOutcome::Crashed);
    assert_eq!(out[1].1, TriggerOutcome::FailedCondition);

    assert_eq!(reg.status("trigger_err"), Some(TriggerStatus::Disabled));
    assert_eq!(reg.status("trigger_no"), Some(TriggerStatus::Live));
    assert_eq!(reg.run_all(&table()).await.len(), 1);
}

#[tokio::test]
async fn registration_order_is_execution_order() {
    let reg = TriggerRegistry::new();
    for name in ["trigger_c", "trigger_a", "trigger_b"] {
        reg.register(name, Scripted::new(Behaviour::Succeed));
    }
    let names: Vec<String> = reg.run_all(&table()).await.into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["trigger_c", "trigger_a", "trigger_b"]);
}
