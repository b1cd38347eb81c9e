// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::ingest::{Pipeline, RunOptions};

/// Run the pipeline every `interval`, starting immediately.
/// A failed run is logged by the pipeline and the next tick proceeds as usual.
pub fn spawn_pipeline_scheduler(
    pipeline: Arc<Pipeline>,
    url: String,
    opts: RunOptions,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let published = pipeline.run(&url, &opts).await.map(|t| t.published_at());
            tracing::info!(
                target: "ingest",
                ok = published.is_some(),
                published_at = ?published,
                interval_secs = interval.as_secs(),
                "scheduled pipeline tick"
            );
        }
    })
}
