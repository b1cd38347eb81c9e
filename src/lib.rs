// src/lib.rs
// Public library surface shared by the CLI, the HTTP service and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod notify;
pub mod query;
pub mod store;
pub mod telemetry;
pub mod trigger;

use std::sync::Arc;

pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;
pub use crate::ingest::types::{RateRow, RateTable};
pub use crate::ingest::{Pipeline, RunOptions};
pub use crate::query::RateQuery;
pub use crate::store::{SnapshotId, SnapshotStore};
pub use crate::trigger::{TriggerOutcome, TriggerRegistry};

use crate::ingest::fetch::HttpFetcher;
use crate::notify::NotifierMux;

/// Components wired from one [`AppConfig`].
pub struct Services {
    pub pipeline: Arc<Pipeline>,
    pub query: Arc<RateQuery>,
}

/// Build the fetcher, notifier fan-out, trigger registry, pipeline and query service.
pub fn build_services(cfg: &AppConfig) -> anyhow::Result<Services> {
    let fetcher = HttpFetcher::new(&cfg.fetch)?;
    let notifier = Arc::new(NotifierMux::from_config(&cfg.notify));
    let triggers = Arc::new(TriggerRegistry::discover(cfg, notifier));
    tracing::info!(triggers = ?triggers.live(), "trigger registry ready");

    let pipeline = Arc::new(Pipeline::new(Arc::new(fetcher), triggers));
    let query = Arc::new(RateQuery::new(
        Arc::clone(&pipeline),
        cfg.source_url.clone(),
        cfg.storage_dir.clone(),
    ));
    Ok(Services { pipeline, query })
}
