// src/ingest/mod.rs
pub mod fetch;
pub mod parse;
pub mod scheduler;
pub mod types;

use metrics::{counter, gauge};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::DEFAULT_RETENTION_DAYS;
use crate::ingest::fetch::Fetch;
use crate::ingest::types::RateTable;
use crate::store::SnapshotStore;
use crate::telemetry;
use crate::trigger::TriggerRegistry;

/// Per-run switches for [`Pipeline::run`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Snapshot directory; `None` skips persistence.
    pub storage: Option<PathBuf>,
    pub use_triggers: bool,
    /// Delete snapshots outside the retention window after persisting.
    pub clean: bool,
    pub retention_days: i64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            storage: None,
            use_triggers: false,
            clean: false,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl RunOptions {
    /// Fetch and parse only; used by live queries.
    pub fn query_only() -> Self {
        Self::default()
    }
}

/// Fetch → parse → triggers → persist → cleanup.
pub struct Pipeline {
    fetcher: Arc<dyn Fetch>,
    triggers: Arc<TriggerRegistry>,
}

impl Pipeline {
    pub fn new(fetcher: Arc<dyn Fetch>, triggers: Arc<TriggerRegistry>) -> Self {
        Self { fetcher, triggers }
    }

    pub fn triggers(&self) -> &TriggerRegistry {
        &self.triggers
    }

    /// Run the pipeline once.
    ///
    /// Returns `None` only when fetching or parsing failed. Trigger crashes and storage
    /// errors are logged and counted; the parsed table is still returned.
    pub async fn run(&self, url: &str, opts: &RunOptions) -> Option<RateTable> {
        telemetry::ensure_described();
        counter!("fx_pipeline_runs_total").increment(1);

        let raw = match self.fetcher.fetch(url).await {
            Ok(raw) => {
                tracing::debug!(target: "ingest", %url, bytes = raw.len(), "fetched quotation page");
                raw
            }
            Err(e) => {
                tracing::error!(target: "ingest", %url, error = %e, "failed to fetch exchange rates");
                counter!("fx_fetch_errors_total").increment(1);
                return None;
            }
        };

        let table = match parse::parse_markup(&raw) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(target: "ingest", %url, error = %e, "failed to parse exchange rates");
                counter!("fx_parse_errors_total").increment(1);
                return None;
            }
        };
        gauge!("fx_last_published_ts").set(table.published_at().and_utc().timestamp() as f64);
        tracing::info!(
            target: "ingest",
            rows = table.len(),
            published_at = %table.published_at(),
            "exchange rates updated"
        );

        if opts.use_triggers {
            let outcomes = self.triggers.run_all(&table).await;
            tracing::debug!(target: "ingest", triggers = outcomes.len(), "triggers evaluated");
        }

        let Some(dir) = opts.storage.as_deref() else {
            if opts.clean {
                tracing::warn!(target: "ingest", "cleanup requested without a storage directory");
            }
            return Some(table);
        };
        let store = SnapshotStore::new(dir);

        if let Err(e) = store.persist(&table) {
            tracing::error!(target: "store", error = %e, "failed to save snapshot");
            counter!("fx_storage_errors_total").increment(1);
        }

        if opts.clean {
            match store.cleanup(opts.retention_days) {
                Ok(report) => {
                    if !report.failed.is_empty() {
                        counter!("fx_storage_errors_total").increment(report.failed.len() as u64);
                    }
                    tracing::info!(
                        target: "store",
                        removed = report.removed.len(),
                        failed = report.failed.len(),
                        retention_days = opts.retention_days,
                        "snapshot cleanup finished"
                    );
                }
                Err(e) => {
                    tracing::error!(target: "store", error = %e, "snapshot cleanup failed");
                    counter!("fx_storage_errors_total").increment(1);
                }
            }
        }

        Some(table)
    }
}
