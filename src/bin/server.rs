//! HTTP front end for the FX rate service.
//! Boots the Axum router, the Prometheus exporter and, when configured,
//! the periodic pipeline.

use shuttle_axum::ShuttleAxum;
use std::sync::Arc;
use std::time::Duration;

use fx_rate_watcher::ingest::scheduler::spawn_pipeline_scheduler;
use fx_rate_watcher::telemetry::{init_tracing, Metrics, Verbosity};
use fx_rate_watcher::{build_services, router, AppConfig, AppState, RunOptions};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing(Verbosity::Verbose);

    let cfg = AppConfig::load(None)?;
    let metrics = Metrics::init()?;
    let services = build_services(&cfg)?;

    if cfg.api_token.is_none() {
        tracing::warn!("API_AUTH_TOKEN is not set; every rate request will be rejected");
    }

    if let Some(secs) = cfg.schedule_secs {
        let opts = RunOptions {
            storage: cfg.storage_dir.clone(),
            use_triggers: true,
            clean: cfg.storage_dir.is_some(),
            retention_days: cfg.retention_days,
        };
        spawn_pipeline_scheduler(
            Arc::clone(&services.pipeline),
            cfg.source_url.clone(),
            opts,
            Duration::from_secs(secs),
        );
        tracing::info!(interval_secs = secs, "pipeline scheduler started");
    }

    let state = AppState {
        query: services.query,
        auth_token: cfg.api_token.as_deref().map(Arc::from),
    };
    let router = router(state).merge(metrics.router());

    Ok(router.into())
}
