// src/telemetry.rs
use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    #[default]
    Quiet,
    Verbose,
    Debug,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, debug: bool) -> Self {
        match (verbose, debug) {
            (_, true) => Self::Debug,
            (true, false) => Self::Verbose,
            _ => Self::Quiet,
        }
    }

    fn directives(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Verbose => "info,hyper=warn,reqwest=warn",
            Self::Debug => "debug,hyper=info,reqwest=info,html5ever=info,selectors=info",
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides `verbosity`;
/// `FX_LOG_FORMAT=json` switches to JSON lines. Safe to call twice.
pub fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directives()));
    let json = std::env::var("FX_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Register metric descriptions once so the series show up on `/metrics`.
pub(crate) fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fx_pipeline_runs_total", "Pipeline runs started.");
        describe_counter!("fx_fetch_errors_total", "Upstream fetch failures.");
        describe_counter!("fx_parse_errors_total", "Quotation markup that could not be parsed.");
        describe_counter!(
            "fx_storage_errors_total",
            "Snapshot persist or cleanup failures."
        );
        describe_counter!("fx_snapshots_written_total", "Snapshots written.");
        describe_counter!("fx_snapshots_removed_total", "Outdated snapshots removed.");
        describe_counter!(
            "fx_trigger_runs_total",
            "Trigger executions by trigger and outcome."
        );
        describe_counter!("fx_notify_errors_total", "Notification channel failures.");
        describe_counter!("fx_api_requests_total", "Exchange-rate API requests by status.");
        describe_histogram!("fx_parse_ms", "Quotation parse time in milliseconds.");
        describe_gauge!(
            "fx_last_published_ts",
            "Unix ts of the last parsed table's publish time."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Fails if another recorder is already installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_described();
        Ok(Self { handle })
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
