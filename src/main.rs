//! fx-rate-watcher command line entry point.
//! Runs the scrape → parse → persist → notify pipeline and answers rate lookups.

use clap::{CommandFactory, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use fx_rate_watcher::error::QueryError;
use fx_rate_watcher::ingest::scheduler::spawn_pipeline_scheduler;
use fx_rate_watcher::query::filter_table;
use fx_rate_watcher::telemetry::{init_tracing, Verbosity};
use fx_rate_watcher::{build_services, AppConfig, RateTable, RunOptions};

#[derive(Debug, Parser)]
#[command(name = "fx-rate-watcher", version, about = "Scrape, store and watch bank FX rates")]
struct Cli {
    /// Currency code to look up, or ALL
    #[arg(short, long, value_name = "CODE|ALL")]
    currency: Option<String>,

    /// Fetch live rates instead of reading the latest snapshot
    #[arg(short, long)]
    now: bool,

    /// Run the fetch/parse/persist pipeline
    #[arg(short, long)]
    pipeline: bool,

    /// Snapshot directory (overrides FX_STORAGE_DIR)
    #[arg(short, long, value_name = "DIR")]
    storage: Option<PathBuf>,

    /// Delete snapshots outside the retention window
    #[arg(long)]
    clean: bool,

    /// Retention window in days (overrides FX_RETENTION_DAYS)
    #[arg(long, value_name = "N")]
    retention_days: Option<u32>,

    /// Run watch triggers on the fresh table
    #[arg(long)]
    use_triggers: bool,

    /// Repeat the pipeline every SECS seconds until interrupted
    #[arg(long, value_name = "SECS", requires = "pipeline", conflicts_with = "currency",
          value_parser = clap::value_parser!(u64).range(1..))]
    every: Option<u64>,

    #[arg(short, long)]
    verbose: bool,

    #[arg(long)]
    debug: bool,

    /// TOML config file (overrides FX_CONFIG_PATH)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(Verbosity::from_flags(cli.verbose, cli.debug));

    if cli.currency.is_none() && !cli.pipeline {
        let _ = Cli::command().print_help();
        eprintln!();
        return ExitCode::from(2);
    }

    let mut cfg = match AppConfig::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("configuration error: {e:#}");
            return ExitCode::from(2);
        }
    };
    if let Some(dir) = &cli.storage {
        cfg.storage_dir = Some(dir.clone());
    }
    if let Some(days) = cli.retention_days {
        cfg.retention_days = i64::from(days);
    }

    let services = match build_services(&cfg) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("startup error: {e:#}");
            return ExitCode::from(2);
        }
    };

    let opts = RunOptions {
        storage: cfg.storage_dir.clone(),
        use_triggers: cli.use_triggers,
        clean: cli.clean,
        retention_days: cfg.retention_days,
    };

    if let Some(secs) = cli.every {
        let handle = spawn_pipeline_scheduler(
            Arc::clone(&services.pipeline),
            cfg.source_url.clone(),
            opts,
            Duration::from_secs(secs),
        );
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
        handle.abort();
        tracing::info!("scheduler stopped");
        return ExitCode::SUCCESS;
    }

    let fresh = if cli.pipeline {
        let res = services.pipeline.run(&cfg.source_url, &opts).await;
        if res.is_none() {
            eprintln!("pipeline failed: no exchange rates retrieved");
        }
        res
    } else {
        None
    };

    let Some(currency) = cli.currency.as_deref() else {
        return ExitCode::SUCCESS;
    };

    // A live lookup right after a pipeline run reuses that run's table.
    let result = match fresh {
        Some(table) if cli.now => filter_table(table, currency).map_err(QueryError::from),
        _ => services.query.get_rate(currency, cli.now).await,
    };
    match result {
        Ok(table) => print_table(&table),
        Err(e) => eprintln!("{e}"),
    }
    ExitCode::SUCCESS
}

fn print_table(table: &RateTable) {
    let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |x| x.to_string());
    println!("published at {}", table.published_at());
    for r in table.rows() {
        println!(
            "{} {}: exchange buy {} sell {}, cash buy {} sell {}",
            r.code,
            r.name,
            fmt(r.exchange_buy),
            fmt(r.exchange_sell),
            fmt(r.cash_buy),
            fmt(r.cash_sell),
        );
    }
}
