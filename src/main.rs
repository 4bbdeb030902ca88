//! Application entry point for the `sensorflow-forecast` service.
//!
//! This binary wires the library together:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Opening the CSV reading store
//! - Dispatching to one of three modes (first CLI argument):
//!   - `serve` (default): HTTP API plus the periodic forecast scheduler
//!   - `forecast`: run the forecast pipeline once and exit
//!   - `ingest`: read newline-delimited JSON events from stdin
//!
//! # Environment Variables
//! - `SENSOR_CSV_PATH`, `FORECAST_OUTPUT_PATH`, `BIND_ADDR`,
//!   `FORECAST_INTERVAL_SECS`, `FORECAST_SPAN`, `FORECAST_HORIZON_DAYS`,
//!   `INGEST_AQI_RULES`, `FORECAST_AQI_RULES` – see `config`
//! - `SENSORFLOW_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `SENSORFLOW_SPAN_EVENTS` (optional) – span event mode for tracing
use std::{env, io};

use anyhow::{anyhow, bail, Result};
use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use sensorflow_forecast::{
    ingest_lines, load_from_env, routes, run_scheduled_forecast, shared, spawn_forecast_scheduler,
    Config, CsvRecordStore, SharedStore,
};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = load_from_env()?;
    cfg.log_config();

    let store = shared(CsvRecordStore::open(&cfg.store_path));

    match env::args().nth(1).as_deref() {
        None | Some("serve") => serve(store, cfg).await,
        Some("forecast") => forecast_once(store, cfg).await,
        Some("ingest") => ingest_stdin(store, cfg).await,
        Some(other) => bail!("Unknown mode '{}' (expected serve, forecast or ingest)", other),
    }
}

async fn serve(store: SharedStore, cfg: Config) -> Result<()> {
    // ---
    let _scheduler = spawn_forecast_scheduler(store.clone(), cfg.clone());

    let addr = cfg.bind_addr;
    let app: Router = routes::router(store, cfg);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn forecast_once(store: SharedStore, cfg: Config) -> Result<()> {
    // ---
    let run = tokio::task::spawn_blocking(move || run_scheduled_forecast(&store, &cfg))
        .await?
        .map_err(|e| anyhow!("Forecast run failed: {}", e))?;

    let summary = run.summary();
    tracing::info!(
        "Forecast complete: {} points from {} training readings",
        summary.points,
        summary.trained_on
    );
    Ok(())
}

async fn ingest_stdin(store: SharedStore, cfg: Config) -> Result<()> {
    // ---
    let rules = cfg.ingest_aqi_rules;
    let stats =
        tokio::task::spawn_blocking(move || ingest_lines(io::stdin().lock(), &store, &rules))
            .await??;

    tracing::info!("stdin closed after {} stored / {} dropped", stats.stored, stats.dropped);
    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `SENSORFLOW_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, else `SENSORFLOW_LOG_LEVEL`
///
/// Logs go to stderr so that `ingest` mode can share a pipe with other tools.
fn init_tracing() {
    // ---
    let span_events = match env::var("SENSORFLOW_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => io::stderr().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("SENSORFLOW_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},hyper=info,tower=info"))
    };

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
