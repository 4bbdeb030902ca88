//! Configuration loader for the `sensorflow-forecast` service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). By consolidating configuration logic here, we
//! avoid scattering `env::var` calls throughout the codebase.
//!
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::classify::AirQualityRules;
use crate::pipeline::{ForecastSpan, PipelineOptions, DEFAULT_HORIZON_DAYS};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u64 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<u64>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse an optional environment variable through `FromStr` with a default value.
macro_rules! parse_env_or {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// CSV file holding the ingested readings.
    pub store_path: PathBuf,

    /// Where the forecast artifact is published.
    pub artifact_path: PathBuf,

    /// HTTP listen address.
    pub bind_addr: SocketAddr,

    /// Seconds between scheduled forecast runs; `0` disables the scheduler.
    pub forecast_interval_secs: u64,

    /// Start policy of the forecast sequence.
    pub forecast_span: ForecastSpan,

    /// Days forecast past "now".
    pub horizon_days: u64,

    /// Threshold table applied when storing readings.
    pub ingest_aqi_rules: AirQualityRules,

    /// Threshold table applied to forecast points.
    pub forecast_aqi_rules: AirQualityRules,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store_path: PathBuf::from("sensor_data.csv"),
            artifact_path: PathBuf::from("forecast_result.json"),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            forecast_interval_secs: 3600,
            forecast_span: ForecastSpan::MonthToDate,
            horizon_days: DEFAULT_HORIZON_DAYS as u64,
            ingest_aqi_rules: AirQualityRules::INGESTION,
            forecast_aqi_rules: AirQualityRules::TRAINING,
        }
    }
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `SENSOR_CSV_PATH` – reading store (default: `sensor_data.csv`)
/// - `FORECAST_OUTPUT_PATH` – artifact file (default: `forecast_result.json`)
/// - `BIND_ADDR` – listen address (default: `0.0.0.0:8080`)
/// - `FORECAST_INTERVAL_SECS` – scheduler period, `0` disables (default: 3600)
/// - `FORECAST_SPAN` – `month_to_date` or `next_week` (default: `month_to_date`)
/// - `FORECAST_HORIZON_DAYS` – days past now (default: 7)
/// - `INGEST_AQI_RULES` – `ingestion` or `training` (default: `ingestion`)
/// - `FORECAST_AQI_RULES` – `ingestion` or `training` (default: `training`)
///
/// Returns an error if any variable is present but invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let defaults = Config::default();

    let store_path = env::var("SENSOR_CSV_PATH").map_or(defaults.store_path, PathBuf::from);
    let artifact_path =
        env::var("FORECAST_OUTPUT_PATH").map_or(defaults.artifact_path, PathBuf::from);
    let bind_addr = parse_env_or!("BIND_ADDR", SocketAddr, defaults.bind_addr);
    let forecast_interval_secs =
        parse_env_u64!("FORECAST_INTERVAL_SECS", defaults.forecast_interval_secs);
    let forecast_span = parse_env_or!("FORECAST_SPAN", ForecastSpan, defaults.forecast_span);
    let horizon_days = parse_env_u64!("FORECAST_HORIZON_DAYS", defaults.horizon_days);
    let ingest_aqi_rules =
        parse_env_or!("INGEST_AQI_RULES", AirQualityRules, defaults.ingest_aqi_rules);
    let forecast_aqi_rules =
        parse_env_or!("FORECAST_AQI_RULES", AirQualityRules, defaults.forecast_aqi_rules);

    if horizon_days > 366 {
        return Err(anyhow!("Invalid FORECAST_HORIZON_DAYS: {} exceeds 366", horizon_days));
    }

    Ok(Config {
        store_path,
        artifact_path,
        bind_addr,
        forecast_interval_secs,
        forecast_span,
        horizon_days,
        ingest_aqi_rules,
        forecast_aqi_rules,
    })
}

impl Config {
    /// Pipeline options derived from this configuration.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            horizon_days: self.horizon_days as i64,
            span: self.forecast_span,
            air_quality_rules: self.forecast_aqi_rules,
            ..PipelineOptions::default()
        }
    }

    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  SENSOR_CSV_PATH        : {}", self.store_path.display());
        tracing::info!("  FORECAST_OUTPUT_PATH   : {}", self.artifact_path.display());
        tracing::info!("  BIND_ADDR              : {}", self.bind_addr);
        tracing::info!("  FORECAST_INTERVAL_SECS : {}", self.forecast_interval_secs);
        tracing::info!("  FORECAST_SPAN          : {}", self.forecast_span);
        tracing::info!("  FORECAST_HORIZON_DAYS  : {}", self.horizon_days);
        tracing::info!("  INGEST_AQI_RULES       : {}", self.ingest_aqi_rules.name());
        tracing::info!("  FORECAST_AQI_RULES     : {}", self.forecast_aqi_rules.name());

        // The two tables disagree on whether a `baik` tier exists
        if self.ingest_aqi_rules != self.forecast_aqi_rules {
            tracing::warn!(
                "Stored readings and forecast points use different air-quality tables \
                 ({} vs {}); labels are not directly comparable",
                self.ingest_aqi_rules.name(),
                self.forecast_aqi_rules.name()
            );
        }
    }
}
