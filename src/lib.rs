//! Room-telemetry labeling and forecasting.
//!
//! Readings (temperature, humidity, MQ135 air-quality index) are labeled
//! with fixed comfort and air-quality rules and appended to a CSV store. A
//! batch pipeline periodically fits one least-squares model per quantity on
//! cyclical time features and publishes an hourly forecast, labeled with the
//! same rules, as a JSON artifact for the dashboard.
//!
//! Module layout follows the Explicit Module Boundary Pattern (EMBP): each
//! module is private and this file is the single gateway re-exporting what
//! siblings and the binary need, so modules depend on `crate::X` rather than
//! on each other's paths.

mod classify;
mod config;
mod error;
mod features;
mod ingest;
mod model;
mod models;
mod pipeline;
mod schedule;
mod store;
mod window;

pub mod routes;

pub use classify::{
    classify_air_quality, classify_comfort, AirQualityLabel, AirQualityRules, ComfortLabel,
};
pub use config::{load_from_env, Config};
pub use error::{ForecastError, IngestError, StoreError};
pub use features::{feature_names, FeatureVector, FEATURE_NAMES};
pub use ingest::{ingest_lines, ingest_payload, ingest_shared, IngestStats};
pub use model::{LinearModel, RegressionMetrics, TrainTestSplit, SPLIT_SEED, TEST_PERCENT};
pub use models::{
    parse_timestamp, ForecastArtifact, ForecastPoint, IngestEvent, ModelInfo, Observation,
    Reading, TrainingWindowInfo, TIMESTAMP_FORMAT,
};
pub use pipeline::{
    forecast_points, hourly_steps, write_artifact, EvaluationReport, ForecastPipeline,
    ForecastRun, ForecastSpan, PipelineOptions, Prediction, RunSummary, TrainedModelSet,
    DEFAULT_HORIZON_DAYS, MAX_TRAINING_RECORDS,
};
pub use schedule::{local_now, run_forecast_at, run_scheduled_forecast, spawn_forecast_scheduler};
pub use store::{shared, CsvRecordStore, MemoryRecordStore, RecordStore, SharedStore, CSV_HEADER};
pub use window::{month_start, select as select_training_window, TrainingWindow, MIN_WINDOW_RECORDS};
