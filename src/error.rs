//! Error types for the labeling and forecasting pipeline.
//!
//! Each failure family has its own enum so callers can decide what is
//! recoverable: ingestion errors drop a single event, store errors degrade
//! id assignment but abort a forecast run, and forecast errors abort the run
//! without touching the previous artifact.

use std::path::PathBuf;

use thiserror::Error;

// ---

/// A telemetry event that could not be turned into a reading.
#[derive(Debug, Error)]
pub enum IngestError {
    // ---
    #[error("malformed event payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("unparseable timestamp '{0}'")]
    Timestamp(String),

    #[error("failed to store reading: {0}")]
    Store(#[from] StoreError),
}

/// The reading store could not be read or written.
#[derive(Debug, Error)]
pub enum StoreError {
    // ---
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("record store lock poisoned")]
    Poisoned,
}

/// A forecast run failed; no artifact was written.
#[derive(Debug, Error)]
pub enum ForecastError {
    // ---
    #[error("insufficient data: need at least {required} usable record(s), found {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to write forecast artifact to {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode forecast artifact: {0}")]
    Encode(#[from] serde_json::Error),
}
