//! Reading endpoints.
//!
//! - `POST /readings`: ingest one raw telemetry event (same JSON the sensor
//!   publishes), labeled with the configured ingestion AQI table.
//! - `GET /readings`: stored readings, oldest first, with optional `since`
//!   and `limit` filters.
//!
//! Store access is blocking file I/O, so both handlers hop onto
//! `spawn_blocking` before taking the store lock.

use axum::{
    body::Bytes, extract::Query, extract::State, http::StatusCode, response::IntoResponse,
    routing::get, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::{ingest_shared, parse_timestamp, IngestError, Reading};

use super::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new().route("/readings", get(list).post(ingest))
}

/// `POST /readings` - ingest one raw telemetry event.
async fn ingest(State((store, config)): State<AppState>, body: Bytes) -> impl IntoResponse {
    // ---
    debug!("POST /readings - {} byte payload", body.len());

    let rules = config.ingest_aqi_rules;
    let result = tokio::task::spawn_blocking(move || ingest_shared(&body, &store, &rules)).await;

    match result {
        Ok(Ok(reading)) => (StatusCode::CREATED, Json(json!(reading))).into_response(),
        Ok(Err(e @ IngestError::Store(_))) => {
            error!("Failed to store reading: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
        Ok(Err(e)) => {
            warn!("Dropping malformed event: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
        Err(e) => {
            error!("Ingestion task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Query parameters for listing stored readings
#[derive(Debug, Deserialize)]
pub struct ReadingsQuery {
    /// Only readings at or after this timestamp (e.g., "2025-03-01 00:00:00")
    since: Option<String>,
    limit: Option<u32>,
}

/// `GET /readings` - stored readings, oldest first.
async fn list(
    Query(params): Query<ReadingsQuery>,
    State((store, _config)): State<AppState>,
) -> impl IntoResponse {
    // ---
    info!("GET /readings - {:?}", params);

    let since = match params.since.as_deref().map(parse_timestamp) {
        Some(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "invalid 'since' timestamp" })),
            )
                .into_response();
        }
        Some(Some(ts)) => Some(ts),
        None => None,
    };

    let loaded = tokio::task::spawn_blocking(move || {
        let guard = store.lock().map_err(|_| crate::StoreError::Poisoned)?;
        guard.load_all()
    })
    .await;

    let readings = match loaded {
        Ok(Ok(readings)) => readings,
        Ok(Err(e)) => {
            error!("Failed to load readings: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        Err(e) => {
            error!("Load task failed: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let filtered = apply_filters(readings, since, params.limit);
    debug!("GET /readings - returning {} readings", filtered.len());
    (StatusCode::OK, Json(filtered)).into_response()
}

/// Keep readings at or after `since`, capped at `limit` (default 1000).
fn apply_filters(
    readings: Vec<Reading>,
    since: Option<chrono::NaiveDateTime>,
    limit: Option<u32>,
) -> Vec<Reading> {
    // ---
    readings
        .into_iter()
        .filter(|r| since.map_or(true, |since| r.timestamp >= since))
        .take(limit.unwrap_or(1000) as usize)
        .collect()
}
