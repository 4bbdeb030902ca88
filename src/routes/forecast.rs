//! Forecast endpoints: read the published artifact, or trigger a run.
//!
//! `GET /forecast` serves the artifact file as written by the pipeline. A
//! run started through `POST /forecast/run` replaces that file atomically,
//! so a concurrent read sees either the old or the new document.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::{error, info, warn};

use crate::{run_scheduled_forecast, ForecastError};

use super::AppState;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/forecast", get(current))
        .route("/forecast/run", post(run))
}

/// `GET /forecast` - the last published artifact, verbatim.
async fn current(State((_store, config)): State<AppState>) -> impl IntoResponse {
    // ---
    match tokio::fs::read(&config.artifact_path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            bytes,
        )
            .into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no forecast has been generated yet" })),
        )
            .into_response(),
        Err(e) => {
            error!(
                "Failed to read artifact {}: {}",
                config.artifact_path.display(),
                e
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `POST /forecast/run` - train and publish a new forecast now.
async fn run(State((store, config)): State<AppState>) -> impl IntoResponse {
    // ---
    info!("POST /forecast/run - starting pipeline");

    let result = tokio::task::spawn_blocking(move || run_scheduled_forecast(&store, &config)).await;

    match result {
        Ok(Ok(run)) => (StatusCode::OK, Json(json!(run.summary()))).into_response(),
        Ok(Err(e @ ForecastError::InsufficientData { .. })) => {
            warn!("Forecast skipped: {}", e);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
        Ok(Err(e)) => {
            error!("Forecast failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
        Err(e) => {
            error!("Forecast task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
