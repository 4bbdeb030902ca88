//! Forecast runs against the shared store, on demand or on a timer.

use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::task::JoinHandle;

use crate::pipeline::{ForecastPipeline, ForecastRun};
use crate::{Config, ForecastError, SharedStore, StoreError};

// ---

/// Wall-clock "now" used for windowing and forecast spans.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Run the pipeline once with the configured options at `now`.
///
/// The store lock is held only while loading, so ingestion keeps flowing
/// during training.
pub fn run_forecast_at(
    store: &SharedStore,
    config: &Config,
    now: NaiveDateTime,
) -> Result<ForecastRun, ForecastError> {
    // ---
    let records = {
        let guard = store.lock().map_err(|_| StoreError::Poisoned)?;
        guard.load_all()?
    };

    ForecastPipeline::new(&config.artifact_path, config.pipeline_options())
        .run_with_records(records, now)
}

pub fn run_scheduled_forecast(
    store: &SharedStore,
    config: &Config,
) -> Result<ForecastRun, ForecastError> {
    run_forecast_at(store, config, local_now())
}

/// Run the pipeline every `forecast_interval_secs`, starting immediately.
///
/// Returns `None` when the interval is `0`. Failed runs are logged and the
/// loop carries on; runs never overlap because each tick awaits the previous
/// one.
pub fn spawn_forecast_scheduler(store: SharedStore, config: Config) -> Option<JoinHandle<()>> {
    // ---
    if config.forecast_interval_secs == 0 {
        tracing::info!("Forecast scheduler disabled");
        return None;
    }

    let period = Duration::from_secs(config.forecast_interval_secs);
    tracing::info!("Forecast scheduler running every {:?}", period);

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let (store, config) = (store.clone(), config.clone());
            let outcome =
                tokio::task::spawn_blocking(move || run_scheduled_forecast(&store, &config)).await;
            match outcome {
                Ok(Ok(_)) => {}
                Ok(Err(ForecastError::InsufficientData { required, actual })) => {
                    tracing::warn!(
                        "Scheduled forecast skipped: {} usable record(s), need {}",
                        actual,
                        required
                    );
                }
                Ok(Err(e)) => tracing::error!("Scheduled forecast failed: {}", e),
                Err(e) => tracing::error!("Scheduled forecast task panicked: {}", e),
            }
        }
    }))
}
