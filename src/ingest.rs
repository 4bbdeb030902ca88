//! Telemetry ingestion: decode → label → append.
//!
//! A bad event only ever costs that event. Callers log the returned
//! [`IngestError`] and keep consuming; [`ingest_lines`] does exactly that for
//! a newline-delimited stream such as a message-bus bridge on stdin.

use std::io::BufRead;

use crate::classify::AirQualityRules;
use crate::models::{IngestEvent, Reading, TIMESTAMP_FORMAT};
use crate::store::{RecordStore, SharedStore};
use crate::{IngestError, StoreError};

// ---

/// Decode one JSON event, classify it with `rules` and append it to `store`.
pub fn ingest_payload(
    payload: &[u8],
    store: &mut dyn RecordStore,
    rules: &AirQualityRules,
) -> Result<Reading, IngestError> {
    // ---
    let event = IngestEvent::from_slice(payload)?;
    let observation = event.to_observation(rules)?;
    let (comfort, air_quality) = (observation.comfort, observation.air_quality);

    let reading = store.append(observation)?;

    tracing::info!(
        "[{}] ID {} | suhu {}°C, kelembapan {}%, mq135 {} -> {}, {}",
        reading.timestamp.format(TIMESTAMP_FORMAT),
        reading.id,
        reading.temperature,
        reading.humidity,
        reading.air_quality_index,
        comfort,
        air_quality
    );
    Ok(reading)
}

/// [`ingest_payload`] against a shared store; the id assignment and the
/// write happen under one lock.
pub fn ingest_shared(
    payload: &[u8],
    store: &SharedStore,
    rules: &AirQualityRules,
) -> Result<Reading, IngestError> {
    // ---
    let mut guard = store.lock().map_err(|_| StoreError::Poisoned)?;
    ingest_payload(payload, &mut *guard, rules)
}

/// Counters from a line-oriented ingestion session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub stored: usize,
    pub dropped: usize,
}

/// Ingest one event per line until EOF. Blank lines are ignored and
/// malformed events are logged and dropped; only a failure to read the
/// stream itself ends the loop early.
pub fn ingest_lines<R: BufRead>(
    reader: R,
    store: &SharedStore,
    rules: &AirQualityRules,
) -> std::io::Result<IngestStats> {
    // ---
    let mut stats = IngestStats::default();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        match ingest_shared(line.as_bytes(), store, rules) {
            Ok(_) => stats.stored += 1,
            Err(e) => {
                tracing::warn!("Dropping event on line {}: {} - raw: {}", lineno + 1, e, line);
                stats.dropped += 1;
            }
        }
    }

    tracing::info!(
        "Ingestion finished: {} stored, {} dropped",
        stats.stored,
        stats.dropped
    );
    Ok(stats)
}
