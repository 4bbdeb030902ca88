//! Data models for readings, inbound telemetry and the forecast artifact.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::classify::{classify_comfort, AirQualityLabel, AirQualityRules, ComfortLabel};
use crate::IngestError;

// ---

/// Wall-clock format used in the store, the artifact and log lines.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a device or store timestamp.
///
/// Accepts `2025-03-26 18:45:00`, `2025-03-26T18:45:00` (either with
/// optional fractional seconds) and RFC 3339 with an offset, which is
/// reduced to its local wall time. Returns `None` for anything else.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    // ---
    let raw = raw.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

/// Serde adapter writing timestamps in [`TIMESTAMP_FORMAT`].
pub mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::{parse_timestamp, TIMESTAMP_FORMAT};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse_timestamp(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{raw}'")))
    }
}

/// One stored telemetry reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    // ---
    pub id: u64,
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub temperature: f64,
    pub humidity: f64,
    pub air_quality_index: u32,
}

/// A classified reading that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    // ---
    pub timestamp: NaiveDateTime,
    pub temperature: f64,
    pub humidity: f64,
    pub air_quality_index: u32,
    pub comfort: ComfortLabel,
    pub air_quality: AirQualityLabel,
}

impl Observation {
    /// Attach the store-assigned id.
    pub fn into_reading(self, id: u64) -> Reading {
        Reading {
            id,
            timestamp: self.timestamp,
            temperature: self.temperature,
            humidity: self.humidity,
            air_quality_index: self.air_quality_index,
        }
    }
}

/// Raw telemetry event as published by the sensor node.
#[derive(Debug, Deserialize)]
pub struct IngestEvent {
    // ---
    #[serde(deserialize_with = "lenient_f64")]
    pub suhu: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub kelembaban: f64,
    #[serde(deserialize_with = "lenient_u32")]
    pub mq135: u32,
    pub waktu: String,
}

impl IngestEvent {
    /// Decode a JSON payload.
    pub fn from_slice(payload: &[u8]) -> Result<Self, IngestError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Parse the timestamp and label the event with the given AQI table.
    pub fn to_observation(&self, rules: &AirQualityRules) -> Result<Observation, IngestError> {
        // ---
        let timestamp =
            parse_timestamp(&self.waktu).ok_or_else(|| IngestError::Timestamp(self.waktu.clone()))?;

        Ok(Observation {
            timestamp,
            temperature: self.suhu,
            humidity: self.kelembaban,
            air_quality_index: self.mq135,
            comfort: classify_comfort(self.suhu, self.kelembaban),
            air_quality: rules.classify(self.mq135),
        })
    }
}

/// Numbers sometimes arrive quoted from the microcontroller firmware.
#[derive(Deserialize)]
#[serde(untagged)]
enum LooseNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    // ---
    use serde::de::Error;

    let value = match LooseNumber::deserialize(d)? {
        LooseNumber::Int(v) => v as f64,
        LooseNumber::Float(v) => v,
        LooseNumber::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| D::Error::custom(format!("invalid number '{s}': {e}")))?,
    };
    if !value.is_finite() {
        return Err(D::Error::custom("number must be finite"));
    }
    Ok(value)
}

fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    // ---
    use serde::de::Error;

    // Fractional values are truncated toward zero
    let value = match LooseNumber::deserialize(d)? {
        LooseNumber::Int(v) => v as f64,
        LooseNumber::Float(v) => v.trunc(),
        LooseNumber::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| D::Error::custom(format!("invalid integer '{s}': {e}")))?
            .trunc(),
    };
    if !value.is_finite() || value < 0.0 || value > u32::MAX as f64 {
        return Err(D::Error::custom(format!(
            "air-quality index {value} out of range"
        )));
    }
    Ok(value as u32)
}

/// One hourly forecast entry, keyed with the dashboard's column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    // ---
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "suhu")]
    pub predicted_temperature: f64,
    #[serde(rename = "kelembapan")]
    pub predicted_humidity: f64,
    #[serde(rename = "mq135")]
    pub predicted_air_quality_index: u32,
    #[serde(rename = "label_suhu_kelembapan")]
    pub comfort_label: ComfortLabel,
    #[serde(rename = "label_kualitas_udara")]
    pub air_quality_label: AirQualityLabel,
}

/// Bounds of the history a run was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingWindowInfo {
    // ---
    #[serde(with = "timestamp_format")]
    pub start: NaiveDateTime,
    #[serde(with = "timestamp_format")]
    pub end: NaiveDateTime,
    /// True when the current-month window was too small and all history was used.
    pub fallback: bool,
}

/// Training metadata published with every forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    // ---
    pub features: Vec<String>,
    pub forecast_span: String,
    pub training_window: TrainingWindowInfo,
    pub trained_on: usize,
    pub max_training_records: usize,
    #[serde(with = "timestamp_format")]
    pub train_date: NaiveDateTime,
}

/// The document consumed by the dashboard. Replaced wholesale on every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastArtifact {
    pub model_info: ModelInfo,
    pub forecast: Vec<ForecastPoint>,
}
