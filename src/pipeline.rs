//! Forecast pipeline: window selection → features → three regressions →
//! hourly forecast → labels → artifact.
//!
//! A run is synchronous and all-or-nothing. The artifact is serialised into
//! a temporary file next to the destination and renamed over it, so readers
//! see either the previous forecast or the new one, never a partial file.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::classify::{classify_comfort, AirQualityRules};
use crate::features::{feature_names, FeatureVector};
use crate::model::{LinearModel, RegressionMetrics, TrainTestSplit, SPLIT_SEED, TEST_PERCENT};
use crate::models::{ForecastArtifact, ForecastPoint, ModelInfo, Reading, TrainingWindowInfo};
use crate::store::RecordStore;
use crate::window::{self, month_start, MIN_WINDOW_RECORDS};
use crate::ForecastError;

// ---

/// Most recent readings a run may train on.
pub const MAX_TRAINING_RECORDS: usize = 2000;

/// Default number of days forecast past "now".
pub const DEFAULT_HORIZON_DAYS: i64 = 7;

/// Where the hourly forecast sequence begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastSpan {
    /// From midnight on the first of the current month through now + horizon,
    /// so the dashboard can overlay predictions on this month's readings.
    MonthToDate,
    /// From now through now + horizon.
    NextWeek,
}

impl ForecastSpan {
    pub fn name(&self) -> &'static str {
        match self {
            ForecastSpan::MonthToDate => "month_to_date",
            ForecastSpan::NextWeek => "next_week",
        }
    }

    /// `[start, end)` of the forecast for a run at `now`.
    pub fn bounds(&self, now: NaiveDateTime, horizon_days: i64) -> (NaiveDateTime, NaiveDateTime) {
        // ---
        let end = now + Duration::days(horizon_days);
        match self {
            ForecastSpan::MonthToDate => (month_start(now), end),
            ForecastSpan::NextWeek => (now, end),
        }
    }
}

impl fmt::Display for ForecastSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ForecastSpan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "month_to_date" => Ok(ForecastSpan::MonthToDate),
            "next_week" => Ok(ForecastSpan::NextWeek),
            other => Err(format!(
                "unknown forecast span '{other}' (expected 'month_to_date' or 'next_week')"
            )),
        }
    }
}

/// Tunables of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub min_window_records: usize,
    pub max_training_records: usize,
    pub test_percent: usize,
    pub split_seed: u64,
    pub horizon_days: i64,
    pub span: ForecastSpan,
    pub air_quality_rules: AirQualityRules,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            min_window_records: MIN_WINDOW_RECORDS,
            max_training_records: MAX_TRAINING_RECORDS,
            test_percent: TEST_PERCENT,
            split_seed: SPLIT_SEED,
            horizon_days: DEFAULT_HORIZON_DAYS,
            span: ForecastSpan::MonthToDate,
            air_quality_rules: AirQualityRules::TRAINING,
        }
    }
}

/// Raw model outputs for one hour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub temperature: f64,
    pub humidity: f64,
    pub air_quality_index: f64,
}

/// The three fitted regressions of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModelSet {
    pub temperature: LinearModel,
    pub humidity: LinearModel,
    pub air_quality_index: LinearModel,
}

/// Held-out metrics per target. `None` when the validation split is empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub temperature: Option<RegressionMetrics>,
    pub humidity: Option<RegressionMetrics>,
    pub air_quality_index: Option<RegressionMetrics>,
}

/// Target columns extracted once from the training readings.
struct Targets {
    temperature: Vec<f64>,
    humidity: Vec<f64>,
    air_quality_index: Vec<f64>,
}

impl Targets {
    fn from_readings(readings: &[Reading]) -> Self {
        Targets {
            temperature: readings.iter().map(|r| r.temperature).collect(),
            humidity: readings.iter().map(|r| r.humidity).collect(),
            air_quality_index: readings.iter().map(|r| r.air_quality_index as f64).collect(),
        }
    }
}

impl TrainedModelSet {
    /// Fit all three targets on the training rows of `split`.
    ///
    /// Returns `None` when the split has no training rows.
    fn fit(features: &[FeatureVector], targets: &Targets, split: &TrainTestSplit) -> Option<Self> {
        // ---
        let x = TrainTestSplit::pick(features, &split.train);
        let fit_column =
            |column: &[f64]| LinearModel::fit(&x, &TrainTestSplit::pick(column, &split.train));

        Some(TrainedModelSet {
            temperature: fit_column(&targets.temperature)?,
            humidity: fit_column(&targets.humidity)?,
            air_quality_index: fit_column(&targets.air_quality_index)?,
        })
    }

    fn evaluate(
        &self,
        features: &[FeatureVector],
        targets: &Targets,
        split: &TrainTestSplit,
    ) -> EvaluationReport {
        // ---
        let x = TrainTestSplit::pick(features, &split.test);
        let held_out = |column: &[f64]| TrainTestSplit::pick(column, &split.test);

        EvaluationReport {
            temperature: self.temperature.evaluate(&x, &held_out(&targets.temperature)),
            humidity: self.humidity.evaluate(&x, &held_out(&targets.humidity)),
            air_quality_index: self
                .air_quality_index
                .evaluate(&x, &held_out(&targets.air_quality_index)),
        }
    }

    pub fn predict(&self, features: &FeatureVector) -> Prediction {
        Prediction {
            temperature: self.temperature.predict(features),
            humidity: self.humidity.predict(features),
            air_quality_index: self.air_quality_index.predict(features),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to a non-negative integer index. NaN maps to 0.
fn to_index(value: f64) -> u32 {
    value.round().max(0.0) as u32
}

/// Hourly timestamps `start, start + 1h, …` strictly before `end`.
///
/// Yields `floor((end - start) / 1h)` values, none when `end <= start`.
pub fn hourly_steps(
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> impl Iterator<Item = NaiveDateTime> {
    let hours = (end - start).num_hours().max(0);
    (0..hours).map(move |i| start + Duration::hours(i))
}

/// Predict and label every hour in `[start, end)`.
pub fn forecast_points(
    models: &TrainedModelSet,
    start: NaiveDateTime,
    end: NaiveDateTime,
    rules: &AirQualityRules,
) -> Vec<ForecastPoint> {
    // ---
    hourly_steps(start, end)
        .map(|timestamp| {
            let prediction = models.predict(&FeatureVector::from_timestamp(timestamp));
            let aqi = to_index(prediction.air_quality_index);

            ForecastPoint {
                timestamp,
                predicted_temperature: round2(prediction.temperature),
                predicted_humidity: round2(prediction.humidity),
                predicted_air_quality_index: aqi,
                comfort_label: classify_comfort(prediction.temperature, prediction.humidity),
                air_quality_label: rules.classify(aqi),
            }
        })
        .collect()
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct ForecastRun {
    pub artifact: ForecastArtifact,
    pub models: TrainedModelSet,
    pub evaluation: EvaluationReport,
}

impl ForecastRun {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            points: self.artifact.forecast.len(),
            trained_on: self.artifact.model_info.trained_on,
            training_window: self.artifact.model_info.training_window.clone(),
            evaluation: self.evaluation.clone(),
        }
    }
}

/// Compact, serialisable report of a run for operators.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub points: usize,
    pub trained_on: usize,
    pub training_window: TrainingWindowInfo,
    pub evaluation: EvaluationReport,
}

#[derive(Debug, Clone)]
pub struct ForecastPipeline {
    output_path: PathBuf,
    options: PipelineOptions,
}

impl ForecastPipeline {
    pub fn new(output_path: impl Into<PathBuf>, options: PipelineOptions) -> Self {
        ForecastPipeline {
            output_path: output_path.into(),
            options,
        }
    }

    /// Load every reading from `store`, forecast, and publish the artifact.
    pub fn run(
        &self,
        store: &dyn RecordStore,
        now: NaiveDateTime,
    ) -> Result<ForecastRun, ForecastError> {
        // ---
        let records = store.load_all()?;
        self.run_with_records(records, now)
    }

    /// Forecast from already-loaded readings and publish the artifact.
    pub fn run_with_records(
        &self,
        records: Vec<Reading>,
        now: NaiveDateTime,
    ) -> Result<ForecastRun, ForecastError> {
        // ---
        let _span = tracing::info_span!("forecast_run", %now).entered();

        let run = self.forecast(records, now)?;
        write_artifact(&self.output_path, &run.artifact)?;

        tracing::info!(
            "Forecast written to {} ({} points, trained on {})",
            self.output_path.display(),
            run.artifact.forecast.len(),
            run.artifact.model_info.trained_on
        );
        Ok(run)
    }

    /// Train, evaluate and forecast without touching the filesystem.
    pub fn forecast(
        &self,
        mut records: Vec<Reading>,
        now: NaiveDateTime,
    ) -> Result<ForecastRun, ForecastError> {
        // ---
        let opts = &self.options;
        records.sort_by_key(|r| r.timestamp);

        let window = window::select(&records, now, opts.min_window_records)
            .cap(opts.max_training_records);
        if window.records.is_empty() {
            return Err(ForecastError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }

        tracing::info!(
            "Training on {} reading(s) from {} to {}{}",
            window.records.len(),
            window.start,
            window.end,
            if window.fallback { " (all history)" } else { "" }
        );

        let features: Vec<FeatureVector> = window
            .records
            .iter()
            .map(|r| FeatureVector::from_timestamp(r.timestamp))
            .collect();
        let targets = Targets::from_readings(&window.records);
        let split = TrainTestSplit::new(features.len(), opts.test_percent, opts.split_seed);

        let models = TrainedModelSet::fit(&features, &targets, &split).ok_or(
            ForecastError::InsufficientData {
                required: 1,
                actual: split.train.len(),
            },
        )?;

        let evaluation = models.evaluate(&features, &targets, &split);
        log_evaluation(&evaluation);

        let (start, end) = opts.span.bounds(now, opts.horizon_days);
        let forecast = forecast_points(&models, start, end, &opts.air_quality_rules);

        let artifact = ForecastArtifact {
            model_info: ModelInfo {
                features: feature_names(),
                forecast_span: opts.span.to_string(),
                training_window: window.info(),
                trained_on: window.records.len(),
                max_training_records: opts.max_training_records,
                train_date: now,
            },
            forecast,
        };

        Ok(ForecastRun {
            artifact,
            models,
            evaluation,
        })
    }
}

fn log_evaluation(report: &EvaluationReport) {
    // ---
    let rows = [
        ("suhu", &report.temperature),
        ("kelembapan", &report.humidity),
        ("mq135", &report.air_quality_index),
    ];
    for (target, metrics) in rows {
        match metrics {
            Some(m) => tracing::info!(
                "Validation {:<10} MAE={:.3} RMSE={:.3} R²={:.3} (n={})",
                target,
                m.mae,
                m.rmse,
                m.r2,
                m.samples
            ),
            None => tracing::warn!("Validation {:<10} skipped: empty hold-out set", target),
        }
    }
}

/// Atomically replace `path` with the pretty-printed artifact.
pub fn write_artifact(path: &Path, artifact: &ForecastArtifact) -> Result<(), ForecastError> {
    // ---
    let io_err = |source: std::io::Error| ForecastError::Artifact {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    serde_json::to_writer_pretty(&mut tmp, artifact)?;
    tmp.write_all(b"\n").map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::classify::{AirQualityLabel, ComfortLabel};
    use chrono::{NaiveDate, Timelike};

    fn at(m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn readings(
        start: NaiveDateTime,
        count: usize,
        f: impl Fn(usize) -> (f64, f64, u32),
    ) -> Vec<Reading> {
        (0..count)
            .map(|i| {
                let (temperature, humidity, aqi) = f(i);
                Reading {
                    id: i as u64 + 1,
                    timestamp: start + Duration::hours(i as i64),
                    temperature,
                    humidity,
                    air_quality_index: aqi,
                }
            })
            .collect()
    }

    #[test]
    fn test_span_bounds() {
        // ---
        let now = at(3, 10, 14, 30);
        assert_eq!(
            ForecastSpan::MonthToDate.bounds(now, 7),
            (at(3, 1, 0, 0), at(3, 17, 14, 30))
        );
        assert_eq!(ForecastSpan::NextWeek.bounds(now, 7), (now, at(3, 17, 14, 30)));
        assert_eq!("next_week".parse::<ForecastSpan>(), Ok(ForecastSpan::NextWeek));
        assert!("fortnight".parse::<ForecastSpan>().is_err());
    }

    #[test]
    fn test_hourly_steps_count_and_spacing() {
        // ---
        // Crosses the end of February in a non-leap year
        let start = at(2, 20, 0, 0);
        let end = at(3, 4, 17, 45);
        let steps: Vec<_> = hourly_steps(start, end).collect();

        assert_eq!(steps.len() as i64, (end - start).num_hours());
        assert_eq!(steps.first(), Some(&start));
        assert!(steps.windows(2).all(|w| w[1] - w[0] == Duration::hours(1)));
        assert!(steps.last().map_or(false, |last| *last < end));

        assert_eq!(hourly_steps(end, start).count(), 0);
        assert_eq!(hourly_steps(start, start + Duration::minutes(59)).count(), 0);
    }

    #[test]
    fn test_rounding_helpers() {
        // ---
        assert_eq!(round2(25.456), 25.46);
        assert_eq!(round2(-0.004), -0.0);
        assert_eq!(to_index(399.5), 400);
        assert_eq!(to_index(-12.0), 0);
        assert_eq!(to_index(f64::NAN), 0);
    }

    #[test]
    fn test_forecast_constant_history() {
        // ---
        let now = at(3, 10, 12, 0);
        let pipeline = ForecastPipeline::new("unused.json", PipelineOptions::default());
        let run = pipeline
            .forecast(readings(at(3, 1, 0, 0), 150, |_| (25.0, 50.0, 400)), now)
            .unwrap();

        let info = &run.artifact.model_info;
        assert_eq!(info.trained_on, 150);
        assert!(!info.training_window.fallback);
        assert_eq!(info.features, vec!["sin_hour", "cos_hour", "day_of_week"]);
        assert_eq!(info.forecast_span, "month_to_date");

        // 9.5 days since the 1st plus the 7-day horizon
        assert_eq!(run.artifact.forecast.len(), 16 * 24 + 12);
        for point in &run.artifact.forecast {
            assert!((point.predicted_temperature - 25.0).abs() < 0.01);
            assert!((point.predicted_humidity - 50.0).abs() < 0.01);
            assert_eq!(point.predicted_air_quality_index, 400);
            assert_eq!(point.comfort_label, ComfortLabel::Nyaman);
            assert_eq!(point.air_quality_label, AirQualityLabel::SangatBaik);
        }

        let temperature = run.evaluation.temperature.unwrap();
        assert_eq!(temperature.samples, 30);
        assert!(temperature.mae < 1e-9);
        assert_eq!(temperature.r2, 0.0);
    }

    #[test]
    fn test_forecast_learns_daily_cycle() {
        // ---
        // Warm afternoons, cool nights: temperature follows -cos(hour)
        let history = readings(at(3, 1, 0, 0), 24 * 20, |i| {
            let angle = 2.0 * std::f64::consts::PI * (i % 24) as f64 / 24.0;
            (26.0 - 4.0 * angle.cos(), 55.0 + 10.0 * angle.sin(), 450)
        });
        let now = at(3, 21, 0, 0);
        let options = PipelineOptions {
            span: ForecastSpan::NextWeek,
            ..PipelineOptions::default()
        };

        let run = ForecastPipeline::new("unused.json", options)
            .forecast(history, now)
            .unwrap();

        assert_eq!(run.artifact.forecast.len(), 7 * 24);
        assert_eq!(run.artifact.forecast[0].timestamp, now);

        let midnight = &run.artifact.forecast[0];
        let noon = &run.artifact.forecast[12];
        assert_eq!(noon.timestamp.hour(), 12);
        assert!((midnight.predicted_temperature - 22.0).abs() < 0.01);
        assert!((noon.predicted_temperature - 30.0).abs() < 0.01);
        assert_eq!(midnight.comfort_label, ComfortLabel::Nyaman);
        assert_eq!(noon.comfort_label, ComfortLabel::NyamanPanas);

        let r2 = run.evaluation.temperature.unwrap().r2;
        assert!((r2 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_forecast_uses_fallback_when_month_is_thin() {
        // ---
        let mut history = readings(at(2, 1, 0, 0), 300, |_| (24.0, 45.0, 700));
        history.extend(readings(at(3, 1, 0, 0), 20, |_| (24.0, 45.0, 700)));

        let run = ForecastPipeline::new("unused.json", PipelineOptions::default())
            .forecast(history, at(3, 2, 0, 0))
            .unwrap();

        assert!(run.artifact.model_info.training_window.fallback);
        assert_eq!(run.artifact.model_info.trained_on, 320);
        assert_eq!(run.artifact.model_info.training_window.start, at(2, 1, 0, 0));
        // 700 sits in the cukup_buruk tier of the forecast table
        assert!(run
            .artifact
            .forecast
            .iter()
            .all(|p| p.air_quality_label == AirQualityLabel::CukupBuruk));
    }

    #[test]
    fn test_forecast_rejects_empty_history() {
        // ---
        let err = ForecastPipeline::new("unused.json", PipelineOptions::default())
            .forecast(Vec::new(), at(3, 2, 0, 0))
            .unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { actual: 0, .. }));
    }

    #[test]
    fn test_single_reading_trains_without_validation() {
        // ---
        let run = ForecastPipeline::new("unused.json", PipelineOptions::default())
            .forecast(readings(at(3, 1, 8, 0), 1, |_| (18.0, 40.0, 900)), at(3, 1, 9, 0))
            .unwrap();

        assert!(run.evaluation.temperature.is_none());
        assert!(run.artifact.forecast.iter().all(|p| {
            p.predicted_temperature == 18.0 && p.comfort_label == ComfortLabel::TerlaluDingin
        }));
    }

    #[test]
    fn test_training_set_is_capped() {
        // ---
        let history = readings(at(1, 1, 0, 0), 2600, |_| (25.0, 50.0, 400));
        let run = ForecastPipeline::new("unused.json", PipelineOptions::default())
            .forecast(history, at(5, 1, 0, 0))
            .unwrap();

        assert_eq!(run.artifact.model_info.trained_on, MAX_TRAINING_RECORDS);
        assert_eq!(run.artifact.model_info.max_training_records, MAX_TRAINING_RECORDS);
    }

    #[test]
    fn test_write_artifact_replaces_file() {
        // ---
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast_result.json");
        std::fs::write(&path, "stale").unwrap();

        let pipeline = ForecastPipeline::new(&path, PipelineOptions::default());
        let run = pipeline
            .run_with_records(readings(at(3, 1, 0, 0), 120, |_| (25.0, 50.0, 400)), at(3, 6, 0, 0))
            .unwrap();

        let written: ForecastArtifact =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, run.artifact);

        // Only the artifact remains; the temporary file was renamed away
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
