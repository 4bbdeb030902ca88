use std::io::Cursor;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_json::json;

use sensorflow_forecast::{
    ingest_lines, ingest_payload, run_forecast_at, shared, AirQualityLabel, AirQualityRules,
    ComfortLabel, Config, CsvRecordStore, ForecastArtifact, ForecastError, ForecastPipeline,
    ForecastSpan, PipelineOptions, RecordStore, TIMESTAMP_FORMAT,
};

// ---

fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

/// Append `count` hourly events from `start`, all with the same values.
fn fill(store: &mut CsvRecordStore, start: NaiveDateTime, count: i64) {
    // ---
    for i in 0..count {
        let waktu = (start + Duration::hours(i)).format(TIMESTAMP_FORMAT).to_string();
        let payload = json!({ "suhu": 25.0, "kelembaban": 50.0, "mq135": 400, "waktu": waktu });
        ingest_payload(
            payload.to_string().as_bytes(),
            store,
            &AirQualityRules::INGESTION,
        )
        .unwrap();
    }
}

#[test]
fn constant_month_yields_labeled_hourly_forecast() {
    // ---
    let dir = tempfile::tempdir().unwrap();
    let mut store = CsvRecordStore::open(dir.path().join("sensor_data.csv"));
    fill(&mut store, at(2025, 3, 1, 0), 150);

    let artifact_path = dir.path().join("forecast_result.json");
    let now = at(2025, 3, 20, 12);
    let run = ForecastPipeline::new(&artifact_path, PipelineOptions::default())
        .run(&store, now)
        .unwrap();

    let info = &run.artifact.model_info;
    assert_eq!(info.trained_on, 150);
    assert!(!info.training_window.fallback);
    assert_eq!(info.training_window.start, at(2025, 3, 1, 0));
    assert_eq!(info.training_window.end, now);
    assert_eq!(info.forecast_span, "month_to_date");

    // 2025-03-01 00:00 up to (not including) 2025-03-27 12:00
    let forecast = &run.artifact.forecast;
    assert_eq!(forecast.len(), 26 * 24 + 12);
    assert_eq!(forecast[0].timestamp, at(2025, 3, 1, 0));
    for pair in forecast.windows(2) {
        assert_eq!(pair[1].timestamp - pair[0].timestamp, Duration::hours(1));
    }
    for point in forecast {
        assert_eq!(point.predicted_temperature, 25.0);
        assert_eq!(point.predicted_humidity, 50.0);
        assert_eq!(point.predicted_air_quality_index, 400);
        assert_eq!(point.comfort_label, ComfortLabel::Nyaman);
        assert_eq!(point.air_quality_label, AirQualityLabel::SangatBaik);
    }

    // Constant targets: perfect fit, R² falls back to 0.
    let temperature = run.evaluation.temperature.unwrap();
    assert_eq!(temperature.samples, 30);
    assert!(temperature.mae < 1e-9);
    assert_eq!(temperature.r2, 0.0);

    let written: ForecastArtifact =
        serde_json::from_str(&std::fs::read_to_string(&artifact_path).unwrap()).unwrap();
    assert_eq!(written, run.artifact);
}

#[test]
fn empty_store_publishes_nothing() {
    // ---
    let dir = tempfile::tempdir().unwrap();
    let store = CsvRecordStore::open(dir.path().join("sensor_data.csv"));
    let artifact_path = dir.path().join("forecast_result.json");

    let err = ForecastPipeline::new(&artifact_path, PipelineOptions::default())
        .run(&store, at(2025, 3, 20, 12))
        .unwrap_err();

    assert!(matches!(err, ForecastError::InsufficientData { .. }));
    assert!(!artifact_path.exists());
}

#[test]
fn failed_run_keeps_previous_artifact() {
    // ---
    let dir = tempfile::tempdir().unwrap();
    let mut store = CsvRecordStore::open(dir.path().join("sensor_data.csv"));
    fill(&mut store, at(2025, 3, 1, 0), 10);

    let artifact_path = dir.path().join("forecast_result.json");
    let pipeline = ForecastPipeline::new(&artifact_path, PipelineOptions::default());
    pipeline.run(&store, at(2025, 3, 20, 12)).unwrap();
    let before = std::fs::read_to_string(&artifact_path).unwrap();

    let empty = CsvRecordStore::open(dir.path().join("other.csv"));
    assert!(pipeline.run(&empty, at(2025, 3, 21, 12)).is_err());
    assert_eq!(std::fs::read_to_string(&artifact_path).unwrap(), before);
}

#[test]
fn sparse_month_falls_back_to_history() {
    // ---
    let dir = tempfile::tempdir().unwrap();
    let mut store = CsvRecordStore::open(dir.path().join("sensor_data.csv"));
    fill(&mut store, at(2025, 2, 10, 0), 40);
    fill(&mut store, at(2025, 3, 2, 0), 5);

    let options = PipelineOptions {
        span: ForecastSpan::NextWeek,
        ..PipelineOptions::default()
    };
    let now = at(2025, 3, 20, 12);
    let run = ForecastPipeline::new(dir.path().join("forecast_result.json"), options)
        .run(&store, now)
        .unwrap();

    let info = &run.artifact.model_info;
    assert!(info.training_window.fallback);
    assert_eq!(info.trained_on, 45);
    assert_eq!(info.training_window.start, at(2025, 2, 10, 0));
    assert_eq!(info.forecast_span, "next_week");

    assert_eq!(run.artifact.forecast.len(), 7 * 24);
    assert_eq!(run.artifact.forecast[0].timestamp, now);
}

#[test]
fn ids_continue_across_reopen() {
    // ---
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sensor_data.csv");

    let mut store = CsvRecordStore::open(&path);
    assert_eq!(store.next_id(), 1);
    fill(&mut store, at(2025, 3, 1, 0), 3);
    assert_eq!(store.next_id(), 4);

    let reopened = CsvRecordStore::open(&path);
    assert_eq!(reopened.next_id(), 4);
    let ids: Vec<u64> = reopened.load_all().unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn stdin_stream_then_scheduled_run() {
    // ---
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        store_path: dir.path().join("sensor_data.csv"),
        artifact_path: dir.path().join("forecast_result.json"),
        ..Config::default()
    };
    let store = shared(CsvRecordStore::open(&config.store_path));

    let input = concat!(
        r#"{"suhu": 30.0, "kelembaban": 70.0, "mq135": 600, "waktu": "2025-03-05 08:00:00"}"#,
        "\nnot json at all\n\n",
        r#"{"suhu": "30.0", "kelembaban": "70", "mq135": "600", "waktu": "2025-03-05 09:00:00"}"#,
        "\n",
    );
    let stats = ingest_lines(Cursor::new(input), &store, &config.ingest_aqi_rules).unwrap();
    assert_eq!(stats.stored, 2);
    assert_eq!(stats.dropped, 1);

    let run = run_forecast_at(&store, &config, at(2025, 3, 6, 0)).unwrap();
    assert_eq!(run.artifact.model_info.trained_on, 2);

    // 600 is `baik` under the ingestion table but `sangat_baik` for forecasts.
    let stored = std::fs::read_to_string(&config.store_path).unwrap();
    assert!(stored.contains("gerah,600,baik"));
    for point in &run.artifact.forecast {
        assert_eq!(point.comfort_label, ComfortLabel::Gerah);
        assert_eq!(point.air_quality_label, AirQualityLabel::SangatBaik);
    }
}
