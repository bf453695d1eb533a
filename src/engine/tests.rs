//! Tests for engine module

use super::*;
use crate::output::arrow_to_json;
use crate::storage::WriteSummary;
use crate::types::{OverwriteMode, WeekdayConvention};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use bytes::Bytes;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Mutex;

const DESREE_SONG: &str = r#"{"num_songs": 1, "artist_id": "ARMJAGH1187FB546F3", "artist_latitude": 35.14968, "artist_longitude": -90.04892, "artist_location": "Memphis, TN", "artist_name": "Des'ree", "song_id": "SOZVCRW12A67ADA0B7", "title": "You Gotta Be", "duration": 246.30812, "year": 1994}"#;

const OTHER_SONG: &str = r#"{"num_songs": 1, "artist_id": "ARXR32B1187FB57099", "artist_latitude": null, "artist_longitude": null, "artist_location": "", "artist_name": "Gob", "song_id": "SOFSOCN12A8C143F5D", "title": "Face the Ashes", "duration": 209.60608, "year": 2007}"#;

fn event(page: &str, user: &str, level: &str, artist: &str, song: &str, ts: i64) -> Value {
    json!({
        "artist": artist,
        "auth": "Logged In",
        "firstName": "Kaylee",
        "gender": "F",
        "itemInSession": 1,
        "lastName": "Summers",
        "length": 246.30812,
        "level": level,
        "location": "Phoenix-Mesa-Scottsdale, AZ",
        "method": "PUT",
        "page": page,
        "registration": 1_540_344_794_796.0,
        "sessionId": 139,
        "song": song,
        "status": 200,
        "ts": ts,
        "userAgent": "Mozilla/5.0",
        "userId": user
    })
}

fn jsonl(events: &[Value]) -> Bytes {
    let lines: Vec<String> = events.iter().map(Value::to_string).collect();
    Bytes::from(lines.join("\n"))
}

fn standard_log() -> Bytes {
    jsonl(&[
        event("NextSong", "8", "free", "Des'ree", "You Gotta Be", 1_541_106_106_796),
        event("Home", "8", "free", "", "", 1_541_106_106_900),
        event("NextSong", "8", "paid", "Nobody", "Unknown Song", 1_541_106_352_796),
        event("NextSong", "26", "free", "Gob", "Face the Ashes", 1_541_107_053_796),
    ])
}

async fn source_with(songs: &[&str], log: Option<Bytes>) -> Storage {
    let storage = Storage::in_memory();
    for (idx, song) in songs.iter().enumerate() {
        storage
            .put(
                &format!("song_data/A/A/{idx}/TR{idx:04}.json"),
                Bytes::from(song.to_string()),
            )
            .await
            .unwrap();
    }
    if let Some(log) = log {
        storage
            .put("log_data/2018-11-01-events.json", log)
            .await
            .unwrap();
    }
    storage
}

/// Sink that keeps every batch in memory
#[derive(Default)]
struct RecordingSink {
    written: Mutex<Vec<(String, RecordBatch)>>,
}

impl RecordingSink {
    fn rows(&self, destination: &str) -> Vec<Value> {
        let written = self.written.lock().unwrap();
        written
            .iter()
            .filter(|(d, _)| d == destination)
            .flat_map(|(_, b)| arrow_to_json(b).unwrap())
            .collect()
    }

    fn destinations(&self) -> Vec<String> {
        let written = self.written.lock().unwrap();
        written.iter().map(|(d, _)| d.clone()).collect()
    }
}

#[async_trait]
impl TableSink for RecordingSink {
    fn run_id(&self) -> &str {
        "test-run"
    }

    async fn write_table(
        &self,
        destination: &str,
        batch: &RecordBatch,
        _partition_columns: &[&str],
        _mode: OverwriteMode,
    ) -> Result<WriteSummary> {
        self.written
            .lock()
            .unwrap()
            .push((destination.to_string(), batch.clone()));
        Ok(WriteSummary {
            destination: destination.to_string(),
            rows: batch.num_rows(),
            partitions: 1,
            files: vec!["part-00000.parquet".to_string()],
            replaced: 0,
        })
    }
}

/// Sink that rejects one destination
struct FailingSink {
    fail_on: &'static str,
}

#[async_trait]
impl TableSink for FailingSink {
    fn run_id(&self) -> &str {
        "test-run"
    }

    async fn write_table(
        &self,
        destination: &str,
        batch: &RecordBatch,
        _partition_columns: &[&str],
        _mode: OverwriteMode,
    ) -> Result<WriteSummary> {
        if destination == self.fail_on {
            return Err(Error::sink_write(destination, "year=1994", "quota exceeded"));
        }
        Ok(WriteSummary {
            destination: destination.to_string(),
            rows: batch.num_rows(),
            ..WriteSummary::default()
        })
    }
}

fn pipeline(source: Storage, sink: Arc<dyn TableSink>) -> Pipeline {
    Pipeline::new(Arc::new(source), sink, PipelineConfig::default())
}

// ============================================================================
// PipelineConfig Tests
// ============================================================================

#[test]
fn test_pipeline_config_default() {
    let config = PipelineConfig::default();
    assert_eq!(config.song_glob, "song_data/*/*/*/*.json");
    assert_eq!(config.log_glob, "log_data/*.json");
    assert_eq!(config.weekday_convention, WeekdayConvention::SundayFirst);
    assert_eq!(config.overwrite_mode, OverwriteMode::Static);
}

#[test]
fn test_pipeline_config_from_etl() {
    let etl = EtlConfig::default()
        .with_weekday_convention(WeekdayConvention::Iso)
        .with_overwrite_mode(OverwriteMode::Dynamic);
    let config = PipelineConfig::from_etl(&etl).with_log_glob("events/*.jsonl");
    assert_eq!(config.weekday_convention, WeekdayConvention::Iso);
    assert_eq!(config.overwrite_mode, OverwriteMode::Dynamic);
    assert_eq!(config.log_glob, "events/*.jsonl");
}

#[test]
fn test_from_config_requires_credentials_for_s3() {
    let err = Pipeline::from_config(&EtlConfig::default()).err().unwrap();
    assert_eq!(err.stage(), Some(Stage::Config));
    assert!(err.to_string().contains("credentials.aws_access_key_id"));
}

#[test]
fn test_from_config_memory_locations() {
    let etl = EtlConfig::default()
        .with_input("memory://")
        .with_output("memory://");
    let pipeline = Pipeline::from_config(&etl).unwrap();
    assert!(!pipeline.run_id().is_empty());
}

// ============================================================================
// Run Tests
// ============================================================================

#[tokio::test]
async fn test_run_writes_all_tables_in_order() {
    let source = source_with(&[DESREE_SONG, OTHER_SONG], Some(standard_log())).await;
    let sink = Arc::new(RecordingSink::default());
    let summary = pipeline(source, sink.clone()).run().await.unwrap();

    assert_eq!(
        sink.destinations(),
        vec![
            "songs_table",
            "artists_table",
            "users_table",
            "time_table",
            "songplays_table"
        ]
    );
    assert_eq!(summary.run_id, "test-run");

    let rows: Vec<(TableName, usize)> = summary.tables.iter().map(|t| (t.table, t.rows)).collect();
    assert_eq!(
        rows,
        vec![
            (TableName::Songs, 2),
            (TableName::Artists, 2),
            (TableName::Users, 2),
            (TableName::Time, 3),
            (TableName::Songplays, 2),
        ]
    );
    assert_eq!(summary.skipped, SkippedCounts::default());
}

#[tokio::test]
async fn test_run_songplay_contents() {
    let source = source_with(&[DESREE_SONG, OTHER_SONG], Some(standard_log())).await;
    let sink = Arc::new(RecordingSink::default());
    pipeline(source, sink.clone()).run().await.unwrap();

    let songplays = sink.rows("songplays_table");
    assert_eq!(songplays.len(), 2);
    assert_eq!(
        songplays[0],
        json!({
            "songplay_id": 0,
            "start_time": "2018-11-01T21:01:46+00:00",
            "user_id": "8",
            "level": "free",
            "song_id": "SOZVCRW12A67ADA0B7",
            "artist_id": "ARMJAGH1187FB546F3",
            "session_id": 139,
            "location": "Memphis, TN",
            "user_agent": "Mozilla/5.0",
            "year": 2018,
            "month": 11
        })
    );
    assert_eq!(songplays[1]["songplay_id"], json!(1));
    assert_eq!(songplays[1]["song_id"], json!("SOFSOCN12A8C143F5D"));
}

#[tokio::test]
async fn test_run_users_reflect_latest_level() {
    let source = source_with(&[DESREE_SONG], Some(standard_log())).await;
    let sink = Arc::new(RecordingSink::default());
    pipeline(source, sink.clone()).run().await.unwrap();

    let users = sink.rows("users_table");
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["user_id"], json!("8"));
    assert_eq!(users[0]["level"], json!("paid"));
}

#[tokio::test]
async fn test_run_time_row_decomposition() {
    let log = jsonl(&[event(
        "NextSong",
        "8",
        "free",
        "Des'ree",
        "You Gotta Be",
        1_541_106_106_796,
    )]);
    let source = source_with(&[DESREE_SONG], Some(log)).await;
    let sink = Arc::new(RecordingSink::default());
    pipeline(source, sink.clone()).run().await.unwrap();

    assert_eq!(
        sink.rows("time_table"),
        vec![json!({
            "start_time": "2018-11-01T21:01:46+00:00",
            "hour": 21,
            "day": 1,
            "week": 44,
            "month": 11,
            "year": 2018,
            "weekday": 5
        })]
    );
}

#[tokio::test]
async fn test_run_counts_skipped_records() {
    let mut lines = vec![
        event("NextSong", "8", "free", "Des'ree", "You Gotta Be", 1_541_106_106_796).to_string(),
        "{not json".to_string(),
    ];
    let mut bad_ts = event("NextSong", "9", "free", "Des'ree", "You Gotta Be", 0);
    bad_ts["ts"] = json!("yesterday");
    lines.push(bad_ts.to_string());

    let source = source_with(&[DESREE_SONG], Some(Bytes::from(lines.join("\n")))).await;
    let sink = Arc::new(RecordingSink::default());
    let summary = pipeline(source, sink.clone()).run().await.unwrap();

    assert_eq!(summary.skipped.log_records, 1);
    assert_eq!(summary.skipped.time, 1);
    assert_eq!(summary.skipped.songplays, 1);
    assert_eq!(summary.table(TableName::Songplays).unwrap().rows, 1);
}

#[tokio::test]
async fn test_run_empty_activity_log() {
    let source = source_with(&[DESREE_SONG, OTHER_SONG], Some(Bytes::new())).await;
    let sink = Arc::new(RecordingSink::default());
    let summary = pipeline(source, sink.clone()).run().await.unwrap();

    assert_eq!(summary.table(TableName::Songs).unwrap().rows, 2);
    assert_eq!(summary.table(TableName::Artists).unwrap().rows, 2);
    assert_eq!(summary.table(TableName::Users).unwrap().rows, 0);
    assert_eq!(summary.table(TableName::Time).unwrap().rows, 0);
    assert_eq!(summary.table(TableName::Songplays).unwrap().rows, 0);
}

#[tokio::test]
async fn test_run_missing_log_source() {
    let source = source_with(&[DESREE_SONG], None).await;
    let sink = Arc::new(RecordingSink::default());
    let err = pipeline(source, sink.clone()).run().await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::LoadLogs));
    assert!(err.to_string().contains("No source files match"));
    // The catalog branch doesn't depend on the log
    assert_eq!(sink.destinations(), vec!["songs_table", "artists_table"]);
}

#[tokio::test]
async fn test_run_missing_song_source() {
    let source = source_with(&[], Some(standard_log())).await;
    let sink = Arc::new(RecordingSink::default());
    let err = pipeline(source, sink.clone()).run().await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::LoadSongs));
    assert_eq!(sink.destinations(), vec!["users_table", "time_table"]);
}

#[tokio::test]
async fn test_run_sink_failure_is_staged() {
    let source = source_with(&[DESREE_SONG], Some(standard_log())).await;
    let sink = Arc::new(FailingSink {
        fail_on: "artists_table",
    });
    let err = pipeline(source, sink).run().await.unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Artists));
    match err {
        Error::Stage { source, .. } => match *source {
            Error::SinkWrite {
                destination,
                partition,
                ..
            } => {
                assert_eq!(destination, "artists_table");
                assert_eq!(partition, "year=1994");
            }
            other => panic!("unexpected inner error: {other}"),
        },
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_run_with_parquet_sink() {
    let source = source_with(&[DESREE_SONG, OTHER_SONG], Some(standard_log())).await;
    let output = Storage::in_memory();
    let sink = ParquetSink::new(output.clone(), ParquetWriterConfig::default(), "sink-run");
    let pipeline = pipeline(source, Arc::new(sink));
    assert_eq!(pipeline.run_id(), "sink-run");
    let summary = pipeline.run().await.unwrap();
    assert_eq!(summary.run_id, "sink-run");

    let songs = summary.table(TableName::Songs).unwrap();
    assert_eq!(songs.destination, "memory:///songs_table");
    assert_eq!(songs.partitions, 2);

    let files = output.list("songplays_table").await.unwrap();
    assert_eq!(
        files,
        vec![
            "songplays_table/_SUCCESS".to_string(),
            "songplays_table/year=2018/month=11/part-00000-sink-run.snappy.parquet".to_string(),
        ]
    );
}

// ============================================================================
// Check / Summary Tests
// ============================================================================

#[tokio::test]
async fn test_check_counts_files() {
    let source = source_with(&[DESREE_SONG, OTHER_SONG], Some(standard_log())).await;
    let check = pipeline(source, Arc::new(RecordingSink::default()))
        .check()
        .await
        .unwrap();
    assert_eq!(
        check,
        SourceCheck {
            input: "memory:///".to_string(),
            song_files: 2,
            log_files: 1,
        }
    );
}

#[tokio::test]
async fn test_check_missing_logs() {
    let source = source_with(&[DESREE_SONG], None).await;
    let err = pipeline(source, Arc::new(RecordingSink::default()))
        .check()
        .await
        .unwrap_err();
    assert_eq!(err.stage(), Some(Stage::LoadLogs));
}

#[test]
fn test_run_summary_json() {
    let mut summary = RunSummary::new("abc");
    summary.tables.push(TableSummary {
        table: TableName::Songplays,
        destination: "out/songplays_table".to_string(),
        rows: 3,
        partitions: 1,
        files: 1,
    });
    summary.skipped.time = 2;
    summary.set_duration(15);

    let value = serde_json::to_value(&summary).unwrap();
    assert_eq!(value["run_id"], json!("abc"));
    assert_eq!(value["tables"][0]["table"], json!("songplays"));
    assert_eq!(value["skipped"]["time"], json!(2));
    assert_eq!(value["duration_ms"], json!(15));
    assert_eq!(summary.total_rows(), 3);
    assert_eq!(summary.skipped.total(), 2);
}

#[tokio::test]
async fn test_run_strict_json_format_rejects_jsonl_log() {
    let source = source_with(&[DESREE_SONG], Some(standard_log())).await;
    let sink = Arc::new(RecordingSink::default());
    let config = PipelineConfig::default().with_input_format(crate::decode::DecoderFormat::Json);
    let summary = Pipeline::new(Arc::new(source), sink, config)
        .run()
        .await
        .unwrap();

    // The whole log file is one unparseable document
    assert_eq!(summary.skipped.log_records, 1);
    assert_eq!(summary.table(TableName::Users).unwrap().rows, 0);
    assert_eq!(summary.table(TableName::Songs).unwrap().rows, 1);
}
