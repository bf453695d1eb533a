//! Tests for output module

use super::*;
use crate::config::ParquetSettings;
use crate::types::{ArtistRow, SongRow, SongplayRow, TimeRow, UserRow, WeekdayConvention};
use arrow::datatypes::{DataType, TimeUnit};
use chrono::{TimeZone, Utc};
use parquet::basic::Compression;
use serde_json::json;

fn sample_songs() -> Vec<SongRow> {
    vec![
        SongRow {
            song_id: "S1".into(),
            title: Some("One".into()),
            artist_id: Some("A1".into()),
            year: Some(1994),
            duration: Some(240.5),
        },
        SongRow {
            song_id: "S2".into(),
            title: None,
            artist_id: None,
            year: None,
            duration: None,
        },
    ]
}

// ============================================================================
// Schema Tests
// ============================================================================

#[test]
fn test_songs_batch() {
    let batch = SongRow::to_batch(&sample_songs()).unwrap();
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(batch.num_columns(), 5);

    let json = arrow_to_json(&batch).unwrap();
    assert_eq!(
        json[0],
        json!({"song_id": "S1", "title": "One", "artist_id": "A1", "year": 1994, "duration": 240.5})
    );
    assert_eq!(json[1]["year"], json!(null));
}

#[test]
fn test_artists_and_users_schemas() {
    let artists = ArtistRow::to_batch(&[ArtistRow {
        artist_id: "A1".into(),
        artist_name: Some("Des'ree".into()),
        artist_location: None,
        artist_latitude: Some(51.5),
        artist_longitude: Some(-0.12),
    }])
    .unwrap();
    assert_eq!(artists.schema().field(0).name(), "artist_id");
    assert!(!artists.schema().field(0).is_nullable());

    let users = UserRow::to_batch(&[]).unwrap();
    assert_eq!(users.num_rows(), 0);
    assert_eq!(users.schema().fields().len(), 5);
}

#[test]
fn test_time_batch_uses_utc_microseconds() {
    let start = Utc.with_ymd_and_hms(2018, 11, 1, 21, 1, 46).unwrap();
    let row = crate::transform::time_row(start, WeekdayConvention::SundayFirst);
    let batch = TimeRow::to_batch(&[row]).unwrap();

    assert_eq!(
        batch.schema().field(0).data_type(),
        &DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
    );

    let json = arrow_to_json(&batch).unwrap();
    assert_eq!(json[0]["start_time"], "2018-11-01T21:01:46+00:00");
    assert_eq!(json[0]["week"], 44);
    assert_eq!(json[0]["weekday"], 5);
}

#[test]
fn test_songplays_batch() {
    let start = Utc.with_ymd_and_hms(2018, 11, 1, 21, 1, 46).unwrap();
    let batch = SongplayRow::to_batch(&[SongplayRow {
        songplay_id: 0,
        start_time: start,
        user_id: Some("8".into()),
        level: Some("free".into()),
        song_id: Some("S1".into()),
        artist_id: Some("A1".into()),
        session_id: Some(139),
        location: None,
        user_agent: Some("Mozilla/5.0".into()),
        year: 2018,
        month: 11,
    }])
    .unwrap();

    assert_eq!(batch.num_columns(), 11);
    let json = arrow_to_json(&batch).unwrap();
    assert_eq!(json[0]["songplay_id"], 0);
    assert_eq!(json[0]["session_id"], 139);
    assert_eq!(json[0]["month"], 11);
}

// ============================================================================
// Parquet Tests
// ============================================================================

#[test]
fn test_parquet_writer_config_from_settings() {
    let config = ParquetWriterConfig::from_settings(&ParquetSettings::default()).unwrap();
    assert_eq!(config.compression(), Compression::SNAPPY);
    assert_eq!(config.file_suffix(), ".snappy.parquet");

    let settings = ParquetSettings {
        compression: "none".into(),
        row_group_size: 10,
    };
    let config = ParquetWriterConfig::from_settings(&settings).unwrap();
    assert_eq!(config.compression(), Compression::UNCOMPRESSED);
    assert_eq!(config.row_group_size(), 10);
    assert_eq!(config.file_suffix(), ".parquet");

    let settings = ParquetSettings {
        compression: "brotli-ish".into(),
        row_group_size: 10,
    };
    assert!(ParquetWriterConfig::from_settings(&settings).is_err());
}

#[test]
fn test_parquet_writer_config_builder() {
    let config = ParquetWriterConfig::new()
        .with_compression(Compression::ZSTD(parquet::basic::ZstdLevel::default()))
        .with_row_group_size(500);
    assert_eq!(config.row_group_size(), 500);
    assert_eq!(config.file_suffix(), ".zstd.parquet");
}

#[test]
fn test_encode_and_read_parquet() {
    let batch = SongRow::to_batch(&sample_songs()).unwrap();
    let bytes = encode_parquet(&batch, &ParquetWriterConfig::default()).unwrap();
    assert_eq!(&bytes[..4], b"PAR1");

    let batches = read_parquet(bytes).unwrap();
    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(rows, 2);
    assert_eq!(
        arrow_to_json(&batches[0]).unwrap(),
        arrow_to_json(&batch).unwrap()
    );
}

#[test]
fn test_parquet_writer_counts_rows() {
    let batch = SongRow::to_batch(&sample_songs()).unwrap();
    let mut writer =
        ParquetWriter::new(batch.schema().as_ref(), &ParquetWriterConfig::new().with_compression(Compression::GZIP(parquet::basic::GzipLevel::default()))).unwrap();
    writer.write(&batch).unwrap();
    writer.write(&batch).unwrap();
    assert_eq!(writer.rows_written(), 4);
    let bytes = writer.finish().unwrap();
    assert!(!bytes.is_empty());
}
