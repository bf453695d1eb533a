//! Table schemas and row conversion
//!
//! Each row type knows its Arrow schema and how to turn a slice of rows into
//! a RecordBatch. Timestamps are stored as UTC microseconds.

use crate::error::{Error, Result};
use crate::types::{ArtistRow, SongRow, SongplayRow, TableName, TimeRow, UserRow};
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int32Array, Int64Array, StringArray,
    TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use serde_json::Value;
use std::sync::Arc;

/// Rows that can be written as one of the output tables
pub trait TableRows: Sized {
    /// Table these rows belong to
    const TABLE: TableName;

    /// Arrow schema of the table
    fn schema() -> SchemaRef;

    /// Column arrays in schema order
    fn columns(rows: &[Self]) -> Vec<ArrayRef>;

    /// Build a RecordBatch from rows
    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        RecordBatch::try_new(Self::schema(), Self::columns(rows)).map_err(|e| Error::Output {
            message: format!("Failed to build {} batch: {e}", Self::TABLE),
        })
    }
}

fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

fn strings<'a>(values: impl Iterator<Item = Option<&'a str>>) -> ArrayRef {
    Arc::new(values.collect::<StringArray>())
}

fn calendar(values: impl Iterator<Item = u32>) -> ArrayRef {
    Arc::new(
        values
            .map(|v| i32::try_from(v).unwrap_or(i32::MAX))
            .collect::<Int32Array>(),
    )
}

fn timestamps(values: impl Iterator<Item = i64>) -> ArrayRef {
    Arc::new(TimestampMicrosecondArray::from_iter_values(values).with_timezone("UTC"))
}

impl TableRows for SongRow {
    const TABLE: TableName = TableName::Songs;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("song_id", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, true),
            Field::new("artist_id", DataType::Utf8, true),
            Field::new("year", DataType::Int32, true),
            Field::new("duration", DataType::Float64, true),
        ]))
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            strings(rows.iter().map(|r| Some(r.song_id.as_str()))),
            strings(rows.iter().map(|r| r.title.as_deref())),
            strings(rows.iter().map(|r| r.artist_id.as_deref())),
            Arc::new(rows.iter().map(|r| r.year).collect::<Int32Array>()),
            Arc::new(rows.iter().map(|r| r.duration).collect::<Float64Array>()),
        ]
    }
}

impl TableRows for ArtistRow {
    const TABLE: TableName = TableName::Artists;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("artist_id", DataType::Utf8, false),
            Field::new("artist_name", DataType::Utf8, true),
            Field::new("artist_location", DataType::Utf8, true),
            Field::new("artist_latitude", DataType::Float64, true),
            Field::new("artist_longitude", DataType::Float64, true),
        ]))
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            strings(rows.iter().map(|r| Some(r.artist_id.as_str()))),
            strings(rows.iter().map(|r| r.artist_name.as_deref())),
            strings(rows.iter().map(|r| r.artist_location.as_deref())),
            Arc::new(
                rows.iter()
                    .map(|r| r.artist_latitude)
                    .collect::<Float64Array>(),
            ),
            Arc::new(
                rows.iter()
                    .map(|r| r.artist_longitude)
                    .collect::<Float64Array>(),
            ),
        ]
    }
}

impl TableRows for UserRow {
    const TABLE: TableName = TableName::Users;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("user_id", DataType::Utf8, false),
            Field::new("first_name", DataType::Utf8, true),
            Field::new("last_name", DataType::Utf8, true),
            Field::new("gender", DataType::Utf8, true),
            Field::new("level", DataType::Utf8, true),
        ]))
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            strings(rows.iter().map(|r| Some(r.user_id.as_str()))),
            strings(rows.iter().map(|r| r.first_name.as_deref())),
            strings(rows.iter().map(|r| r.last_name.as_deref())),
            strings(rows.iter().map(|r| r.gender.as_deref())),
            strings(rows.iter().map(|r| r.level.as_deref())),
        ]
    }
}

impl TableRows for TimeRow {
    const TABLE: TableName = TableName::Time;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("start_time", timestamp_type(), false),
            Field::new("hour", DataType::Int32, false),
            Field::new("day", DataType::Int32, false),
            Field::new("week", DataType::Int32, false),
            Field::new("month", DataType::Int32, false),
            Field::new("year", DataType::Int32, false),
            Field::new("weekday", DataType::Int32, false),
        ]))
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            timestamps(rows.iter().map(|r| r.start_time.timestamp_micros())),
            calendar(rows.iter().map(|r| r.hour)),
            calendar(rows.iter().map(|r| r.day)),
            calendar(rows.iter().map(|r| r.week)),
            calendar(rows.iter().map(|r| r.month)),
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.year))),
            calendar(rows.iter().map(|r| r.weekday)),
        ]
    }
}

impl TableRows for SongplayRow {
    const TABLE: TableName = TableName::Songplays;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("songplay_id", DataType::Int64, false),
            Field::new("start_time", timestamp_type(), false),
            Field::new("user_id", DataType::Utf8, true),
            Field::new("level", DataType::Utf8, true),
            Field::new("song_id", DataType::Utf8, true),
            Field::new("artist_id", DataType::Utf8, true),
            Field::new("session_id", DataType::Int64, true),
            Field::new("location", DataType::Utf8, true),
            Field::new("user_agent", DataType::Utf8, true),
            Field::new("year", DataType::Int32, false),
            Field::new("month", DataType::Int32, false),
        ]))
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            Arc::new(Int64Array::from_iter_values(
                rows.iter().map(|r| r.songplay_id),
            )),
            timestamps(rows.iter().map(|r| r.start_time.timestamp_micros())),
            strings(rows.iter().map(|r| r.user_id.as_deref())),
            strings(rows.iter().map(|r| r.level.as_deref())),
            strings(rows.iter().map(|r| r.song_id.as_deref())),
            strings(rows.iter().map(|r| r.artist_id.as_deref())),
            Arc::new(rows.iter().map(|r| r.session_id).collect::<Int64Array>()),
            strings(rows.iter().map(|r| r.location.as_deref())),
            strings(rows.iter().map(|r| r.user_agent.as_deref())),
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.year))),
            calendar(rows.iter().map(|r| r.month)),
        ]
    }
}

/// Convert an Arrow RecordBatch to JSON records
///
/// Returns a vector of JSON objects, one per row in the batch. Timestamps are
/// rendered as RFC 3339 strings.
pub fn arrow_to_json(batch: &RecordBatch) -> Result<Vec<Value>> {
    let schema = batch.schema();
    let mut records = Vec::with_capacity(batch.num_rows());

    for row_idx in 0..batch.num_rows() {
        let mut record = serde_json::Map::new();

        for (col_idx, field) in schema.fields().iter().enumerate() {
            let value = array_value_to_json(batch.column(col_idx).as_ref(), row_idx)?;
            record.insert(field.name().clone(), value);
        }

        records.push(Value::Object(record));
    }

    Ok(records)
}

/// Convert a single array element to JSON
fn array_value_to_json(array: &dyn Array, row: usize) -> Result<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }

    fn downcast<'a, T: 'static>(array: &'a dyn Array, name: &str) -> Result<&'a T> {
        array
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| Error::Output {
                message: format!("Failed to downcast to {name}"),
            })
    }

    match array.data_type() {
        DataType::Boolean => Ok(Value::Bool(
            downcast::<BooleanArray>(array, "BooleanArray")?.value(row),
        )),
        DataType::Int32 => Ok(Value::Number(
            downcast::<Int32Array>(array, "Int32Array")?.value(row).into(),
        )),
        DataType::Int64 => Ok(Value::Number(
            downcast::<Int64Array>(array, "Int64Array")?.value(row).into(),
        )),
        DataType::Float64 => {
            let val = downcast::<Float64Array>(array, "Float64Array")?.value(row);
            Ok(serde_json::Number::from_f64(val).map_or(Value::Null, Value::Number))
        }
        DataType::Utf8 => Ok(Value::String(
            downcast::<StringArray>(array, "StringArray")?
                .value(row)
                .to_string(),
        )),
        DataType::Timestamp(TimeUnit::Microsecond, _) => {
            let arr = downcast::<TimestampMicrosecondArray>(array, "TimestampMicrosecondArray")?;
            let micros = arr.value(row);
            Ok(chrono::DateTime::from_timestamp_micros(micros)
                .map_or(Value::Number(micros.into()), |ts| {
                    Value::String(ts.to_rfc3339())
                }))
        }
        other => Err(Error::output(format!(
            "Unsupported column type for JSON rendering: {other:?}"
        ))),
    }
}
