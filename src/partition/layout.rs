//! Splitting record batches into partitions

use super::types::{PartitionKey, PartitionedBatch};
use crate::error::{Error, Result};
use arrow::array::{Array, UInt32Array};
use arrow::compute::take_record_batch;
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use percent_encoding::{percent_decode_str, percent_encode, AsciiSet, CONTROLS};
use std::collections::HashMap;

/// Characters Hive escapes in partition path segments
const HIVE_PATH: &AsciiSet = &CONTROLS
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'\'')
    .add(b'*')
    .add(b'/')
    .add(b':')
    .add(b'=')
    .add(b'?')
    .add(b'\\')
    .add(b'{')
    .add(b'[')
    .add(b']')
    .add(b'^');

/// Escape a value for use as a path segment
///
/// Characters that would break the `col=value/` layout are percent-encoded.
/// Other non-ASCII characters are kept as they are.
pub fn escape_path_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let mut buf = [0u8; 4];
    for c in value.chars() {
        if c.is_ascii() || c.is_control() {
            escaped.extend(percent_encode(c.encode_utf8(&mut buf).as_bytes(), HIVE_PATH));
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// Reverse of [`escape_path_value`]
pub fn unescape_path_value(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

/// Group the rows of a batch by the values of the partition columns
///
/// Groups come out in order of first appearance. Each group's batch has the
/// partition columns projected away. With no partition columns the whole
/// batch is returned as one unpartitioned group.
pub fn split_by_partition(batch: &RecordBatch, columns: &[&str]) -> Result<Vec<PartitionedBatch>> {
    if columns.is_empty() {
        return Ok(vec![PartitionedBatch {
            key: PartitionKey::unpartitioned(),
            batch: batch.clone(),
        }]);
    }

    let schema = batch.schema();
    let mut partition_indices = Vec::with_capacity(columns.len());
    for column in columns {
        let idx = schema.index_of(column).map_err(|_| {
            Error::output(format!("Partition column '{column}' not in table schema"))
        })?;
        partition_indices.push(idx);
    }

    let data_indices: Vec<usize> = (0..schema.fields().len())
        .filter(|i| !partition_indices.contains(i))
        .collect();
    if data_indices.is_empty() {
        return Err(Error::output("Every column of the table is a partition column"));
    }

    let mut keys: Vec<PartitionKey> = Vec::new();
    let mut rows: Vec<Vec<u32>> = Vec::new();
    let mut lookup: HashMap<PartitionKey, usize> = HashMap::new();

    for row in 0..batch.num_rows() {
        let mut key = PartitionKey::unpartitioned();
        for (column, &idx) in columns.iter().zip(&partition_indices) {
            let array = batch.column(idx);
            let value = if array.is_null(row) {
                None
            } else {
                Some(array_value_to_string(array, row)?)
            };
            key = key.with_value(*column, value);
        }

        let row = u32::try_from(row)
            .map_err(|_| Error::output("Batch too large to partition"))?;
        match lookup.get(&key) {
            Some(&group) => rows[group].push(row),
            None => {
                lookup.insert(key.clone(), keys.len());
                keys.push(key);
                rows.push(vec![row]);
            }
        }
    }

    let projected = batch.project(&data_indices)?;
    keys.into_iter()
        .zip(rows)
        .map(|(key, rows)| {
            let indices = UInt32Array::from(rows);
            let batch = take_record_batch(&projected, &indices)?;
            Ok(PartitionedBatch { key, batch })
        })
        .collect()
}
