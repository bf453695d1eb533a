//! Partition types

use super::layout::escape_path_value;
use arrow::record_batch::RecordBatch;
use std::fmt;

/// Directory value used when a partition column is null or empty
pub const HIVE_DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Values of the partition columns for one group of rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    /// `(column, value)` pairs in partition column order; `None` is null
    pub values: Vec<(String, Option<String>)>,
}

impl PartitionKey {
    /// Key of an unpartitioned table
    pub fn unpartitioned() -> Self {
        Self::default()
    }

    /// Add a column value
    #[must_use]
    pub fn with_value(mut self, column: impl Into<String>, value: Option<String>) -> Self {
        self.values.push((column.into(), value));
        self
    }

    /// Whether the key has no columns
    pub fn is_unpartitioned(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the value of a column
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(c, _)| c == column)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Relative directory, e.g. `year=2018/month=11`; empty when unpartitioned
    pub fn path(&self) -> String {
        self.values
            .iter()
            .map(|(column, value)| {
                let value = match value.as_deref() {
                    Some(v) if !v.is_empty() => escape_path_value(v),
                    _ => HIVE_DEFAULT_PARTITION.to_string(),
                };
                format!("{}={value}", escape_path_value(column))
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unpartitioned() {
            f.write_str("<unpartitioned>")
        } else {
            f.write_str(&self.path())
        }
    }
}

/// Rows of one partition with the partition columns removed
#[derive(Debug, Clone)]
pub struct PartitionedBatch {
    pub key: PartitionKey,
    pub batch: RecordBatch,
}
