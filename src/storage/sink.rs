//! Partitioned Parquet table output
//!
//! A write goes through three steps:
//!
//! 1. stage: every partition is encoded and written below
//!    `_temporary/<run-id>/<destination>/`
//! 2. clear: old contents of the destination (or of the touched partitions)
//!    are deleted
//! 3. commit: staged files are moved into place and `_SUCCESS` is written
//!
//! A failure while staging leaves the destination untouched. A failure while
//! clearing or committing is reported with the partition involved and
//! `_SUCCESS` is never written, so readers can tell the table is incomplete.

use super::location::Storage;
use crate::error::{Error, Result};
use crate::output::{encode_parquet, ParquetWriterConfig};
use crate::partition::{split_by_partition, PartitionKey};
use crate::types::OverwriteMode;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;

/// Root directory for staged writes
pub const STAGING_DIR: &str = "_temporary";

/// Marker written last into a fully committed table
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Outcome of writing one table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    /// Destination as a displayable location
    pub destination: String,
    /// Rows written
    pub rows: usize,
    /// Partitions written
    pub partitions: usize,
    /// Data files written, relative to the destination
    pub files: Vec<String>,
    /// Old objects removed by the overwrite
    pub replaced: usize,
}

/// Destination for derived tables
#[async_trait]
pub trait TableSink: Send + Sync {
    /// Identifier scoping this sink's staged files
    fn run_id(&self) -> &str;

    /// Replace the contents of `destination` with `batch`, partitioned by
    /// `partition_columns`
    async fn write_table(
        &self,
        destination: &str,
        batch: &RecordBatch,
        partition_columns: &[&str],
        mode: OverwriteMode,
    ) -> Result<WriteSummary>;
}

/// A file waiting in the staging area
#[derive(Debug)]
struct StagedFile {
    key: PartitionKey,
    /// Path relative to the destination
    relative: String,
    /// Path relative to the storage root
    staged: String,
}

/// [`TableSink`] writing Parquet files to a [`Storage`]
#[derive(Debug, Clone)]
pub struct ParquetSink {
    storage: Storage,
    parquet: ParquetWriterConfig,
    run_id: String,
}

impl ParquetSink {
    /// Create a sink; `run_id` scopes staged files and names data files
    pub fn new(storage: Storage, parquet: ParquetWriterConfig, run_id: impl Into<String>) -> Self {
        Self {
            storage,
            parquet,
            run_id: run_id.into(),
        }
    }

    /// The storage this sink writes to
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    fn staging_root(&self, destination: &str) -> String {
        format!("{STAGING_DIR}/{}/{}", self.run_id, destination.trim_matches('/'))
    }

    /// Encode and upload every partition into the staging area
    async fn stage(
        &self,
        destination: &str,
        batch: &RecordBatch,
        partition_columns: &[&str],
    ) -> Result<Vec<StagedFile>> {
        let display = self.storage.display_relative(destination);
        let parts = split_by_partition(batch, partition_columns)
            .map_err(|e| Error::sink_write(&display, "<all>", e.to_string()))?;
        let staging_root = self.staging_root(destination);

        let mut staged = Vec::with_capacity(parts.len());
        // An empty table is committed as the marker alone
        let non_empty = parts.iter().filter(|p| p.batch.num_rows() > 0);
        for (idx, part) in non_empty.enumerate() {
            let file_name = format!("part-{idx:05}-{}{}", self.run_id, self.parquet.file_suffix());
            let relative = if part.key.is_unpartitioned() {
                file_name
            } else {
                format!("{}/{file_name}", part.key.path())
            };

            let bytes = encode_parquet(&part.batch, &self.parquet)
                .map_err(|e| Error::sink_write(&display, part.key.to_string(), e.to_string()))?;

            let staged_path = format!("{staging_root}/{relative}");
            self.storage
                .put(&staged_path, bytes)
                .await
                .map_err(|e| Error::sink_write(&display, part.key.to_string(), e.to_string()))?;

            tracing::debug!(
                partition = %part.key,
                rows = part.batch.num_rows(),
                "Staged partition"
            );
            staged.push(StagedFile {
                key: part.key.clone(),
                relative,
                staged: staged_path,
            });
        }

        Ok(staged)
    }

    /// Delete what the new output replaces
    ///
    /// A dynamic overwrite of a partitioned table only touches the partitions
    /// that were staged, so an empty write leaves every partition in place.
    async fn clear(
        &self,
        destination: &str,
        staged: &[StagedFile],
        partitioned: bool,
        mode: OverwriteMode,
    ) -> Result<usize> {
        let display = self.storage.display_relative(destination);
        let destination = destination.trim_matches('/');

        // Readers must not see a stale marker while the table changes
        self.storage
            .delete(&format!("{destination}/{SUCCESS_MARKER}"))
            .await
            .map_err(|e| Error::sink_write(&display, "<all>", e.to_string()))?;

        match mode {
            OverwriteMode::Dynamic if partitioned => {
                let mut removed = 0;
                let mut keys: Vec<&PartitionKey> = staged.iter().map(|f| &f.key).collect();
                keys.dedup();
                for key in keys {
                    removed += self
                        .storage
                        .delete_prefix(&format!("{destination}/{}", key.path()))
                        .await
                        .map_err(|e| Error::sink_write(&display, key.to_string(), e.to_string()))?;
                }
                Ok(removed)
            }
            _ => self
                .storage
                .delete_prefix(destination)
                .await
                .map_err(|e| Error::sink_write(&display, "<all>", e.to_string())),
        }
    }

    /// Move staged files into the destination and mark it complete
    async fn commit(&self, destination: &str, staged: &[StagedFile]) -> Result<()> {
        let display = self.storage.display_relative(destination);
        let destination = destination.trim_matches('/');

        for file in staged {
            self.storage
                .rename(&file.staged, &format!("{destination}/{}", file.relative))
                .await
                .map_err(|e| Error::sink_write(&display, file.key.to_string(), e.to_string()))?;
        }

        self.storage
            .put(&format!("{destination}/{SUCCESS_MARKER}"), Bytes::new())
            .await
            .map_err(|e| Error::sink_write(&display, "<all>", e.to_string()))
    }

    /// Remove whatever is left in the staging area, then any directories
    /// emptied by the write
    async fn discard(&self, destination: &str) {
        let staging_root = self.staging_root(destination);
        if let Err(e) = self.storage.delete_prefix(&staging_root).await {
            tracing::warn!(staging = %staging_root, error = %e, "Failed to clean up staged files");
        }
        for dir in [STAGING_DIR, destination] {
            if let Err(e) = self.storage.prune_empty_dirs(dir).await {
                tracing::warn!(dir, error = %e, "Failed to remove empty directories");
            }
        }
    }
}

#[async_trait]
impl TableSink for ParquetSink {
    fn run_id(&self) -> &str {
        &self.run_id
    }

    async fn write_table(
        &self,
        destination: &str,
        batch: &RecordBatch,
        partition_columns: &[&str],
        mode: OverwriteMode,
    ) -> Result<WriteSummary> {
        let staged = match self.stage(destination, batch, partition_columns).await {
            Ok(staged) => staged,
            Err(e) => {
                self.discard(destination).await;
                return Err(e);
            }
        };

        let outcome = async {
            let partitioned = !partition_columns.is_empty();
            let replaced = self.clear(destination, &staged, partitioned, mode).await?;
            self.commit(destination, &staged).await?;
            Ok::<_, Error>(replaced)
        }
        .await;
        self.discard(destination).await;
        let replaced = outcome?;

        let summary = WriteSummary {
            destination: self.storage.display_relative(destination),
            rows: batch.num_rows(),
            partitions: staged.len(),
            files: staged.into_iter().map(|f| f.relative).collect(),
            replaced,
        };

        tracing::info!(
            destination = %summary.destination,
            rows = summary.rows,
            partitions = summary.partitions,
            replaced = summary.replaced,
            ?mode,
            "Wrote table"
        );

        Ok(summary)
    }
}
