//! Execution engine module
//!
//! Drives one pipeline run from raw JSON to the five tables.
//!
//! # Overview
//!
//! The engine module provides:
//! - `Pipeline` - Loads both sources, derives the tables and writes them
//! - `PipelineConfig` - Run settings (globs, weekday convention, overwrite mode)
//! - `RunSummary` - Per-table counts reported after a run
//!
//! The song catalog and the activity log are loaded concurrently. The
//! catalog is loaded once and shared by the songs/artists branch and the
//! songplays join. A source that fails to load only stops the tables that
//! depend on it; the run still ends with that error.

mod types;

pub use types::{
    PipelineConfig, RunSummary, SkippedCounts, SourceCheck, TableSummary, DEFAULT_LOG_GLOB,
    DEFAULT_SONG_GLOB,
};

use crate::config::EtlConfig;
use crate::decode::Decoded;
use crate::error::{Error, Result, ResultExt, Stage};
use crate::output::{ParquetWriterConfig, TableRows};
use crate::storage::{ParquetSink, RecordSource, Storage, TableSink};
use crate::transform::{
    derive_songplays, derive_songs_and_artists, derive_time, derive_users, SurrogateIds,
};
use crate::types::{LogRecord, SongRecord, TableName};
use std::sync::Arc;
use std::time::Instant;

/// Stage a table's derivation and write belong to
fn table_stage(table: TableName) -> Stage {
    match table {
        TableName::Songs => Stage::Songs,
        TableName::Artists => Stage::Artists,
        TableName::Users => Stage::Users,
        TableName::Time => Stage::Time,
        TableName::Songplays => Stage::Songplays,
    }
}

/// The songplays ETL pipeline
pub struct Pipeline {
    source: Arc<dyn RecordSource>,
    sink: Arc<dyn TableSink>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline over an explicit source and sink
    pub fn new(
        source: Arc<dyn RecordSource>,
        sink: Arc<dyn TableSink>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            sink,
            config,
        }
    }

    /// Build a pipeline from configuration
    ///
    /// Validates the configuration and opens both storage locations before
    /// anything is read.
    pub fn from_config(config: &EtlConfig) -> Result<Self> {
        config.validate().stage(Stage::Config)?;

        let input = Storage::parse(&config.input, &config.credentials, false)
            .stage(Stage::Config)?;
        let output = Storage::parse(&config.output, &config.credentials, true)
            .stage(Stage::Config)?;
        let parquet = ParquetWriterConfig::from_settings(&config.parquet).stage(Stage::Config)?;

        let run_id = uuid::Uuid::new_v4().to_string();
        let sink = ParquetSink::new(output, parquet, run_id);

        tracing::debug!(
            input = %input.root(),
            output = %sink.storage().root(),
            "Opened storage"
        );

        Ok(Self {
            source: Arc::new(input),
            sink: Arc::new(sink),
            config: PipelineConfig::from_etl(config),
        })
    }

    /// Run id of this pipeline, as used by its sink
    pub fn run_id(&self) -> &str {
        self.sink.run_id()
    }

    /// Run settings
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Count the source files without reading or writing anything
    pub async fn check(&self) -> Result<SourceCheck> {
        let song_files = self
            .source
            .list_matching(&self.config.song_glob)
            .await
            .stage(Stage::LoadSongs)?;
        if song_files.is_empty() {
            return Err(Error::source_not_found(&self.config.song_glob).in_stage(Stage::LoadSongs));
        }

        let log_files = self
            .source
            .list_matching(&self.config.log_glob)
            .await
            .stage(Stage::LoadLogs)?;
        if log_files.is_empty() {
            return Err(Error::source_not_found(&self.config.log_glob).in_stage(Stage::LoadLogs));
        }

        Ok(SourceCheck {
            input: self.source.location(),
            song_files: song_files.len(),
            log_files: log_files.len(),
        })
    }

    /// Run the whole pipeline once
    pub async fn run(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary::new(self.run_id());

        tracing::info!(
            run_id = %self.run_id(),
            source = %self.source.location(),
            "Starting pipeline run"
        );

        let (songs, logs) = tokio::join!(self.load_songs(), self.load_logs());
        let mut failure = None;

        let songs = match songs {
            Ok(songs) => {
                summary.skipped.song_records = songs.skipped;
                Some(songs.records)
            }
            Err(e) => {
                tracing::error!(error = %e, "Song catalog unavailable");
                failure = Some(e);
                None
            }
        };
        let logs = match logs {
            Ok(logs) => {
                summary.skipped.log_records = logs.skipped;
                Some(logs.records)
            }
            Err(e) => {
                tracing::error!(error = %e, "Activity log unavailable");
                failure = failure.or(Some(e));
                None
            }
        };

        if let Some(songs) = &songs {
            self.songs_branch(songs, &mut summary).await?;
        }
        if let Some(logs) = &logs {
            self.logs_branch(logs, &mut summary).await?;
        }
        if let (Some(songs), Some(logs)) = (&songs, &logs) {
            self.songplays_branch(songs, logs, &mut summary).await?;
        }

        summary.set_duration(start.elapsed().as_millis() as u64);

        if let Some(e) = failure {
            return Err(e);
        }

        tracing::info!(
            run_id = %self.run_id(),
            rows = summary.total_rows(),
            skipped = summary.skipped.total(),
            duration_ms = summary.duration_ms,
            "Pipeline run complete"
        );

        Ok(summary)
    }

    async fn load_songs(&self) -> Result<Decoded<SongRecord>> {
        let glob = &self.config.song_glob;
        let raw = self
            .source
            .read_json(glob, self.config.input_format)
            .await
            .stage(Stage::LoadSongs)?;
        let songs = raw.into_typed::<SongRecord>(glob);
        tracing::info!(records = songs.len(), skipped = songs.skipped, "Loaded song catalog");
        Ok(songs)
    }

    async fn load_logs(&self) -> Result<Decoded<LogRecord>> {
        let glob = &self.config.log_glob;
        let raw = self
            .source
            .read_json(glob, self.config.input_format)
            .await
            .stage(Stage::LoadLogs)?;
        let logs = raw.into_typed::<LogRecord>(glob);
        tracing::info!(records = logs.len(), skipped = logs.skipped, "Loaded activity log");
        Ok(logs)
    }

    async fn songs_branch(&self, songs: &[SongRecord], summary: &mut RunSummary) -> Result<()> {
        let (song_rows, artist_rows) = derive_songs_and_artists(songs);
        self.write(&song_rows, summary).await?;
        self.write(&artist_rows, summary).await
    }

    async fn logs_branch(&self, logs: &[LogRecord], summary: &mut RunSummary) -> Result<()> {
        let users = derive_users(logs);
        self.write(&users, summary).await?;

        let time = derive_time(logs, self.config.weekday_convention);
        if time.skipped > 0 {
            tracing::warn!(skipped = time.skipped, "Skipped events with malformed ts");
        }
        summary.skipped.time = time.skipped;
        self.write(&time.rows, summary).await
    }

    async fn songplays_branch(
        &self,
        songs: &[SongRecord],
        logs: &[LogRecord],
        summary: &mut RunSummary,
    ) -> Result<()> {
        let mut ids = SurrogateIds::new();
        let songplays = derive_songplays(logs, songs, &mut ids);
        if songplays.skipped > 0 {
            tracing::warn!(
                skipped = songplays.skipped,
                "Skipped matched events with malformed ts"
            );
        }
        summary.skipped.songplays = songplays.skipped;
        self.write(&songplays.rows, summary).await
    }

    /// Convert rows to a batch and hand it to the sink
    async fn write<R: TableRows + Sync>(&self, rows: &[R], summary: &mut RunSummary) -> Result<()> {
        let table = R::TABLE;
        let stage = table_stage(table);

        let batch = R::to_batch(rows).stage(stage)?;
        let written = self
            .sink
            .write_table(
                table.directory(),
                &batch,
                table.partition_columns(),
                self.config.overwrite_mode,
            )
            .await
            .stage(stage)?;

        tracing::info!(
            %table,
            rows = written.rows,
            partitions = written.partitions,
            "Table written"
        );
        summary.tables.push(TableSummary::new(table, &written));
        Ok(())
    }
}

#[cfg(test)]
mod tests;
