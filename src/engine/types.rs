//! Engine types
//!
//! Run configuration and the summaries reported after a run.

use crate::config::EtlConfig;
use crate::decode::DecoderFormat;
use crate::storage::WriteSummary;
use crate::types::{OverwriteMode, TableName, WeekdayConvention};
use serde::Serialize;

/// Song catalog files, relative to the input root
pub const DEFAULT_SONG_GLOB: &str = "song_data/*/*/*/*.json";

/// Activity log files, relative to the input root
pub const DEFAULT_LOG_GLOB: &str = "log_data/*.json";

/// Configuration for a pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Numbering of the time table's weekday column
    pub weekday_convention: WeekdayConvention,
    /// How existing table contents are replaced
    pub overwrite_mode: OverwriteMode,
    /// Glob selecting song catalog files
    pub song_glob: String,
    /// Glob selecting activity log files
    pub log_glob: String,
    /// Layout of the source files
    pub input_format: DecoderFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            weekday_convention: WeekdayConvention::default(),
            overwrite_mode: OverwriteMode::default(),
            song_glob: DEFAULT_SONG_GLOB.to_string(),
            log_glob: DEFAULT_LOG_GLOB.to_string(),
            input_format: DecoderFormat::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the run settings from a loaded configuration
    pub fn from_etl(config: &EtlConfig) -> Self {
        Self::default()
            .with_weekday_convention(config.weekday_convention)
            .with_overwrite_mode(config.overwrite_mode)
            .with_input_format(config.input_format)
    }

    /// Set the weekday convention
    #[must_use]
    pub fn with_weekday_convention(mut self, convention: WeekdayConvention) -> Self {
        self.weekday_convention = convention;
        self
    }

    /// Set the overwrite mode
    #[must_use]
    pub fn with_overwrite_mode(mut self, mode: OverwriteMode) -> Self {
        self.overwrite_mode = mode;
        self
    }

    /// Set the song catalog glob
    #[must_use]
    pub fn with_song_glob(mut self, glob: impl Into<String>) -> Self {
        self.song_glob = glob.into();
        self
    }

    /// Set the source file layout
    #[must_use]
    pub fn with_input_format(mut self, format: DecoderFormat) -> Self {
        self.input_format = format;
        self
    }

    /// Set the activity log glob
    #[must_use]
    pub fn with_log_glob(mut self, glob: impl Into<String>) -> Self {
        self.log_glob = glob.into();
        self
    }
}

/// What was written for one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub table: TableName,
    pub destination: String,
    pub rows: usize,
    pub partitions: usize,
    pub files: usize,
}

impl TableSummary {
    /// Summarize a sink write
    pub fn new(table: TableName, written: &WriteSummary) -> Self {
        Self {
            table,
            destination: written.destination.clone(),
            rows: written.rows,
            partitions: written.partitions,
            files: written.files.len(),
        }
    }
}

/// Input records rejected along the way
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkippedCounts {
    /// Song catalog lines or objects that failed to decode
    pub song_records: usize,
    /// Activity log lines or objects that failed to decode
    pub log_records: usize,
    /// Playback events with a malformed `ts`, for the time table
    pub time: usize,
    /// Matched playback events with a malformed `ts`
    pub songplays: usize,
}

impl SkippedCounts {
    /// Sum of every count
    pub fn total(&self) -> usize {
        self.song_records + self.log_records + self.time + self.songplays
    }
}

/// Outcome of a full pipeline run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Identifier scoping this run's staged files
    pub run_id: String,
    /// Tables written, in write order
    pub tables: Vec<TableSummary>,
    /// Records skipped as malformed
    pub skipped: SkippedCounts,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl RunSummary {
    /// Start a summary for a run
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Self::default()
        }
    }

    /// Look up a table's summary
    pub fn table(&self, table: TableName) -> Option<&TableSummary> {
        self.tables.iter().find(|t| t.table == table)
    }

    /// Rows written across all tables
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}

/// Result of checking the sources without running the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceCheck {
    /// Input root
    pub input: String,
    /// Song catalog files found
    pub song_files: usize,
    /// Activity log files found
    pub log_files: usize,
}
