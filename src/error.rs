//! Error types for the songplays ETL
//!
//! This module defines the error hierarchy for the entire pipeline.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use std::fmt;
use thiserror::Error;

/// Pipeline stage an error occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Loading and validating configuration
    Config,
    /// Reading the song catalog
    LoadSongs,
    /// Reading the activity log
    LoadLogs,
    /// Deriving and writing the songs table
    Songs,
    /// Deriving and writing the artists table
    Artists,
    /// Deriving and writing the users table
    Users,
    /// Deriving and writing the time table
    Time,
    /// Deriving and writing the songplays table
    Songplays,
}

impl Stage {
    /// Stage name as used in logs and error messages
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::LoadSongs => "load_songs",
            Self::LoadLogs => "load_logs",
            Self::Songs => "songs",
            Self::Artists => "artists",
            Self::Users => "users",
            Self::Time => "time",
            Self::Songplays => "songplays",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The main error type for the songplays ETL
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Source Errors
    // ============================================================================
    #[error("No source files match '{glob}'")]
    SourceNotFound { glob: String },

    #[error("Malformed record in {source_file}: {message}")]
    MalformedRecord {
        source_file: String,
        message: String,
    },

    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    // ============================================================================
    // Sink Errors
    // ============================================================================
    #[error("Failed to write {destination} (partition '{partition}'): {message}")]
    SinkWrite {
        destination: String,
        partition: String,
        message: String,
    },

    // ============================================================================
    // Arrow/Parquet/Storage Errors
    // ============================================================================
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Output error: {message}")]
    Output { message: String },

    // ============================================================================
    // Pipeline Errors
    // ============================================================================
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a source-not-found error
    pub fn source_not_found(glob: impl Into<String>) -> Self {
        Self::SourceNotFound { glob: glob.into() }
    }

    /// Create a malformed record error
    pub fn malformed(source_file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            source_file: source_file.into(),
            message: message.into(),
        }
    }

    /// Create a sink write error
    pub fn sink_write(
        destination: impl Into<String>,
        partition: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::SinkWrite {
            destination: destination.into(),
            partition: partition.into(),
            message: message.into(),
        }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Attach the pipeline stage to an error
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            // Keep the innermost stage
            err @ Self::Stage { .. } => err,
            err => Self::Stage {
                stage,
                source: Box::new(err),
            },
        }
    }

    /// Stage this error was raised in, if known
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Result type alias for the songplays ETL
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;

    /// Tag the error with the pipeline stage it occurred in
    fn stage(self, stage: Stage) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }

    fn stage(self, stage: Stage) -> Result<T> {
        self.map_err(|e| e.into().in_stage(stage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("credentials.aws_access_key_id");
        assert_eq!(
            err.to_string(),
            "Missing required config field: credentials.aws_access_key_id"
        );

        let err = Error::source_not_found("s3://bucket/log_data/*.json");
        assert_eq!(
            err.to_string(),
            "No source files match 's3://bucket/log_data/*.json'"
        );

        let err = Error::sink_write("out/time_table", "year=2018/month=11", "disk full");
        assert_eq!(
            err.to_string(),
            "Failed to write out/time_table (partition 'year=2018/month=11'): disk full"
        );
    }

    #[test]
    fn test_stage_wrapping() {
        let err = Error::source_not_found("song_data/*/*/*/*.json").in_stage(Stage::LoadSongs);
        assert_eq!(err.stage(), Some(Stage::LoadSongs));
        assert!(err.to_string().starts_with("Stage 'load_songs' failed:"));

        // Re-tagging keeps the first stage
        let err = err.in_stage(Stage::Songplays);
        assert_eq!(err.stage(), Some(Stage::LoadSongs));
    }

    #[test]
    fn test_malformed_display() {
        let err = Error::malformed("log_data/2018-11-01-events.json", "line 3: expected value");
        assert_eq!(
            err.to_string(),
            "Malformed record in log_data/2018-11-01-events.json: line 3: expected value"
        );
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }

    #[test]
    fn test_result_stage() {
        let result: Result<()> = Err(Error::output("boom"));
        let err = result.stage(Stage::Users).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Users));
    }
}
