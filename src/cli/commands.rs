//! CLI commands and argument parsing

use crate::types::{OverwriteMode, WeekdayConvention};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Turn song catalog and activity log JSON into partitioned Parquet tables
#[derive(Parser, Debug)]
#[command(name = "songplays-etl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML); defaults to ./etl.yaml when present
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Input root (s3://bucket/prefix, gs://, az://, memory:// or a local path)
    #[arg(short, long, global = true)]
    pub input: Option<String>,

    /// Output root for the five tables
    #[arg(short, long, global = true)]
    pub output: Option<String>,

    /// Numbering of the time table's weekday column
    #[arg(long, global = true)]
    pub weekday: Option<WeekdayArg>,

    /// How existing table contents are replaced
    #[arg(long, global = true)]
    pub overwrite_mode: Option<OverwriteArg>,

    /// Summary format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the pipeline once
    Run,

    /// Validate configuration and count source files without writing
    Check,
}

/// Summary output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Single-line JSON
    Json,
    /// Indented JSON
    Pretty,
}

/// `--weekday` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WeekdayArg {
    /// 1 = Sunday ... 7 = Saturday
    SundayFirst,
    /// 1 = Monday ... 7 = Sunday
    Iso,
}

impl From<WeekdayArg> for WeekdayConvention {
    fn from(arg: WeekdayArg) -> Self {
        match arg {
            WeekdayArg::SundayFirst => Self::SundayFirst,
            WeekdayArg::Iso => Self::Iso,
        }
    }
}

/// `--overwrite-mode` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OverwriteArg {
    /// Replace the whole table
    Static,
    /// Replace only the partitions being written
    Dynamic,
}

impl From<OverwriteArg> for OverwriteMode {
    fn from(arg: OverwriteArg) -> Self {
        match arg {
            OverwriteArg::Static => Self::Static,
            OverwriteArg::Dynamic => Self::Dynamic,
        }
    }
}
