//! CLI module
//!
//! Command-line interface for running the pipeline.
//!
//! # Commands
//!
//! - `run` - Run the pipeline once (the default when no command is given)
//! - `check` - Validate configuration and count source files

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat, OverwriteArg, WeekdayArg};
pub use runner::Runner;
