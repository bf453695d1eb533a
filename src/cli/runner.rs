//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::EtlConfig;
use crate::engine::Pipeline;
use crate::error::Result;
use serde::Serialize;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match self.cli.command.unwrap_or(Commands::Run) {
            Commands::Run => self.run_pipeline().await,
            Commands::Check => self.check().await,
        }
    }

    /// Load configuration: file, then environment, then command-line flags
    fn load_config(&self) -> Result<EtlConfig> {
        let config = EtlConfig::load(self.cli.config.as_deref())?.with_env_overrides();
        Ok(self.apply_flags(config))
    }

    /// Apply command-line overrides to a loaded configuration
    fn apply_flags(&self, mut config: EtlConfig) -> EtlConfig {
        if let Some(input) = &self.cli.input {
            config = config.with_input(input.clone());
        }
        if let Some(output) = &self.cli.output {
            config = config.with_output(output.clone());
        }
        if let Some(weekday) = self.cli.weekday {
            config = config.with_weekday_convention(weekday.into());
        }
        if let Some(mode) = self.cli.overwrite_mode {
            config = config.with_overwrite_mode(mode.into());
        }
        config
    }

    async fn run_pipeline(&self) -> Result<()> {
        let config = self.load_config()?;
        tracing::debug!(?config, "Resolved configuration");

        let pipeline = Pipeline::from_config(&config)?;
        let summary = pipeline.run().await?;
        self.output(&summary)
    }

    async fn check(&self) -> Result<()> {
        let config = self.load_config()?;
        let pipeline = Pipeline::from_config(&config)?;
        let report = pipeline.check().await?;
        self.output(&report)
    }

    /// Print a value in the selected format
    fn output<T: Serialize>(&self, value: &T) -> Result<()> {
        let rendered = match self.cli.format {
            OutputFormat::Json => serde_json::to_string(value)?,
            OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
        };
        println!("{rendered}");
        Ok(())
    }
}
