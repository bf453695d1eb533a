//! Pipeline configuration
//!
//! Loaded from a YAML file, then overridden from the environment. The
//! storage credentials are opaque to the pipeline and only handed to the
//! storage layer.

use crate::decode::DecoderFormat;
use crate::error::{Error, Result};
use crate::output::ParquetWriterConfig;
use crate::types::{OverwriteMode, WeekdayConvention};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Default config file looked up when none is given
pub const DEFAULT_CONFIG_FILE: &str = "etl.yaml";

/// Complete pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlConfig {
    /// Storage credentials
    #[serde(default)]
    pub credentials: Credentials,

    /// Root of the raw data (`song_data/`, `log_data/` live below it)
    #[serde(default = "default_input")]
    pub input: String,

    /// Root the five table directories are written to
    #[serde(default = "default_output")]
    pub output: String,

    /// Layout of the source files
    #[serde(default)]
    pub input_format: DecoderFormat,

    /// Numbering of the time table's weekday column
    #[serde(default)]
    pub weekday_convention: WeekdayConvention,

    /// How existing table contents are replaced
    #[serde(default)]
    pub overwrite_mode: OverwriteMode,

    /// Parquet encoding settings
    #[serde(default)]
    pub parquet: ParquetSettings,
}

fn default_input() -> String {
    "s3://udacity-dend/".to_string()
}

fn default_output() -> String {
    "./output".to_string()
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            input: default_input(),
            output: default_output(),
            input_format: DecoderFormat::default(),
            weekday_convention: WeekdayConvention::default(),
            overwrite_mode: OverwriteMode::default(),
            parquet: ParquetSettings::default(),
        }
    }
}

/// Access key pair for the object store
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, alias = "AWS_ACCESS_KEY_ID")]
    pub aws_access_key_id: Option<String>,

    #[serde(default, alias = "AWS_SECRET_ACCESS_KEY")]
    pub aws_secret_access_key: Option<String>,

    #[serde(default)]
    pub region: Option<String>,
}

// Keep secrets out of debug logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("aws_access_key_id", &self.aws_access_key_id)
            .field(
                "aws_secret_access_key",
                &self.aws_secret_access_key.as_ref().map(|_| "***"),
            )
            .field("region", &self.region)
            .finish()
    }
}

impl Credentials {
    /// Whether both halves of the key pair are present
    pub fn is_complete(&self) -> bool {
        is_set(self.aws_access_key_id.as_deref()) && is_set(self.aws_secret_access_key.as_deref())
    }
}

/// Parquet writer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParquetSettings {
    /// Compression codec: snappy, zstd, gzip or none
    #[serde(default = "default_compression")]
    pub compression: String,

    /// Maximum rows per row group
    #[serde(default = "default_row_group_size")]
    pub row_group_size: usize,
}

fn default_compression() -> String {
    "snappy".to_string()
}

fn default_row_group_size() -> usize {
    1024 * 1024
}

impl Default for ParquetSettings {
    fn default() -> Self {
        Self {
            compression: default_compression(),
            row_group_size: default_row_group_size(),
        }
    }
}

impl EtlConfig {
    /// Parse configuration from YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    /// Load from an explicit file, the default file if present, or defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => {
                tracing::debug!("No {DEFAULT_CONFIG_FILE} found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Apply overrides from process environment variables
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("AWS_ACCESS_KEY_ID") {
            self.credentials.aws_access_key_id = Some(v);
        }
        if let Some(v) = get("AWS_SECRET_ACCESS_KEY") {
            self.credentials.aws_secret_access_key = Some(v);
        }
        if let Some(v) = get("AWS_REGION") {
            self.credentials.region = Some(v);
        }
        if let Some(v) = get("ETL_INPUT") {
            self.input = v;
        }
        if let Some(v) = get("ETL_OUTPUT") {
            self.output = v;
        }
        self
    }

    /// Set the input root
    #[must_use]
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = input.into();
        self
    }

    /// Set the output root
    #[must_use]
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
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

    /// Whether any location needs S3 credentials
    pub fn needs_s3_credentials(&self) -> bool {
        [&self.input, &self.output]
            .iter()
            .any(|loc| loc.starts_with("s3://") || loc.starts_with("s3a://"))
    }

    /// Check the configuration before any I/O happens
    pub fn validate(&self) -> Result<()> {
        if self.input.trim().is_empty() {
            return Err(Error::missing_field("input"));
        }
        if self.output.trim().is_empty() {
            return Err(Error::missing_field("output"));
        }

        if self.needs_s3_credentials() {
            if !is_set(self.credentials.aws_access_key_id.as_deref()) {
                return Err(Error::missing_field("credentials.aws_access_key_id"));
            }
            if !is_set(self.credentials.aws_secret_access_key.as_deref()) {
                return Err(Error::missing_field("credentials.aws_secret_access_key"));
            }
        }

        ParquetWriterConfig::from_settings(&self.parquet)?;

        if self.parquet.row_group_size == 0 {
            return Err(Error::invalid_value(
                "parquet.row_group_size",
                "must be greater than zero",
            ));
        }

        Ok(())
    }
}

fn is_set(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const FULL_YAML: &str = r"
credentials:
  aws_access_key_id: AKIAEXAMPLE
  aws_secret_access_key: secret
  region: us-west-2
input: s3://udacity-dend/
output: s3://my-lake/
input_format: jsonl
weekday_convention: iso
overwrite_mode: dynamic
parquet:
  compression: zstd
  row_group_size: 5000
";

    #[test]
    fn test_parse_full_config() {
        let config = EtlConfig::from_yaml(FULL_YAML).unwrap();
        assert_eq!(
            config.credentials.aws_access_key_id.as_deref(),
            Some("AKIAEXAMPLE")
        );
        assert_eq!(config.credentials.region.as_deref(), Some("us-west-2"));
        assert_eq!(config.output, "s3://my-lake/");
        assert_eq!(config.input_format, DecoderFormat::Jsonl);
        assert_eq!(config.weekday_convention, WeekdayConvention::Iso);
        assert_eq!(config.overwrite_mode, OverwriteMode::Dynamic);
        assert_eq!(config.parquet.compression, "zstd");
        assert_eq!(config.parquet.row_group_size, 5000);
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = EtlConfig::from_yaml("").unwrap();
        assert_eq!(config.input, "s3://udacity-dend/");
        assert_eq!(config.output, "./output");
        assert_eq!(config.input_format, DecoderFormat::Auto);
        assert_eq!(config.weekday_convention, WeekdayConvention::SundayFirst);
        assert_eq!(config.overwrite_mode, OverwriteMode::Static);
        assert_eq!(config.parquet.compression, "snappy");
    }

    #[test]
    fn test_uppercase_credential_keys() {
        let yaml = "credentials:\n  AWS_ACCESS_KEY_ID: a\n  AWS_SECRET_ACCESS_KEY: b\n";
        let config = EtlConfig::from_yaml(yaml).unwrap();
        assert!(config.credentials.is_complete());
    }

    #[test]
    fn test_missing_credentials_for_s3() {
        let config = EtlConfig::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::MissingConfigField { ref field } if field == "credentials.aws_access_key_id"
        ));

        let config = EtlConfig::from_yaml("credentials:\n  aws_access_key_id: a\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            Error::MissingConfigField { ref field } if field == "credentials.aws_secret_access_key"
        ));
    }

    #[test]
    fn test_local_locations_need_no_credentials() {
        let config = EtlConfig::default()
            .with_input("./data")
            .with_output("./out");
        config.validate().unwrap();
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("AWS_ACCESS_KEY_ID", "from-env"),
            ("AWS_SECRET_ACCESS_KEY", "secret-env"),
            ("ETL_OUTPUT", "memory://lake"),
            ("ETL_INPUT", "  "),
        ]
        .into_iter()
        .collect();

        let config = EtlConfig::default().with_overrides(|k| env.get(k).map(ToString::to_string));
        assert_eq!(
            config.credentials.aws_access_key_id.as_deref(),
            Some("from-env")
        );
        assert_eq!(config.output, "memory://lake");
        // Blank values don't override
        assert_eq!(config.input, "s3://udacity-dend/");
    }

    #[test]
    fn test_invalid_parquet_settings() {
        let mut config = EtlConfig::default().with_input("./in").with_output("./out");
        config.parquet.compression = "lz77".into();
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfigValue { .. })
        ));

        config.parquet.compression = "gzip".into();
        config.parquet.row_group_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_hides_secret() {
        let config = EtlConfig::from_yaml(FULL_YAML).unwrap();
        let debug = format!("{:?}", config.credentials);
        assert!(!debug.contains("\"secret\""));
        assert!(debug.contains("***"));
    }
}
