//! Decoder types and traits
//!
//! Defines the core decoder abstractions.

use crate::error::Error;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Layout of a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderFormat {
    /// Whole-document JSON if it parses, JSON Lines otherwise
    #[default]
    Auto,
    /// One JSON object or an array of objects
    Json,
    /// JSON Lines format (one JSON object per line)
    Jsonl,
}

/// Records decoded from one or more files, with the count of rejected ones
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    /// Successfully decoded records, in file order
    pub records: Vec<T>,
    /// Lines or elements that were skipped
    pub skipped: usize,
}

impl<T> Default for Decoded<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped: 0,
        }
    }
}

impl<T> Decoded<T> {
    /// Create an empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from records with nothing skipped
    pub fn from_records(records: Vec<T>) -> Self {
        Self {
            records,
            skipped: 0,
        }
    }

    /// Number of accepted records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records were accepted
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append another result, keeping order
    pub fn extend(&mut self, other: Decoded<T>) {
        self.records.extend(other.records);
        self.skipped += other.skipped;
    }
}

impl Decoded<Value> {
    /// Deserialize every value into `T`, skipping the ones that don't fit
    pub fn into_typed<T: DeserializeOwned>(self, source: &str) -> Decoded<T> {
        let mut out = Decoded {
            records: Vec::with_capacity(self.records.len()),
            skipped: self.skipped,
        };

        for (idx, value) in self.records.into_iter().enumerate() {
            if !value.is_object() {
                tracing::debug!(source, index = idx, "Skipping non-object record");
                out.skipped += 1;
                continue;
            }
            match serde_json::from_value::<T>(value) {
                Ok(record) => out.records.push(record),
                Err(e) => {
                    let err = Error::malformed(source, format!("record {idx}: {e}"));
                    tracing::debug!(error = %err, "Skipping record");
                    out.skipped += 1;
                }
            }
        }

        out
    }
}

/// Trait for decoding file bodies into records
pub trait RecordDecoder: Send + Sync {
    /// Decode a file body; `source` names the file for diagnostics
    fn decode(&self, source: &str, body: &str) -> Decoded<Value>;
}
