//! Decoder implementations
//!
//! Each decoder handles a specific file layout.

use super::types::{Decoded, RecordDecoder};
use serde_json::Value;

// ============================================================================
// JSON Decoder
// ============================================================================

/// Whole-document JSON decoder
///
/// An object yields one record, an array yields its elements.
#[derive(Debug, Clone, Default)]
pub struct JsonDecoder;

impl JsonDecoder {
    /// Create a new JSON decoder
    pub fn new() -> Self {
        Self
    }
}

impl RecordDecoder for JsonDecoder {
    fn decode(&self, source: &str, body: &str) -> Decoded<Value> {
        if body.trim().is_empty() {
            return Decoded::new();
        }

        match serde_json::from_str::<Value>(body) {
            Ok(Value::Array(items)) => Decoded::from_records(items),
            Ok(value) => Decoded::from_records(vec![value]),
            Err(e) => {
                tracing::warn!(source, error = %e, "Skipping unparseable JSON document");
                Decoded {
                    records: Vec::new(),
                    skipped: 1,
                }
            }
        }
    }
}

// ============================================================================
// JSONL Decoder
// ============================================================================

/// JSON Lines decoder (one JSON object per line)
#[derive(Debug, Clone, Default)]
pub struct JsonlDecoder;

impl JsonlDecoder {
    /// Create a new JSONL decoder
    pub fn new() -> Self {
        Self
    }
}

impl RecordDecoder for JsonlDecoder {
    fn decode(&self, source: &str, body: &str) -> Decoded<Value> {
        let mut decoded = Decoded::new();

        for (line_num, line) in body.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<Value>(line) {
                Ok(value) => decoded.records.push(value),
                Err(e) => {
                    tracing::debug!(
                        source,
                        line = line_num + 1,
                        error = %e,
                        "Skipping unparseable JSONL line"
                    );
                    decoded.skipped += 1;
                }
            }
        }

        decoded
    }
}

// ============================================================================
// Auto Decoder
// ============================================================================

/// Accepts either layout
///
/// Catalog files hold a single object, log exports hold one object per line.
#[derive(Debug, Clone, Default)]
pub struct AutoDecoder;

impl AutoDecoder {
    /// Create a new auto-detecting decoder
    pub fn new() -> Self {
        Self
    }
}

impl RecordDecoder for AutoDecoder {
    fn decode(&self, source: &str, body: &str) -> Decoded<Value> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Decoded::new();
        }

        // A JSON Lines file with more than one object never parses as one document
        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Array(items)) => Decoded::from_records(items),
            Ok(value) => Decoded::from_records(vec![value]),
            Err(_) => JsonlDecoder.decode(source, body),
        }
    }
}
