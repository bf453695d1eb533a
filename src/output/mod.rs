//! Output module
//!
//! Handles Arrow RecordBatch creation and Parquet encoding.
//!
//! # Overview
//!
//! This module provides utilities for:
//! - The fixed Arrow schemas of the five output tables
//! - Converting derived rows to Arrow RecordBatches
//! - Encoding and decoding Parquet files in memory
//! - Rendering batches back to JSON for inspection

mod schema;
mod writer;

pub use schema::{arrow_to_json, TableRows};
pub use writer::{encode_parquet, read_parquet, ParquetWriter, ParquetWriterConfig};

#[cfg(test)]
mod tests;
