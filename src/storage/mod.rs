//! Storage module
//!
//! The storage collaborator of the pipeline: reads raw JSON from, and writes
//! partitioned Parquet to, any `object_store` backend.
//!
//! # Overview
//!
//! - [`Storage`]: a store plus a root prefix, parsed from a URL
//! - [`RecordSource`]: glob-addressed JSON input
//! - [`TableSink`]: partitioned, overwrite-mode table output
//!
//! Writes are staged under `_temporary/<run-id>/` at the storage root and only
//! moved into the destination once every partition has been staged.

mod location;
mod sink;
mod source;

pub use location::{Storage, StorageScheme};
pub use sink::{ParquetSink, TableSink, WriteSummary, STAGING_DIR, SUCCESS_MARKER};
pub use source::{glob_literal_prefix, RecordSource};
