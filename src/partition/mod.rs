//! Output partitioning module
//!
//! Hive-style layout: every distinct combination of partition column values
//! gets its own `col=value/` directory, and the partition columns are removed
//! from the files written inside it.
//!
//! ```text
//! songs_table/year=1994/artist_id=ARD7TVE1187B99BFB1/part-00000-<run>.parquet
//! time_table/year=2018/month=11/part-00000-<run>.parquet
//! ```

mod layout;
mod types;

pub use layout::{escape_path_value, split_by_partition, unescape_path_value};
pub use types::{PartitionKey, PartitionedBatch, HIVE_DEFAULT_PARTITION};
