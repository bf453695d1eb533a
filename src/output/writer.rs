//! Parquet encoding
//!
//! Files are encoded into memory and handed to the storage layer as bytes,
//! so a partition is either fully encoded or not written at all.

use crate::config::ParquetSettings;
use crate::error::{Error, Result};
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::sync::Arc;

/// Codec and layout of the Parquet files a table is written as
#[derive(Debug, Clone)]
pub struct ParquetWriterConfig {
    compression: Compression,
    row_group_size: usize,
}

impl Default for ParquetWriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: 1024 * 1024,
        }
    }
}

impl ParquetWriterConfig {
    /// Snappy, 1M rows per row group
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `parquet` section of the pipeline config
    pub fn from_settings(settings: &ParquetSettings) -> Result<Self> {
        let compression = match settings.compression.to_lowercase().as_str() {
            "snappy" => Compression::SNAPPY,
            "zstd" => Compression::ZSTD(ZstdLevel::default()),
            "gzip" => Compression::GZIP(GzipLevel::default()),
            "none" | "uncompressed" => Compression::UNCOMPRESSED,
            other => {
                return Err(Error::invalid_value(
                    "parquet.compression",
                    format!("unsupported codec '{other}'"),
                ))
            }
        };
        Ok(Self {
            compression,
            row_group_size: settings.row_group_size,
        })
    }

    /// Set the codec
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set row group size
    #[must_use]
    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Compression codec
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Maximum rows per row group
    pub fn row_group_size(&self) -> usize {
        self.row_group_size
    }

    /// File name suffix for the codec, e.g. `.snappy.parquet`
    pub fn file_suffix(&self) -> &'static str {
        match self.compression {
            Compression::SNAPPY => ".snappy.parquet",
            Compression::ZSTD(_) => ".zstd.parquet",
            Compression::GZIP(_) => ".gz.parquet",
            _ => ".parquet",
        }
    }

    fn build_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size.max(1))
            .set_created_by(format!("{} {}", crate::NAME, crate::VERSION))
            .build()
    }
}

/// In-memory Parquet file writer
pub struct ParquetWriter {
    /// Arrow writer
    writer: ArrowWriter<Vec<u8>>,
    /// Number of rows written
    rows_written: usize,
}

impl ParquetWriter {
    /// Create a new Parquet writer
    pub fn new(schema: &Schema, config: &ParquetWriterConfig) -> Result<Self> {
        let props = config.build_properties();
        let writer = ArrowWriter::try_new(Vec::new(), Arc::new(schema.clone()), Some(props))
            .map_err(|e| Error::Output {
                message: format!("Failed to create Parquet writer: {e}"),
            })?;

        Ok(Self {
            writer,
            rows_written: 0,
        })
    }

    /// Write a RecordBatch
    pub fn write(&mut self, batch: &RecordBatch) -> Result<()> {
        self.writer.write(batch).map_err(|e| Error::Output {
            message: format!("Failed to write batch: {e}"),
        })?;

        self.rows_written += batch.num_rows();
        Ok(())
    }

    /// Get the number of rows written so far
    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Finalize the file and return its bytes
    pub fn finish(self) -> Result<Bytes> {
        let buffer = self.writer.into_inner().map_err(|e| Error::Output {
            message: format!("Failed to close Parquet writer: {e}"),
        })?;
        Ok(Bytes::from(buffer))
    }
}

/// Encode a single RecordBatch as a Parquet file
pub fn encode_parquet(batch: &RecordBatch, config: &ParquetWriterConfig) -> Result<Bytes> {
    let mut writer = ParquetWriter::new(batch.schema().as_ref(), config)?;
    writer.write(batch)?;
    writer.finish()
}

/// Decode a Parquet file held in memory
pub fn read_parquet(data: Bytes) -> Result<Vec<RecordBatch>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(data)?.build()?;
    reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::from)
}
