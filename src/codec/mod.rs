//! Columnar Codec Module
//!
//! Reads data files into Arrow record batches and writes record batches to
//! new data files.
//!
//! ## Contract
//! - `read_file`: path in, one `RecordBatch` out (all row groups concatenated)
//! - `write_batch`: batch in, `FileStats` out; parent directories are created
//!
//! Batches returned by `read_file` are owned by the caller and freed when
//! dropped. Nothing else about the physical file format leaks past this
//! module.

mod batch;
mod parquet_codec;
mod schema;

use std::collections::BTreeMap;
use std::path::Path;

use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use self::batch::{conform_to_schema, read_conformed, total_rows, ConformedInputs};
pub use self::parquet_codec::ParquetCodec;
pub use self::schema::{ColumnSchema, ColumnType, TableSchema, TimestampUnit};

/// Statistics returned after writing a data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStats {
    pub row_count: u64,
    pub file_size: u64,
}

/// Descriptor of a newly written data file, as recorded by an `Add` action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParquetFile {
    pub path: String,
    pub size: u64,
    pub row_count: u64,
    /// Codec-specific metadata, opaque to the log
    pub stats: BTreeMap<String, String>,
}

impl ParquetFile {
    /// Build a descriptor from write statistics
    pub fn from_stats(path: &Path, stats: FileStats) -> Self {
        Self {
            path: path.to_string_lossy().into_owned(),
            size: stats.file_size,
            row_count: stats.row_count,
            stats: BTreeMap::new(),
        }
    }

    pub fn with_stat(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.stats.insert(key.into(), value.into());
        self
    }
}

/// Encodes and decodes data files
pub trait ColumnarCodec: Send + Sync {
    /// Decode a full data file into one batch
    ///
    /// `projection` selects leaf columns by index; maintenance passes always
    /// pass `None` because they rewrite whole rows.
    fn read_file(&self, path: &Path, projection: Option<&[usize]>) -> Result<RecordBatch>;

    /// Encode `batch` to a new file at `path`
    fn write_batch(&self, path: &Path, batch: &RecordBatch) -> Result<FileStats>;

    /// Opaque metadata attached to every `ParquetFile` this codec produces
    fn describe(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Write `batch` and return the log descriptor for it
    fn write_file(&self, path: &Path, batch: &RecordBatch) -> Result<ParquetFile> {
        let stats = self.write_batch(path, batch)?;
        let mut file = ParquetFile::from_stats(path, stats);
        file.stats = self.describe();
        Ok(file)
    }
}
