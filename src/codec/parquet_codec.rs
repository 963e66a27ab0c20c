//! Parquet implementation of the columnar codec
//!
//! Files are written to a temporary sibling first and renamed into place, so
//! a data file path either holds a complete file or does not exist.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use arrow::compute::kernels::concat::concat_batches;
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::{ArrowWriter, ProjectionMask};
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::{AtlasError, Result};

use super::{ColumnarCodec, FileStats};

/// Default number of rows per Parquet row group
const DEFAULT_MAX_ROW_GROUP_SIZE: usize = 64 * 1024;

/// Reads and writes Parquet data files on the local filesystem
#[derive(Debug, Clone)]
pub struct ParquetCodec {
    max_row_group_size: usize,
}

impl ParquetCodec {
    pub fn new() -> Self {
        Self {
            max_row_group_size: DEFAULT_MAX_ROW_GROUP_SIZE,
        }
    }

    /// Set the maximum rows per row group
    pub fn with_max_row_group_size(mut self, rows: usize) -> Self {
        self.max_row_group_size = rows.max(1);
        self
    }

    fn writer_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .set_max_row_group_size(self.max_row_group_size)
            .build()
    }

    fn read_inner(&self, path: &Path, projection: Option<&[usize]>) -> Result<RecordBatch> {
        let file = File::open(path)?;
        let mut builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

        if let Some(columns) = projection {
            let mask = ProjectionMask::leaves(builder.parquet_schema(), columns.iter().copied());
            builder = builder.with_projection(mask);
        }

        let reader = builder.build()?;
        let schema = reader.schema();

        let mut batches = Vec::new();
        for batch in reader {
            batches.push(batch?);
        }

        Ok(concat_batches(&schema, &batches)?)
    }

    fn write_inner(&self, path: &Path, batch: &RecordBatch) -> Result<FileStats> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = temp_path(path);
        let file = File::create(&tmp_path)?;

        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(self.writer_properties()))?;
        writer.write(batch)?;
        let file = writer.into_inner()?;
        file.sync_all()?;
        let file_size = file.metadata()?.len();
        drop(file);

        fs::rename(&tmp_path, path)?;

        Ok(FileStats {
            row_count: batch.num_rows() as u64,
            file_size,
        })
    }
}

impl Default for ParquetCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ColumnarCodec for ParquetCodec {
    fn read_file(&self, path: &Path, projection: Option<&[usize]>) -> Result<RecordBatch> {
        self.read_inner(path, projection)
            .map_err(|e| AtlasError::FileReadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }

    fn write_batch(&self, path: &Path, batch: &RecordBatch) -> Result<FileStats> {
        self.write_inner(path, batch).map_err(|e| {
            // Best effort: never leave a half-written temp file behind
            let _ = fs::remove_file(temp_path(path));
            AtlasError::FileWriteFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })
    }

    fn describe(&self) -> BTreeMap<String, String> {
        let mut stats = BTreeMap::new();
        stats.insert("format".to_string(), "parquet".to_string());
        stats.insert("compression".to_string(), "snappy".to_string());
        stats.insert(
            "max_row_group_size".to_string(),
            self.max_row_group_size.to_string(),
        );
        stats
    }
}

/// "data/x.parquet" → "data/x.parquet.tmp"
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
