//! Z-order clustering pass
//!
//! ## Pass Flow:
//! 1. Read every input file, conforming it to the table schema
//! 2. Compute one Z-value per row from the configured columns
//! 3. Stable-sort all rows by Z-value
//! 4. Cut the sorted rows into size-bounded partitions, write each one
//! 5. Retire the rewritten and undecodable inputs, then add every output
//!
//! Outputs are all written before the log is touched, so a failed write
//! leaves the table unchanged.

use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef};
use arrow::compute::kernels::interleave::interleave;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use crate::codec::{read_conformed, ColumnarCodec, ParquetFile, TableSchema};
use crate::config::ZOrderConfig;
use crate::error::{AtlasError, Result};
use crate::table::{DataFileNamer, FilePurpose, TableId};
use crate::txlog::{FileInfo, FileLog};

use super::interleave::interleave_bits;
use super::normalize::normalize_column;

/// A row's position across the input batches, keyed by its Z-value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZOrderedRow {
    pub z_value: u64,
    pub batch: usize,
    pub row: usize,
}

/// Outcome of one clustering pass
#[derive(Debug, Clone)]
pub struct OptimizeReport {
    pub table: TableId,
    /// Input files retired from the log (rewritten or undecodable)
    pub files_removed: usize,
    pub files_written: Vec<ParquetFile>,
    /// Rows rewritten
    pub rows: usize,
    /// Inputs skipped because they could not be read
    pub unreadable: usize,
    /// Inputs left live because they did not fit the table schema
    pub rejected: usize,
}

/// Rewrites a table's files so rows close in the clustering columns share
/// a file
pub struct ZOrderOptimizer {
    log: Arc<dyn FileLog>,
    codec: Arc<dyn ColumnarCodec>,
    base_path: PathBuf,
    config: ZOrderConfig,
    target_file_size: u64,
}

impl ZOrderOptimizer {
    pub fn new(
        log: Arc<dyn FileLog>,
        codec: Arc<dyn ColumnarCodec>,
        base_path: impl Into<PathBuf>,
        config: ZOrderConfig,
        target_file_size: u64,
    ) -> Result<Self> {
        config.validate()?;
        if config.columns.is_empty() {
            return Err(AtlasError::Config(
                "z-order needs at least one column".into(),
            ));
        }
        if target_file_size == 0 {
            return Err(AtlasError::Config("target_file_size must be > 0".into()));
        }

        Ok(Self {
            log,
            codec,
            base_path: base_path.into(),
            config,
            target_file_size,
        })
    }

    pub fn config(&self) -> &ZOrderConfig {
        &self.config
    }

    /// Interleave already-normalized dimension values into one key
    pub fn compute_z_value(&self, normalized: &[u64]) -> u64 {
        interleave_bits(normalized, self.config.bits_per_dim)
    }

    /// Cluster every live file of the latest snapshot
    pub fn optimize_latest(&self, table: &TableId) -> Result<OptimizeReport> {
        let snapshot = self.log.snapshot(table, None).map_err(|e| match e {
            AtlasError::TableNotFound(t) => AtlasError::SnapshotUnavailable(t),
            other => other,
        })?;
        self.optimize_table(table, &snapshot.files, &snapshot.schema)
    }

    /// Cluster `files` of `table` into new Z-ordered files
    ///
    /// An empty `schema` means "use the first readable file's schema".
    /// Inputs that decode but cannot be conformed to it are not rewritten
    /// and stay in the log.
    pub fn optimize_table(
        &self,
        table: &TableId,
        files: &[FileInfo],
        schema: &TableSchema,
    ) -> Result<OptimizeReport> {
        if files.is_empty() {
            return Err(AtlasError::NoFilesToOptimize(table.to_string()));
        }

        tracing::info!(
            table = %table,
            files = files.len(),
            columns = ?self.config.columns,
            "Starting z-order optimization"
        );

        let inputs = read_conformed(
            self.codec.as_ref(),
            files.iter().map(|f| f.path.as_str()),
            schema,
        );
        for (path, e) in &inputs.unreadable {
            tracing::warn!(table = %table, path = %path, error = %e, "Skipping unreadable file");
        }
        for (path, e) in &inputs.rejected {
            tracing::warn!(table = %table, path = %path, error = %e, "File does not fit table schema, leaving it live");
        }

        let unreadable = inputs.unreadable.len();
        let rejected = inputs.rejected.len();
        let retired: Vec<FileInfo> = files
            .iter()
            .filter(|f| !inputs.is_rejected(&f.path))
            .cloned()
            .collect();
        let batches = inputs.batches;
        let Some(target_schema) = inputs.schema.filter(|_| !batches.is_empty()) else {
            return Err(AtlasError::NoRecordsFound(table.to_string()));
        };

        let rows = self.sorted_rows(table, &batches)?;
        let row_count = rows.len();
        let partitions = partition_rows(
            row_count,
            self.config.row_size_estimate,
            self.target_file_size,
        );

        let namer = DataFileNamer::new(&self.base_path, table, FilePurpose::ZOrder);
        let mut written: Vec<ParquetFile> = Vec::with_capacity(partitions.len());

        for (index, range) in partitions.into_iter().enumerate() {
            let path = namer.indexed(index);
            let result = gather_rows(&target_schema, &batches, &rows[range])
                .and_then(|batch| self.codec.write_file(&path, &batch));

            match result {
                Ok(file) => {
                    tracing::debug!(table = %table, path = %file.path, rows = file.row_count, "Wrote z-order file");
                    written.push(file);
                }
                Err(e) => {
                    tracing::error!(table = %table, path = %path.display(), error = %e, "Z-order write failed, aborting pass");
                    discard_outputs(&written);
                    return Err(as_write_failure(&path, e));
                }
            }
        }

        // Source rows are no longer needed once every output is durable
        drop(rows);
        drop(batches);

        self.update_log(table, &retired, &written)?;

        tracing::info!(
            table = %table,
            removed = retired.len(),
            written = written.len(),
            rows = row_count,
            unreadable,
            rejected,
            "Z-order optimization complete"
        );

        Ok(OptimizeReport {
            table: table.clone(),
            files_removed: retired.len(),
            files_written: written,
            rows: row_count,
            unreadable,
            rejected,
        })
    }

    /// Z-value of every row, sorted ascending (ties keep input order)
    fn sorted_rows(&self, table: &TableId, batches: &[RecordBatch]) -> Result<Vec<ZOrderedRow>> {
        let bits = self.config.bits_per_dim;
        let mut rows = Vec::with_capacity(batches.iter().map(RecordBatch::num_rows).sum());

        for (batch_index, batch) in batches.iter().enumerate() {
            let dims = self
                .config
                .columns
                .iter()
                .map(|name| match batch.column_by_name(name) {
                    Some(column) => normalize_column(column, bits),
                    None => {
                        if batch_index == 0 {
                            tracing::warn!(table = %table, column = %name, "Z-order column missing, using 0");
                        }
                        Ok(vec![0; batch.num_rows()])
                    }
                })
                .collect::<Result<Vec<_>>>()?;

            let mut values = vec![0u64; dims.len()];
            for row in 0..batch.num_rows() {
                for (slot, dim) in values.iter_mut().zip(&dims) {
                    *slot = dim[row];
                }
                rows.push(ZOrderedRow {
                    z_value: self.compute_z_value(&values),
                    batch: batch_index,
                    row,
                });
            }
        }

        rows.sort_by_key(|r| r.z_value);
        Ok(rows)
    }

    /// Remove every input, then add every output
    ///
    /// Keeps going past failures and reports them together.
    fn update_log(&self, table: &TableId, inputs: &[FileInfo], outputs: &[ParquetFile]) -> Result<()> {
        let mut failed = 0;
        let mut first_reason: Option<String> = None;

        for file in inputs {
            if let Err(e) = self.log.append_remove(table, &file.path) {
                tracing::error!(table = %table, path = %file.path, error = %e, "Failed to log remove");
                failed += 1;
                first_reason.get_or_insert_with(|| e.to_string());
            }
        }

        for file in outputs {
            if let Err(e) = self.log.append_add(table, file) {
                tracing::error!(table = %table, path = %file.path, error = %e, "Failed to log add");
                failed += 1;
                first_reason.get_or_insert_with(|| e.to_string());
            }
        }

        match first_reason {
            None => Ok(()),
            Some(reason) => Err(AtlasError::LogAppendFailed {
                table: table.to_string(),
                failed,
                reason,
            }),
        }
    }
}

/// Split `count` sorted rows into consecutive ranges of roughly
/// `target_bytes` each, at `row_bytes` per row
pub fn partition_rows(count: usize, row_bytes: u64, target_bytes: u64) -> Vec<Range<usize>> {
    let per_file = target_bytes.div_ceil(row_bytes.max(1)).max(1);
    let per_file = usize::try_from(per_file).unwrap_or(usize::MAX);

    (0..count)
        .step_by(per_file)
        .map(|start| start..start.saturating_add(per_file).min(count))
        .collect()
}

/// Assemble `rows` (in order) from `batches` into one batch
fn gather_rows(schema: &SchemaRef, batches: &[RecordBatch], rows: &[ZOrderedRow]) -> Result<RecordBatch> {
    let indices: Vec<(usize, usize)> = rows.iter().map(|r| (r.batch, r.row)).collect();

    let columns = (0..schema.fields().len())
        .map(|col| -> Result<ArrayRef> {
            let sources: Vec<&dyn Array> = batches.iter().map(|b| b.column(col).as_ref()).collect();
            Ok(interleave(&sources, &indices)?)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RecordBatch::try_new_with_options(
        schema.clone(),
        columns,
        &RecordBatchOptions::new().with_row_count(Some(rows.len())),
    )?)
}

fn as_write_failure(path: &Path, error: AtlasError) -> AtlasError {
    match error {
        e @ AtlasError::FileWriteFailed { .. } => e,
        other => AtlasError::FileWriteFailed {
            path: path.display().to_string(),
            reason: other.to_string(),
        },
    }
}

/// Best-effort removal of outputs that will never be referenced
fn discard_outputs(files: &[ParquetFile]) {
    for file in files {
        if let Err(e) = fs::remove_file(&file.path) {
            tracing::warn!(path = %file.path, error = %e, "Failed to remove orphaned output");
        }
    }
}
