//! Small-file compactor
//!
//! Merges a table's undersized files into one new file per pass. The log is
//! only touched after the merged file is durable; per-action log failures
//! are logged and counted rather than failing the pass.

use std::path::PathBuf;
use std::sync::Arc;

use arrow::compute::concat_batches;

use crate::codec::{read_conformed, total_rows, ColumnarCodec, ParquetFile, TableSchema};
use crate::config::CompactionConfig;
use crate::error::{AtlasError, Result};
use crate::table::{DataFileNamer, FilePurpose, TableId};
use crate::txlog::{FileInfo, FileLog, Snapshot};

/// Outcome of one compaction pass
#[derive(Debug, Clone)]
pub struct CompactionReport {
    pub table: TableId,
    /// Small files chosen for this pass
    pub selected: usize,
    /// Selected files whose rows made it into the output
    pub merged: usize,
    /// Selected files the codec could not decode (retired)
    pub unreadable: usize,
    /// Selected files that decoded but did not fit the table schema; they
    /// stay live
    pub rejected: usize,
    pub output: Option<ParquetFile>,
    /// Remove/add appends that failed
    pub log_failures: usize,
}

impl CompactionReport {
    fn noop(table: &TableId) -> Self {
        Self {
            table: table.clone(),
            selected: 0,
            merged: 0,
            unreadable: 0,
            rejected: 0,
            output: None,
            log_failures: 0,
        }
    }

    /// True when the pass changed nothing
    pub fn is_noop(&self) -> bool {
        self.output.is_none()
    }
}

/// Threshold-triggered small-file merger
pub struct Compactor {
    log: Arc<dyn FileLog>,
    codec: Arc<dyn ColumnarCodec>,
    base_path: PathBuf,
    config: CompactionConfig,
}

impl Compactor {
    pub fn new(
        log: Arc<dyn FileLog>,
        codec: Arc<dyn ColumnarCodec>,
        base_path: impl Into<PathBuf>,
        config: CompactionConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            log,
            codec,
            base_path: base_path.into(),
            config,
        })
    }

    pub fn config(&self) -> &CompactionConfig {
        &self.config
    }

    /// Files below `min_file_size`, in log order, at most
    /// `max_files_to_compact` of them
    pub fn identify_small_files(&self, snapshot: &Snapshot) -> Vec<FileInfo> {
        snapshot
            .files
            .iter()
            .filter(|f| f.size < self.config.min_file_size)
            .take(self.config.max_files_to_compact)
            .cloned()
            .collect()
    }

    /// Run one merge pass over `table`'s small files
    ///
    /// Fewer than two small files is a no-op: a lone small file is left in
    /// place, since rewriting it would not reduce the file count.
    ///
    /// Every selected file is retired except those whose rows could not be
    /// conformed to the table schema; those keep their data and stay live.
    pub fn compact_table(&self, table: &TableId) -> Result<CompactionReport> {
        let snapshot = self.log.snapshot(table, None).map_err(|e| match e {
            AtlasError::TableNotFound(t) => AtlasError::SnapshotUnavailable(t),
            other => other,
        })?;

        let small = self.identify_small_files(&snapshot);
        if small.len() < 2 {
            tracing::debug!(table = %table, small_files = small.len(), "Nothing to compact");
            return Ok(CompactionReport::noop(table));
        }

        tracing::info!(
            table = %table,
            version = snapshot.version,
            files = small.len(),
            "Compacting small files"
        );

        let merged = self.compact_files(table, &small, &snapshot.schema)?;

        let mut log_failures = 0;
        for file in small.iter().filter(|f| !merged.rejected.contains(&f.path)) {
            if let Err(e) = self.log.append_remove(table, &file.path) {
                tracing::warn!(table = %table, path = %file.path, error = %e, "Failed to log remove, skipping");
                log_failures += 1;
            }
        }
        if let Err(e) = self.log.append_add(table, &merged.output) {
            tracing::warn!(table = %table, path = %merged.output.path, error = %e, "Failed to log add of merged file");
            log_failures += 1;
        }

        tracing::info!(
            table = %table,
            merged = merged.sources,
            unreadable = merged.unreadable,
            rejected = merged.rejected.len(),
            rows = merged.output.row_count,
            output = %merged.output.path,
            log_failures,
            "Compaction complete"
        );

        Ok(CompactionReport {
            table: table.clone(),
            selected: small.len(),
            merged: merged.sources,
            unreadable: merged.unreadable,
            rejected: merged.rejected.len(),
            output: Some(merged.output),
            log_failures,
        })
    }

    /// Read, merge and write `files` as one new data file
    fn compact_files(
        &self,
        table: &TableId,
        files: &[FileInfo],
        schema: &TableSchema,
    ) -> Result<MergedFile> {
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
        let rejected: Vec<String> = inputs.rejected.into_iter().map(|(path, _)| path).collect();
        let batches = inputs.batches;
        let Some(target) = inputs.schema.filter(|_| !batches.is_empty()) else {
            return Err(AtlasError::NoRecordsFound(table.to_string()));
        };

        let sources = batches.len();
        let expected_rows = total_rows(&batches);
        let merged = concat_batches(&target, &batches)?;
        drop(batches);
        debug_assert_eq!(merged.num_rows(), expected_rows);

        let path = DataFileNamer::new(&self.base_path, table, FilePurpose::Compaction).single();
        let output = self.codec.write_file(&path, &merged)?;

        Ok(MergedFile {
            output,
            sources,
            unreadable,
            rejected,
        })
    }
}

struct MergedFile {
    output: ParquetFile,
    sources: usize,
    unreadable: usize,
    rejected: Vec<String>,
}
