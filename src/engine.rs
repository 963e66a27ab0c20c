//! Engine Module
//!
//! Ties the transaction log, the data file codec and the maintenance passes
//! together behind one handle.
//!
//! ## Responsibilities
//! - Recover the transaction log on startup
//! - Register tables and append new data files
//! - Serve snapshots and full-table scans
//! - Run compaction and Z-order passes, on demand or in the background

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::record_batch::RecordBatch;

use crate::codec::{conform_to_schema, ColumnarCodec, ParquetCodec, ParquetFile, TableSchema};
use crate::compaction::{AutoCompactor, AutoCompactorHandle, CompactionReport, Compactor};
use crate::config::{Config, ZOrderConfig};
use crate::error::{AtlasError, Result};
use crate::table::{DataFileNamer, FilePurpose, TableId};
use crate::txlog::{DiskFileLog, FileLog, Snapshot, LOG_FILENAME};
use crate::zorder::{OptimizeReport, ZOrderOptimizer};

/// The table storage engine
///
/// ## Concurrency Model
/// - All methods take `&self`; the log serializes appends internally
/// - Data files are immutable, so scans never block writers
/// - Maintenance passes on the same table are not mutually exclusive;
///   callers (or the single auto-compactor thread) serialize them
pub struct Engine {
    config: Config,

    /// Durable record of every table's file set
    log: Arc<DiskFileLog>,

    codec: Arc<ParquetCodec>,

    compactor: Arc<Compactor>,
}

impl Engine {
    // =========================================================================
    // Path Constants
    // =========================================================================
    pub const LOG_DIR: &'static str = "_txn_log";

    /// Location of the transaction log file under `data_dir`
    pub fn log_file_path(data_dir: &Path) -> PathBuf {
        data_dir.join(Self::LOG_DIR).join(LOG_FILENAME)
    }

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Validate the config
    /// 2. Create the data directory
    /// 3. Recover the transaction log (truncating any torn tail)
    /// 4. Build the compactor
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let log_dir = config.data_dir.join(Self::LOG_DIR);
        let log = Arc::new(DiskFileLog::open(&log_dir, config.log_sync_strategy)?);
        let codec = Arc::new(ParquetCodec::new());

        let compactor = Arc::new(Compactor::new(
            log.clone(),
            codec.clone(),
            config.data_dir.clone(),
            config.compaction.clone(),
        )?);

        tracing::info!(
            data_dir = %config.data_dir.display(),
            next_lsn = log.current_lsn(),
            "Engine opened"
        );

        Ok(Self {
            config,
            log,
            codec,
            compactor,
        })
    }

    /// Open with a path, using the default config otherwise
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    // =========================================================================
    // Tables and data
    // =========================================================================

    /// Record `schema` as the table's schema; returns the new version
    ///
    /// Calling it again replaces the schema; existing files are conformed to
    /// the latest schema when read.
    pub fn create_table(&self, table: &TableId, schema: &TableSchema) -> Result<u64> {
        let version = self.log.append_schema(table, schema)?;
        tracing::info!(table = %table, version, columns = schema.columns.len(), "Table schema recorded");
        Ok(version)
    }

    /// Write `batch` as a new data file and add it to the table
    ///
    /// A table without a schema adopts the batch's schema first.
    pub fn insert(&self, table: &TableId, batch: &RecordBatch) -> Result<ParquetFile> {
        let schema = match self.log.snapshot(table, None) {
            Ok(snapshot) if !snapshot.schema.is_empty() => snapshot.schema,
            Ok(_) | Err(AtlasError::TableNotFound(_)) => {
                let schema = TableSchema::from_arrow(batch.schema().as_ref())?;
                self.log.append_schema(table, &schema)?;
                schema
            }
            Err(e) => return Err(e),
        };

        let batch = conform_to_schema(batch, &schema.to_arrow())?;
        let path = DataFileNamer::new(&self.config.data_dir, table, FilePurpose::Ingest).single();
        let file = self.codec.write_file(&path, &batch)?;
        let version = self.log.append_add(table, &file)?;

        tracing::debug!(table = %table, path = %file.path, rows = file.row_count, version, "Inserted data file");
        Ok(file)
    }

    /// Snapshot of `table` at `version` (`None` = latest)
    pub fn snapshot(&self, table: &TableId, version: Option<u64>) -> Result<Snapshot> {
        self.log.snapshot(table, version)
    }

    /// Read every live file of `table` at `version`, in log order
    pub fn scan(&self, table: &TableId, version: Option<u64>) -> Result<Vec<RecordBatch>> {
        let snapshot = self.log.snapshot(table, version)?;
        let schema = (!snapshot.schema.is_empty()).then(|| snapshot.schema.to_arrow());

        snapshot
            .files
            .iter()
            .map(|file| {
                let batch = self.codec.read_file(Path::new(&file.path), None)?;
                match &schema {
                    Some(schema) => conform_to_schema(&batch, schema),
                    None => Ok(batch),
                }
            })
            .collect()
    }

    pub fn list_tables(&self) -> Result<Vec<TableId>> {
        self.log.list_tables()
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Merge the table's small files once
    pub fn compact_table(&self, table: &TableId) -> Result<CompactionReport> {
        self.compactor.compact_table(table)
    }

    /// Z-order the table's live files on `columns`
    ///
    /// Uses the configured bit width and row estimate; an empty `columns`
    /// falls back to the configured clustering columns.
    pub fn optimize_table(&self, table: &TableId, columns: &[String]) -> Result<OptimizeReport> {
        let config = if columns.is_empty() {
            self.config.zorder.clone()
        } else {
            ZOrderConfig {
                columns: columns.to_vec(),
                ..self.config.zorder.clone()
            }
        };

        let optimizer = ZOrderOptimizer::new(
            self.log.clone(),
            self.codec.clone(),
            self.config.data_dir.clone(),
            config,
            self.config.compaction.target_file_size,
        )?;
        optimizer.optimize_latest(table)
    }

    /// Start sweeping every table every `check_interval`
    pub fn start_auto_compaction(&self) -> Result<AutoCompactorHandle> {
        AutoCompactor::new(
            self.compactor.clone(),
            self.log.clone(),
            self.config.compaction.check_interval,
        )
        .start()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Flush and fsync the transaction log
    pub fn sync(&self) -> Result<()> {
        self.log.sync()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Path of the transaction log file
    pub fn log_path(&self) -> PathBuf {
        self.log.path().to_path_buf()
    }

    pub fn log(&self) -> Arc<DiskFileLog> {
        self.log.clone()
    }

    pub fn compactor(&self) -> Arc<Compactor> {
        self.compactor.clone()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.log.sync() {
            tracing::error!(error = %e, "Failed to sync transaction log on close");
        }
    }
}
