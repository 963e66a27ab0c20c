//! Configuration for AtlasTable
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AtlasError, Result};

/// Main configuration for an AtlasTable instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for the transaction log and all table data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── _txn_log/actions.log      (append-only file log)
    ///     └── {database}/{table}/data/  (parquet data files)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Transaction Log Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the transaction log
    pub log_sync_strategy: LogSyncStrategy,

    // -------------------------------------------------------------------------
    // Maintenance Configuration
    // -------------------------------------------------------------------------
    /// Small-file compaction policy
    pub compaction: CompactionConfig,

    /// Z-order clustering parameters
    pub zorder: ZOrderConfig,
}

/// Transaction log sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSyncStrategy {
    /// fsync after every append (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

/// Thresholds for small-file compaction.
///
/// Read-only once handed to a [`Compactor`](crate::compaction::Compactor) or
/// [`AutoCompactor`](crate::compaction::AutoCompactor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionConfig {
    /// Desired size of rewritten files (also the Z-order partition size)
    pub target_file_size: u64,

    /// Files strictly smaller than this are compaction candidates
    pub min_file_size: u64,

    /// Upper bound on files merged in one pass
    pub max_files_to_compact: usize,

    /// How often the auto-compactor sweeps all tables
    pub check_interval: Duration,
}

/// Parameters for Z-order clustering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZOrderConfig {
    /// Clustering dimensions (column names)
    pub columns: Vec<String>,

    /// Bits kept per dimension when interleaving
    pub bits_per_dim: u32,

    /// Estimated bytes per row, used to size output files
    pub row_size_estimate: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./atlastable_data"),
            log_sync_strategy: LogSyncStrategy::EveryWrite,
            compaction: CompactionConfig::default(),
            zorder: ZOrderConfig::default(),
        }
    }
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            target_file_size: 1024 * 1024 * 1024, // 1 GiB
            min_file_size: 64 * 1024 * 1024,      // 64 MiB
            max_files_to_compact: 32,
            check_interval: Duration::from_secs(300),
        }
    }
}

impl Default for ZOrderConfig {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            bits_per_dim: crate::zorder::DEFAULT_BITS_PER_DIM,
            row_size_estimate: crate::zorder::DEFAULT_ROW_SIZE_ESTIMATE,
        }
    }
}

impl CompactionConfig {
    /// Check thresholds for values that would stall or spin a pass
    pub fn validate(&self) -> Result<()> {
        if self.target_file_size == 0 {
            return Err(AtlasError::Config("target_file_size must be > 0".into()));
        }
        if self.max_files_to_compact == 0 {
            return Err(AtlasError::Config("max_files_to_compact must be > 0".into()));
        }
        if self.check_interval.is_zero() {
            return Err(AtlasError::Config("check_interval must be > 0".into()));
        }
        Ok(())
    }
}

impl ZOrderConfig {
    /// Create a config clustering on the given columns with default widths
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Check that the interleaved key fits in 64 bits
    pub fn validate(&self) -> Result<()> {
        if self.bits_per_dim == 0 || self.bits_per_dim > 32 {
            return Err(AtlasError::Config(format!(
                "bits_per_dim must be in 1..=32, got {}",
                self.bits_per_dim
            )));
        }
        if self.row_size_estimate == 0 {
            return Err(AtlasError::Config("row_size_estimate must be > 0".into()));
        }
        let total_bits = self.columns.len() as u64 * self.bits_per_dim as u64;
        if total_bits > 64 {
            return Err(AtlasError::Config(format!(
                "{} columns x {} bits exceeds the 64-bit z-value budget",
                self.columns.len(),
                self.bits_per_dim
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        if let LogSyncStrategy::EveryNEntries { count: 0 } = self.log_sync_strategy {
            return Err(AtlasError::Config("sync count must be > 0".into()));
        }
        self.compaction.validate()?;
        self.zorder.validate()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the transaction log sync strategy
    pub fn log_sync_strategy(mut self, strategy: LogSyncStrategy) -> Self {
        self.config.log_sync_strategy = strategy;
        self
    }

    /// Set the target size of rewritten files (in bytes)
    pub fn target_file_size(mut self, bytes: u64) -> Self {
        self.config.compaction.target_file_size = bytes;
        self
    }

    /// Set the size below which a file counts as small (in bytes)
    pub fn min_file_size(mut self, bytes: u64) -> Self {
        self.config.compaction.min_file_size = bytes;
        self
    }

    /// Set the maximum number of files merged per compaction pass
    pub fn max_files_to_compact(mut self, count: usize) -> Self {
        self.config.compaction.max_files_to_compact = count;
        self
    }

    /// Set the auto-compaction sweep interval
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.config.compaction.check_interval = interval;
        self
    }

    /// Set the Z-order clustering columns
    pub fn zorder_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.zorder.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Set the bits kept per Z-order dimension
    pub fn bits_per_dim(mut self, bits: u32) -> Self {
        self.config.zorder.bits_per_dim = bits;
        self
    }

    /// Set the per-row size estimate used by Z-order repartitioning
    pub fn row_size_estimate(mut self, bytes: u64) -> Self {
        self.config.zorder.row_size_estimate = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
