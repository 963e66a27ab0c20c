//! Error types for AtlasTable
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using AtlasError
pub type Result<T> = std::result::Result<T, AtlasError>;

/// Unified error type for AtlasTable operations
#[derive(Debug, Error)]
pub enum AtlasError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Transaction Log Errors
    // -------------------------------------------------------------------------
    #[error("Transaction log corruption detected: {0}")]
    LogCorruption(String),

    #[error("Transaction log write failed: {0}")]
    LogWrite(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Version {requested} not found for table {table} (latest is {latest})")]
    VersionNotFound {
        table: String,
        requested: u64,
        latest: u64,
    },

    #[error("Invalid table identifier: {0:?}")]
    InvalidTableId(String),

    // -------------------------------------------------------------------------
    // Compaction / Optimization Errors
    // -------------------------------------------------------------------------
    #[error("No snapshot available for table {0}")]
    SnapshotUnavailable(String),

    #[error("No files to optimize for table {0}")]
    NoFilesToOptimize(String),

    #[error("No readable records found for table {0}")]
    NoRecordsFound(String),

    #[error("Failed to read data file {path}: {reason}")]
    FileReadFailed { path: String, reason: String },

    #[error("Failed to write data file {path}: {reason}")]
    FileWriteFailed { path: String, reason: String },

    #[error("{failed} log append(s) failed for table {table}: {reason}")]
    LogAppendFailed {
        table: String,
        failed: usize,
        reason: String,
    },

    // -------------------------------------------------------------------------
    // Columnar Data Errors
    // -------------------------------------------------------------------------
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Background task error: {0}")]
    Background(String),
}
