//! Transaction Log Module
//!
//! Append-only, versioned record of which data files make up each table.
//!
//! ## Responsibilities
//! - Append `Add` / `Remove` / `SetSchema` actions, one table version each
//! - Reconstruct snapshots by folding actions up to a version
//! - CRC32 checksums and crash recovery for the on-disk log
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Entry 1                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Entry 2                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```
//! `Data` is a bincode-encoded [`LogEntry`].

mod disk;
mod entry;
mod memory;
mod reader;
mod recovery;
mod snapshot;
mod writer;

pub use disk::{DiskFileLog, LOG_FILENAME};
pub use entry::{Action, LogEntry, HEADER_SIZE};
pub use memory::MemoryFileLog;
pub use reader::LogReader;
pub use recovery::{LogRecovery, RecoveryResult};
pub use snapshot::{FileInfo, LogRecord, Snapshot};
pub use writer::LogWriter;

use crate::codec::{ParquetFile, TableSchema};
use crate::error::Result;
use crate::table::TableId;

/// The metadata surface maintenance passes depend on.
///
/// Implementations must be safe to call from several threads; each append
/// creates exactly one new table version.
pub trait FileLog: Send + Sync {
    /// Snapshot of `table` at `version` (`None` = latest).
    ///
    /// Fails with `TableNotFound` if the table has no recorded actions.
    fn snapshot(&self, table: &TableId, version: Option<u64>) -> Result<Snapshot>;

    /// Durably record `action`; returns the new table version
    fn append(&self, table: &TableId, action: Action) -> Result<u64>;

    /// Every table with at least one recorded action, sorted
    fn list_tables(&self) -> Result<Vec<TableId>>;

    /// Full action history of `table`, in version order
    fn history(&self, table: &TableId) -> Result<Vec<LogRecord>>;

    /// Latest version of `table`
    fn latest_version(&self, table: &TableId) -> Result<u64> {
        Ok(self.snapshot(table, None)?.version)
    }

    fn append_add(&self, table: &TableId, file: &ParquetFile) -> Result<u64> {
        self.append(table, Action::Add(file.clone()))
    }

    fn append_remove(&self, table: &TableId, path: &str) -> Result<u64> {
        self.append(
            table,
            Action::Remove {
                path: path.to_string(),
            },
        )
    }

    fn append_schema(&self, table: &TableId, schema: &TableSchema) -> Result<u64> {
        self.append(table, Action::SetSchema(schema.clone()))
    }
}
