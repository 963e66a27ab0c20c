//! In-memory file log, for tests and embedded use

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::{AtlasError, Result};
use crate::table::TableId;

use super::entry::now_millis;
use super::snapshot::TableHistory;
use super::{Action, FileLog, LogRecord, Snapshot};

/// A `FileLog` that keeps every table's history in memory
#[derive(Default)]
pub struct MemoryFileLog {
    tables: RwLock<BTreeMap<TableId, TableHistory>>,
}

impl MemoryFileLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FileLog for MemoryFileLog {
    fn snapshot(&self, table: &TableId, version: Option<u64>) -> Result<Snapshot> {
        let tables = self.tables.read();
        let history = tables
            .get(table)
            .ok_or_else(|| AtlasError::TableNotFound(table.to_string()))?;
        history.snapshot(table, version)
    }

    fn append(&self, table: &TableId, action: Action) -> Result<u64> {
        let mut tables = self.tables.write();
        let history = tables.entry(table.clone()).or_default();
        let version = history.latest_version() + 1;
        history.push(LogRecord {
            version,
            action,
            timestamp: now_millis(),
        });
        Ok(version)
    }

    fn list_tables(&self) -> Result<Vec<TableId>> {
        Ok(self.tables.read().keys().cloned().collect())
    }

    fn history(&self, table: &TableId) -> Result<Vec<LogRecord>> {
        self.tables
            .read()
            .get(table)
            .map(|h| h.records().to_vec())
            .ok_or_else(|| AtlasError::TableNotFound(table.to_string()))
    }
}
