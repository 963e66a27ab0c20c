//! Snapshots: a table's live file set folded from its log history

use std::collections::{BTreeMap, HashMap};

use crate::codec::{ParquetFile, TableSchema};
use crate::error::{AtlasError, Result};
use crate::table::TableId;

use super::Action;

/// A data file that is live in a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: String,
    pub size: u64,
    pub row_count: u64,
}

impl From<&ParquetFile> for FileInfo {
    fn from(file: &ParquetFile) -> Self {
        Self {
            path: file.path.clone(),
            size: file.size,
            row_count: file.row_count,
        }
    }
}

/// One action as recorded in a table's history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub version: u64,
    pub action: Action,
    pub timestamp: u64,
}

/// Materialized view of a table at one log version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub table: TableId,
    pub version: u64,
    /// Live files in the order they were added
    pub files: Vec<FileInfo>,
    pub schema: TableSchema,
}

impl Snapshot {
    /// Fold `records` (in version order) up to and including `version`.
    ///
    /// A duplicate `Add` of a live path and a `Remove` of a path that is not
    /// live are ignored, so every history folds to exactly one snapshot.
    pub fn fold(table: &TableId, records: &[LogRecord], version: u64) -> Self {
        // add-sequence → file, so iteration preserves log order
        let mut live: BTreeMap<u64, FileInfo> = BTreeMap::new();
        let mut by_path: HashMap<String, u64> = HashMap::new();
        let mut schema = TableSchema::default();

        for record in records.iter().take_while(|r| r.version <= version) {
            match &record.action {
                Action::Add(file) => {
                    if by_path.contains_key(&file.path) {
                        tracing::warn!(table = %table, path = %file.path, version = record.version, "Ignoring duplicate add");
                        continue;
                    }
                    by_path.insert(file.path.clone(), record.version);
                    live.insert(record.version, FileInfo::from(file));
                }
                Action::Remove { path } => match by_path.remove(path) {
                    Some(seq) => {
                        live.remove(&seq);
                    }
                    None => {
                        tracing::warn!(table = %table, path = %path, version = record.version, "Ignoring remove of file that is not live");
                    }
                },
                Action::SetSchema(s) => schema = s.clone(),
            }
        }

        Self {
            table: table.clone(),
            version,
            files: live.into_values().collect(),
            schema,
        }
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    pub fn total_rows(&self) -> u64 {
        self.files.iter().map(|f| f.row_count).sum()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.iter().any(|f| f.path == path)
    }
}

/// Ordered action history of one table
#[derive(Debug, Clone, Default)]
pub(crate) struct TableHistory {
    records: Vec<LogRecord>,
}

impl TableHistory {
    pub(crate) fn latest_version(&self) -> u64 {
        self.records.last().map(|r| r.version).unwrap_or(0)
    }

    pub(crate) fn push(&mut self, record: LogRecord) {
        self.records.push(record);
    }

    pub(crate) fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// `None` means latest
    pub(crate) fn snapshot(&self, table: &TableId, version: Option<u64>) -> Result<Snapshot> {
        let latest = self.latest_version();
        let version = match version {
            None => latest,
            Some(v) if v > latest => {
                return Err(AtlasError::VersionNotFound {
                    table: table.to_string(),
                    requested: v,
                    latest,
                })
            }
            Some(v) => v,
        };
        Ok(Snapshot::fold(table, &self.records, version))
    }
}
