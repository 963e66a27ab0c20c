//! Table identifiers and data file layout
//!
//! Tables are named `database.table`. Data files live under
//! `{base}/{database}/{table}/data/` and are named
//! `{prefix}-{short_id}[-{index}].parquet`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};

/// Database used when a table identifier has no `.`
pub const DEFAULT_DATABASE: &str = "default";

/// Extension of every data file
pub const DATA_FILE_EXTENSION: &str = "parquet";

const DATA_DIR: &str = "data";

/// Length of the random token in generated file names
const SHORT_ID_LEN: usize = 8;

/// A parsed `database.table` identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId {
    database: String,
    table: String,
}

impl TableId {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Result<Self> {
        let database = database.into();
        let table = table.into();
        if database.is_empty() || table.is_empty() {
            return Err(AtlasError::InvalidTableId(format!("{}.{}", database, table)));
        }
        Ok(Self { database, table })
    }

    /// Parse `database.table`, splitting on the first `.`
    ///
    /// `"orders"` → `default.orders`, `"a.b.c"` → database `a`, table `b.c`.
    pub fn parse(id: &str) -> Result<Self> {
        match id.split_once('.') {
            Some((database, table)) => Self::new(database, table)
                .map_err(|_| AtlasError::InvalidTableId(id.to_string())),
            None => Self::new(DEFAULT_DATABASE, id)
                .map_err(|_| AtlasError::InvalidTableId(id.to_string())),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Directory holding this table's data files
    pub fn data_dir(&self, base: &Path) -> PathBuf {
        base.join(&self.database).join(&self.table).join(DATA_DIR)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

impl FromStr for TableId {
    type Err = AtlasError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Purpose of a generated data file, used as its name prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilePurpose {
    /// Rows appended by a writer
    Ingest,
    /// Output of small-file compaction
    Compaction,
    /// Output of Z-order clustering
    ZOrder,
}

impl FilePurpose {
    pub fn prefix(self) -> &'static str {
        match self {
            FilePurpose::Ingest => "part",
            FilePurpose::Compaction => "compact",
            FilePurpose::ZOrder => "zorder",
        }
    }
}

/// Generates collision-free data file paths for one write operation.
///
/// All files produced by one namer share its short id; multi-file outputs
/// are told apart by their index.
#[derive(Debug, Clone)]
pub struct DataFileNamer {
    dir: PathBuf,
    purpose: FilePurpose,
    short_id: String,
}

impl DataFileNamer {
    pub fn new(base: &Path, table: &TableId, purpose: FilePurpose) -> Self {
        Self {
            dir: table.data_dir(base),
            purpose,
            short_id: short_id(),
        }
    }

    pub fn short_id(&self) -> &str {
        &self.short_id
    }

    /// `{prefix}-{short_id}.parquet`
    pub fn single(&self) -> PathBuf {
        self.dir.join(format!(
            "{}-{}.{}",
            self.purpose.prefix(),
            self.short_id,
            DATA_FILE_EXTENSION
        ))
    }

    /// `{prefix}-{short_id}-{index}.parquet`
    pub fn indexed(&self, index: usize) -> PathBuf {
        self.dir.join(format!(
            "{}-{}-{}.{}",
            self.purpose.prefix(),
            self.short_id,
            index,
            DATA_FILE_EXTENSION
        ))
    }
}

/// 8 hex characters from a random v4 UUID
pub fn short_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(SHORT_ID_LEN);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_database_and_table() {
        let id = TableId::parse("sales.orders").unwrap();
        assert_eq!(id.database(), "sales");
        assert_eq!(id.table(), "orders");
        assert_eq!(id.to_string(), "sales.orders");
    }

    #[test]
    fn test_parse_without_dot_uses_default() {
        let id = TableId::parse("orders").unwrap();
        assert_eq!(id.database(), DEFAULT_DATABASE);
        assert_eq!(id.table(), "orders");
    }

    #[test]
    fn test_parse_splits_on_first_dot() {
        let id = TableId::parse("a.b.c").unwrap();
        assert_eq!(id.database(), "a");
        assert_eq!(id.table(), "b.c");
    }

    #[test]
    fn test_parse_rejects_empty_parts() {
        assert!(TableId::parse("").is_err());
        assert!(TableId::parse(".orders").is_err());
        assert!(TableId::parse("sales.").is_err());
    }

    #[test]
    fn test_generated_paths() {
        let table = TableId::parse("sales.orders").unwrap();
        let namer = DataFileNamer::new(Path::new("/base"), &table, FilePurpose::ZOrder);
        let id = namer.short_id().to_string();

        assert_eq!(id.len(), 8);
        assert_eq!(
            namer.single(),
            PathBuf::from(format!("/base/sales/orders/data/zorder-{}.parquet", id))
        );
        assert_eq!(
            namer.indexed(3),
            PathBuf::from(format!("/base/sales/orders/data/zorder-{}-3.parquet", id))
        );
    }

    #[test]
    fn test_short_ids_differ() {
        assert_ne!(short_id(), short_id());
    }
}
