//! Log Writer
//!
//! Handles appending entries to the transaction log file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::LogSyncStrategy;
use crate::error::{AtlasError, Result};
use crate::table::TableId;

use super::recovery::LogRecovery;
use super::{Action, LogEntry};

/// Writes entries to the transaction log file
pub struct LogWriter {
    path: PathBuf,
    file: File,
    /// LSN assigned to the next appended entry
    next_lsn: u64,
    sync_strategy: LogSyncStrategy,
    /// Entries written since the last fsync
    uncommitted: usize,
    /// File length after the last complete frame
    len: u64,
    /// Set when a failed append could not be cut from the file
    poisoned: bool,
    #[cfg(test)]
    fail_syncs: bool,
}

impl LogWriter {
    /// Open or create a log file for appending
    ///
    /// An existing file must end on a frame boundary; run
    /// [`LogRecovery::recover`] first if it might not.
    pub fn open(path: &Path, sync_strategy: LogSyncStrategy) -> Result<Self> {
        let next_lsn = if path.exists() {
            let result = LogRecovery::verify(path)?;
            if result.was_truncated {
                return Err(AtlasError::LogCorruption(format!(
                    "{} has an unrecovered tail",
                    path.display()
                )));
            }
            result.last_lsn + 1
        } else {
            1
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            next_lsn,
            sync_strategy,
            uncommitted: 0,
            len,
            poisoned: false,
            #[cfg(test)]
            fail_syncs: false,
        })
    }

    /// Append an action for `table` at `version`; returns the entry's LSN
    pub fn append(&mut self, table: &TableId, version: u64, action: Action) -> Result<u64> {
        self.append_entry(table, version, action).map(|entry| entry.lsn)
    }

    /// Append an action and return the entry exactly as it was persisted
    ///
    /// On error the frame is cut from the file again, so the file never holds
    /// an entry the caller was told failed.
    pub fn append_entry(&mut self, table: &TableId, version: u64, action: Action) -> Result<LogEntry> {
        if self.poisoned {
            return Err(AtlasError::LogWrite(format!(
                "{} holds an unretracted frame; reopen to recover",
                self.path.display()
            )));
        }

        let lsn = self.next_lsn;
        let entry = LogEntry::new(lsn, table.clone(), version, action);
        let bytes = entry.serialize()?;
        let start = self.len;

        if let Err(e) = self.file.write_all(&bytes) {
            self.retract(start);
            return Err(AtlasError::LogWrite(format!("{}: {}", self.path.display(), e)));
        }
        self.len += bytes.len() as u64;
        self.next_lsn += 1;
        self.uncommitted += 1;

        let sync_due = match self.sync_strategy {
            LogSyncStrategy::EveryWrite => true,
            LogSyncStrategy::EveryNEntries { count } => self.uncommitted >= count,
        };
        if sync_due {
            if let Err(e) = self.sync() {
                self.retract(start);
                self.next_lsn = lsn;
                self.uncommitted = self.uncommitted.saturating_sub(1);
                return Err(e);
            }
        }

        Ok(entry)
    }

    /// Cut the file back to `len` after a failed append
    ///
    /// If the cut itself fails, no further appends are accepted until the
    /// log is reopened and recovered.
    fn retract(&mut self, len: u64) {
        match self.file.set_len(len) {
            Ok(()) => self.len = len,
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "Failed to retract log frame");
                self.poisoned = true;
            }
        }
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        #[cfg(test)]
        if self.fail_syncs {
            return Err(AtlasError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected sync failure",
            )));
        }

        self.file.flush()?;
        self.file.sync_data()?;
        self.uncommitted = 0;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn set_fail_syncs(&mut self, fail: bool) {
        self.fail_syncs = fail;
    }

    /// LSN that the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Entries written but not yet fsynced
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::txlog::LogReader;
    use tempfile::TempDir;

    fn remove(path: &str) -> Action {
        Action::Remove { path: path.to_string() }
    }

    #[test]
    fn test_failed_sync_retracts_frame() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("actions.log");
        let table = TableId::parse("sales.orders").unwrap();
        let mut writer = LogWriter::open(&path, LogSyncStrategy::EveryWrite).unwrap();

        writer.append(&table, 1, remove("a")).unwrap();
        let len = std::fs::metadata(&path).unwrap().len();

        writer.set_fail_syncs(true);
        assert!(writer.append(&table, 2, remove("b")).is_err());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), len);
        assert_eq!(writer.current_lsn(), 2);

        writer.set_fail_syncs(false);
        assert_eq!(writer.append(&table, 2, remove("c")).unwrap(), 2);

        let entries: Vec<_> = LogReader::open(&path).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].action, remove("c"));
    }

    #[test]
    fn test_append_entry_matches_persisted_frame() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("actions.log");
        let table = TableId::parse("sales.orders").unwrap();
        let mut writer = LogWriter::open(&path, LogSyncStrategy::EveryWrite).unwrap();

        let entry = writer.append_entry(&table, 1, remove("a")).unwrap();

        let persisted: Vec<_> = LogReader::open(&path).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(persisted, vec![entry]);
    }
}
