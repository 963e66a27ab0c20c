//! Log Entry definitions
//!
//! Defines the structure of individual transaction log entries and their
//! on-disk framing.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::codec::{ParquetFile, TableSchema};
use crate::error::{AtlasError, Result};
use crate::table::TableId;

/// Frame header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// A change to a table's live file set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// A data file became part of the table
    Add(ParquetFile),

    /// A data file stopped being part of the table
    Remove { path: String },

    /// The table's column schema was (re)declared
    SetSchema(TableSchema),
}

impl Action {
    pub fn is_add(&self) -> bool {
        matches!(self, Action::Add(_))
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, Action::Remove { .. })
    }
}

/// A single entry in the transaction log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Log Sequence Number - monotonically increasing across all tables
    pub lsn: u64,

    /// Table the action applies to
    pub table: TableId,

    /// Table version created by this action (per table, starts at 1)
    pub version: u64,

    /// The recorded action
    pub action: Action,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Parsed frame header
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameHeader {
    pub lsn: u64,
    pub crc: u32,
    pub len: u32,
}

impl FrameHeader {
    pub(crate) fn parse(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut lsn = [0u8; 8];
        let mut crc = [0u8; 4];
        let mut len = [0u8; 4];
        lsn.copy_from_slice(&bytes[0..8]);
        crc.copy_from_slice(&bytes[8..12]);
        len.copy_from_slice(&bytes[12..16]);
        Self {
            lsn: u64::from_le_bytes(lsn),
            crc: u32::from_le_bytes(crc),
            len: u32::from_le_bytes(len),
        }
    }
}

impl LogEntry {
    pub fn new(lsn: u64, table: TableId, version: u64, action: Action) -> Self {
        Self {
            lsn,
            table,
            version,
            action,
            timestamp: now_millis(),
        }
    }

    /// Encode as `[LSN][CRC][Len][bincode data]`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data =
            bincode::serialize(self).map_err(|e| AtlasError::Serialization(e.to_string()))?;
        let len = u32::try_from(data.len())
            .map_err(|_| AtlasError::LogWrite(format!("entry too large: {} bytes", data.len())))?;
        let crc = crc32fast::hash(&data);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + data.len());
        bytes.extend_from_slice(&self.lsn.to_le_bytes());
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&data);
        Ok(bytes)
    }

    /// Decode one frame, verifying its checksum
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(AtlasError::LogCorruption(format!(
                "frame too short: {} bytes",
                bytes.len()
            )));
        }

        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&bytes[..HEADER_SIZE]);
        let header = FrameHeader::parse(&header);

        let end = HEADER_SIZE + header.len as usize;
        if bytes.len() < end {
            return Err(AtlasError::LogCorruption(format!(
                "frame truncated: need {} bytes, have {}",
                end,
                bytes.len()
            )));
        }

        Self::decode_payload(&header, &bytes[HEADER_SIZE..end])
    }

    pub(crate) fn decode_payload(header: &FrameHeader, data: &[u8]) -> Result<Self> {
        let crc = crc32fast::hash(data);
        if crc != header.crc {
            return Err(AtlasError::LogCorruption(format!(
                "CRC mismatch at lsn {}: expected {:08x}, got {:08x}",
                header.lsn, header.crc, crc
            )));
        }

        let entry: LogEntry =
            bincode::deserialize(data).map_err(|e| AtlasError::LogCorruption(e.to_string()))?;

        if entry.lsn != header.lsn {
            return Err(AtlasError::LogCorruption(format!(
                "LSN mismatch: header {}, body {}",
                header.lsn, entry.lsn
            )));
        }

        Ok(entry)
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
