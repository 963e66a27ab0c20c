//! Log Reader
//!
//! Handles reading entries from the transaction log file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{AtlasError, Result};

use super::entry::{FrameHeader, HEADER_SIZE};
use super::LogEntry;

/// Upper bound on a single frame's payload; larger lengths mean garbage
const MAX_ENTRY_SIZE: u32 = 64 * 1024 * 1024;

/// Outcome of reading one frame
#[derive(Debug)]
pub(crate) enum Frame {
    /// A complete, checksummed entry
    Entry(LogEntry),
    /// Clean end of file at a frame boundary
    End,
    /// File ends inside a frame (partial write)
    Torn,
    /// Complete frame whose checksum or payload is invalid
    Corrupt(String),
}

/// Reads entries from the transaction log file
pub struct LogReader {
    reader: BufReader<File>,
    /// Offset just past the last complete, valid frame
    position: u64,
    /// Set once an error or the end of file has been reached
    done: bool,
}

impl LogReader {
    /// Open a log file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            done: false,
        })
    }

    /// Offset just past the last valid frame read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read the next entry from the log
    ///
    /// Returns `Ok(None)` at a clean end of file and `LogCorruption` for a
    /// torn or corrupt frame.
    pub fn next_entry(&mut self) -> Result<Option<LogEntry>> {
        match self.next_frame()? {
            Frame::Entry(entry) => Ok(Some(entry)),
            Frame::End => Ok(None),
            Frame::Torn => Err(AtlasError::LogCorruption(format!(
                "partial frame at offset {}",
                self.position
            ))),
            Frame::Corrupt(reason) => Err(AtlasError::LogCorruption(reason)),
        }
    }

    pub(crate) fn next_frame(&mut self) -> Result<Frame> {
        let mut header = [0u8; HEADER_SIZE];
        match read_full(&mut self.reader, &mut header)? {
            0 => return Ok(Frame::End),
            n if n < HEADER_SIZE => return Ok(Frame::Torn),
            _ => {}
        }
        let header = FrameHeader::parse(&header);
        if header.len > MAX_ENTRY_SIZE {
            return Ok(Frame::Corrupt(format!(
                "implausible entry length {} at offset {}",
                header.len, self.position
            )));
        }

        let mut data = vec![0u8; header.len as usize];
        if read_full(&mut self.reader, &mut data)? < data.len() {
            return Ok(Frame::Torn);
        }

        match LogEntry::decode_payload(&header, &data) {
            Ok(entry) => {
                self.position += (HEADER_SIZE + data.len()) as u64;
                Ok(Frame::Entry(entry))
            }
            Err(e) => Ok(Frame::Corrupt(e.to_string())),
        }
    }
}

impl Iterator for LogReader {
    type Item = Result<LogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Read until `buf` is full or EOF; returns bytes read
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
