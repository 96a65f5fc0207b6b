//! WAL Reader
//!
//! Handles reading records from the WAL file.

use std::fs;
use std::path::Path;

use crate::error::{DriftError, Result};
use super::record::decode_frame;
use super::LogRecord;

/// Reads records from the WAL file.
///
/// Loads the whole file into memory and walks it frame by frame. The first
/// frame that is torn, fails its checksum, or breaks the gapless sequence
/// ends the valid prefix; nothing after it is trusted.
pub struct WalReader {
    data: Vec<u8>,
    position: usize,
    last_seq: Option<u64>,
    finished: bool,
}

impl WalReader {
    /// Open a WAL file for reading. A missing file reads as empty.
    pub fn open(path: &Path) -> Result<Self> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self::from_bytes(data))
    }

    /// Read records from an in-memory copy of a WAL
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            position: 0,
            last_seq: None,
            finished: false,
        }
    }

    /// Read the next record.
    ///
    /// `Ok(None)` at a clean end of log. An error marks the durability
    /// boundary; every later call returns `Ok(None)`.
    pub fn next_record(&mut self) -> Result<Option<LogRecord>> {
        if self.finished || self.position >= self.data.len() {
            return Ok(None);
        }

        let remaining = &self.data[self.position..];
        let (record, consumed) = match decode_frame(remaining) {
            Ok(Some(decoded)) => decoded,
            Ok(None) => {
                self.finished = true;
                return Err(DriftError::WalCorruption(format!(
                    "torn frame at offset {} ({} trailing bytes)",
                    self.position,
                    remaining.len()
                )));
            }
            Err(e) => {
                self.finished = true;
                return Err(e);
            }
        };

        if let Some(prev) = self.last_seq {
            if record.seq != prev + 1 {
                self.finished = true;
                return Err(DriftError::WalCorruption(format!(
                    "sequence gap at offset {}: expected {}, found {}",
                    self.position,
                    prev + 1,
                    record.seq
                )));
            }
        }

        self.position += consumed;
        self.last_seq = Some(record.seq);
        Ok(Some(record))
    }

    /// Byte length of the valid prefix read so far
    pub fn valid_len(&self) -> u64 {
        self.position as u64
    }

    /// Total size of the file as loaded
    pub fn total_len(&self) -> u64 {
        self.data.len() as u64
    }

    /// Sequence number of the last valid record read, 0 if none
    pub fn last_seq(&self) -> u64 {
        self.last_seq.unwrap_or(0)
    }

    /// Iterate over all valid records
    pub fn records(&mut self) -> WalIterator<'_> {
        WalIterator { reader: self }
    }
}

/// Iterator over WAL records. Yields records until EOF, or until the first
/// invalid frame, which is yielded once as an error.
pub struct WalIterator<'a> {
    reader: &'a mut WalReader,
}

impl<'a> Iterator for WalIterator<'a> {
    type Item = Result<LogRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_record().transpose()
    }
}
