//! WAL Writer
//!
//! Handles appending records to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{DriftError, Result};
use super::{LogRecord, WalRecovery};

/// The durable file a [`WalWriter`] appends to.
///
/// Implemented for `File`. Other implementations wrap a file to inject
/// disk failures.
pub trait WalFile: Send {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Flush written data (not necessarily metadata) to stable storage
    fn sync_data(&mut self) -> io::Result<()>;

    fn sync_all(&mut self) -> io::Result<()>;

    fn set_len(&mut self, len: u64) -> io::Result<()>;

    fn file_len(&self) -> io::Result<u64>;
}

impl WalFile for File {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        Write::write_all(self, bytes)
    }

    fn sync_data(&mut self) -> io::Result<()> {
        File::sync_data(self)
    }

    fn sync_all(&mut self) -> io::Result<()> {
        File::sync_all(self)
    }

    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    fn file_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

/// Appends records to the WAL file.
///
/// Every append is fsync'd before it returns: a record is acknowledged only
/// once it will survive a crash. Callers serialize access (the engine holds
/// the writer behind a mutex), so sequence numbers stay gapless.
pub struct WalWriter {
    file: Box<dyn WalFile>,
    path: PathBuf,

    /// Length of the durable, valid prefix of the file
    len: u64,

    /// Sequence number the next appended record must carry
    next_seq: u64,

    /// Set when a failed append could not be rolled back. The tail of the
    /// file is then unknown and nothing more may be appended.
    poisoned: bool,
}

impl WalWriter {
    /// Open or create a WAL file, discarding any invalid tail first
    pub fn open(path: &Path) -> Result<Self> {
        let (_, result) = WalRecovery::recover(path)?;
        Self::resume(path, result.last_seq)
    }

    /// Open a WAL whose valid prefix ends at `last_seq`.
    ///
    /// The file must already have been recovered (its tail truncated).
    pub fn resume(path: &Path, last_seq: u64) -> Result<Self> {
        let file = Self::open_file(path)?;
        Self::with_file(path, Box::new(file), last_seq)
    }

    /// Append to an already opened log file whose valid prefix ends at
    /// `last_seq`. `path` is only used in messages.
    pub fn with_file(path: &Path, file: Box<dyn WalFile>, last_seq: u64) -> Result<Self> {
        let len = file.file_len()?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            len,
            next_seq: last_seq + 1,
            poisoned: false,
        })
    }

    /// Open (creating if needed) the log file for appending
    pub fn open_file(path: &Path) -> Result<File> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        // Make the directory entry durable for a freshly created log
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
                tracing::warn!(
                    dir = %parent.display(),
                    error = %e,
                    "could not fsync WAL directory; a crash may lose a newly created log"
                );
            }
        }

        Ok(file)
    }

    /// Append a record and fsync it. Returns the byte offset the frame was
    /// written at.
    ///
    /// The record must carry `next_seq()`. On failure nothing is
    /// acknowledged and the file is rolled back to its previous length.
    pub fn append(&mut self, record: &LogRecord) -> Result<u64> {
        if self.poisoned {
            return Err(DriftError::WalWrite(format!(
                "{} is unusable after an unrecovered write failure",
                self.path.display()
            )));
        }

        if record.seq != self.next_seq {
            return Err(DriftError::WalWrite(format!(
                "out-of-order append: expected seq {}, got {}",
                self.next_seq, record.seq
            )));
        }

        let frame = record.encode()?;
        let offset = self.len;

        let written = self
            .file
            .write_all(&frame)
            .and_then(|_| self.file.sync_data());

        if let Err(e) = written {
            tracing::error!(
                path = %self.path.display(),
                seq = record.seq,
                error = %e,
                "WAL append failed"
            );
            self.rollback();
            return Err(DriftError::WalWrite(e.to_string()));
        }

        self.len += frame.len() as u64;
        self.next_seq += 1;

        tracing::trace!(seq = record.seq, offset, bytes = frame.len(), "WAL record synced");
        Ok(offset)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Sequence number the next record must carry
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Sequence number of the last durable record, 0 if none
    pub fn last_seq(&self) -> u64 {
        self.next_seq - 1
    }

    /// Byte length of the durable log
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn rollback(&mut self) {
        let restored = self
            .file
            .set_len(self.len)
            .and_then(|_| self.file.sync_all());

        if let Err(e) = restored {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "could not roll back partial WAL write; refusing further appends"
            );
            self.poisoned = true;
        }
    }
}
