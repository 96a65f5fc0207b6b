//! WAL Recovery
//!
//! Finds the durability boundary of a WAL after a crash.

use std::fs::OpenOptions;
use std::path::Path;

use crate::error::Result;
use super::{LogRecord, WalReader};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of records in the valid prefix
    pub records_recovered: u64,

    /// Byte length of the valid prefix
    pub valid_len: u64,

    /// Bytes past the valid prefix (torn or corrupted tail)
    pub bytes_discarded: u64,

    /// Last valid sequence number, 0 for an empty log
    pub last_seq: u64,

    /// Whether the file was (or, for `verify`, would be) truncated
    pub was_truncated: bool,

    /// Why the valid prefix ended early, if it did
    pub boundary_reason: Option<String>,
}

impl WalRecovery {
    /// Recover records from a WAL file
    ///
    /// This will:
    /// 1. Read frames until EOF or the first invalid frame
    /// 2. Truncate the file at that boundary and fsync it
    /// 3. Return the valid records in sequence order
    ///
    /// A missing file recovers as empty.
    pub fn recover(path: &Path) -> Result<(Vec<LogRecord>, RecoveryResult)> {
        let (records, result) = Self::scan(path)?;

        if result.was_truncated {
            tracing::warn!(
                path = %path.display(),
                valid_records = result.records_recovered,
                bytes_discarded = result.bytes_discarded,
                reason = result.boundary_reason.as_deref().unwrap_or("unknown"),
                "WAL tail discarded during recovery"
            );

            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(result.valid_len)?;
            file.sync_all()?;
        }

        Ok((records, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, result) = Self::scan(path)?;
        Ok(result)
    }

    fn scan(path: &Path) -> Result<(Vec<LogRecord>, RecoveryResult)> {
        let mut reader = WalReader::open(path)?;
        let mut records = Vec::new();
        let mut boundary_reason = None;

        for item in reader.records() {
            match item {
                Ok(record) => records.push(record),
                Err(e) => boundary_reason = Some(e.to_string()),
            }
        }

        let bytes_discarded = reader.total_len() - reader.valid_len();
        let result = RecoveryResult {
            records_recovered: records.len() as u64,
            valid_len: reader.valid_len(),
            bytes_discarded,
            last_seq: reader.last_seq(),
            was_truncated: bytes_discarded > 0,
            boundary_reason,
        };

        Ok((records, result))
    }
}
