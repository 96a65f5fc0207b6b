//! WAL Record definitions
//!
//! Defines the structure of individual log records and their on-disk frame.

use serde::{Deserialize, Serialize};

use crate::error::{DriftError, Result};

/// Frame header: payload length (4) + CRC32 of payload (4)
pub const HEADER_SIZE: usize = 8;

/// Largest payload accepted when reading a frame (64 MB). A larger length
/// field can only come from a torn or corrupted header.
pub const MAX_RECORD_SIZE: usize = 64 * 1024 * 1024;

/// Stable identifier of a node in the cluster
pub type NodeId = u64;

/// Origin stamp of a record, used for last-write-wins.
///
/// Ordered by timestamp first, then origin node id, which gives every node
/// the same total order over concurrent writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    /// Hybrid logical timestamp (unix millis, bumped to stay monotonic)
    pub timestamp: u64,

    /// Node that accepted the original client write
    pub origin: NodeId,
}

impl Version {
    pub fn new(timestamp: u64, origin: NodeId) -> Self {
        Self { timestamp, origin }
    }
}

/// Mutations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Set a single key
    Set { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key (tombstone)
    Delete { key: Vec<u8> },

    /// Set every pair atomically, in order
    BulkSet { pairs: Vec<(Vec<u8>, Vec<u8>)> },
}

/// Discriminant of an [`Operation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Set,
    Delete,
    BulkSet,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Set { .. } => OperationKind::Set,
            Operation::Delete { .. } => OperationKind::Delete,
            Operation::BulkSet { .. } => OperationKind::BulkSet,
        }
    }

    /// Keys touched by this operation, in application order
    pub fn keys(&self) -> Vec<&[u8]> {
        match self {
            Operation::Set { key, .. } | Operation::Delete { key } => vec![key.as_slice()],
            Operation::BulkSet { pairs } => pairs.iter().map(|(k, _)| k.as_slice()).collect(),
        }
    }
}

/// A single immutable record in the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Local sequence number - gapless, starts at 1
    pub seq: u64,

    /// Sequence number the record carried on its origin node. Equal to `seq`
    /// for locally accepted writes.
    pub origin_seq: u64,

    /// The mutation
    pub operation: Operation,

    /// Origin timestamp and node
    pub version: Version,
}

impl LogRecord {
    /// Build a record for a locally accepted write
    pub fn local(seq: u64, operation: Operation, version: Version) -> Self {
        Self {
            seq,
            origin_seq: seq,
            operation,
            version,
        }
    }

    /// Re-sequence a record received from a peer for this node's own WAL
    pub fn relogged(&self, seq: u64) -> Self {
        Self {
            seq,
            origin_seq: self.origin_seq,
            operation: self.operation.clone(),
            version: self.version,
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    /// Encode into a full frame: len (4, LE) + crc (4, LE) + payload
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload =
            bincode::serialize(self).map_err(|e| DriftError::Serialization(e.to_string()))?;

        if payload.len() > MAX_RECORD_SIZE {
            return Err(DriftError::InvalidRequest(format!(
                "record of {} bytes exceeds the {} byte limit",
                payload.len(),
                MAX_RECORD_SIZE
            )));
        }

        let crc = crc32fast::hash(&payload);

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Decode a single complete frame
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match decode_frame(bytes)? {
            Some((record, _)) => Ok(record),
            None => Err(DriftError::WalCorruption(format!(
                "incomplete frame ({} bytes)",
                bytes.len()
            ))),
        }
    }
}

/// Decode the frame at the start of `bytes`.
///
/// Returns `Ok(None)` when the buffer ends before the frame does (a torn
/// tail), `Err(WalCorruption)` when the frame is present but invalid, and the
/// record plus the number of bytes consumed otherwise.
pub fn decode_frame(bytes: &[u8]) -> Result<Option<(LogRecord, usize)>> {
    if bytes.len() < HEADER_SIZE {
        return Ok(None);
    }

    let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let expected_crc = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);

    if len > MAX_RECORD_SIZE {
        return Err(DriftError::WalCorruption(format!(
            "frame length {} exceeds limit {}",
            len, MAX_RECORD_SIZE
        )));
    }

    let total = HEADER_SIZE + len;
    if bytes.len() < total {
        return Ok(None);
    }

    let payload = &bytes[HEADER_SIZE..total];
    let actual_crc = crc32fast::hash(payload);
    if actual_crc != expected_crc {
        return Err(DriftError::WalCorruption(format!(
            "checksum mismatch: expected {:08x}, got {:08x}",
            expected_crc, actual_crc
        )));
    }

    let record: LogRecord = bincode::deserialize(payload)
        .map_err(|e| DriftError::WalCorruption(format!("undecodable payload: {}", e)))?;

    Ok(Some((record, total)))
}
