//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only logging.
//!
//! ## Responsibilities
//! - Append one framed record per mutation and fsync before returning
//! - CRC32 checksums for torn-write and corruption detection
//! - Gapless per-node sequence numbers for total ordering
//! - Crash recovery: keep the valid prefix, truncate the rest
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ Record 1                                 │
//! │ ┌─────────┬─────────┬──────────────────┐ │
//! │ │ Len (4) │ CRC (4) │ bincode payload  │ │
//! │ └─────────┴─────────┴──────────────────┘ │
//! ├──────────────────────────────────────────┤
//! │ Record 2                                 │
//! │ ┌─────────┬─────────┬──────────────────┐ │
//! │ │ Len (4) │ CRC (4) │ bincode payload  │ │
//! │ └─────────┴─────────┴──────────────────┘ │
//! └──────────────────────────────────────────┘
//! ```
//!
//! The payload carries the sequence number, operation, origin timestamp and
//! origin node, which is everything replay and last-write-wins need.

mod record;
mod writer;
mod reader;
mod recovery;

pub use record::{
    decode_frame, LogRecord, NodeId, Operation, OperationKind, Version, HEADER_SIZE,
    MAX_RECORD_SIZE,
};
pub use writer::{WalFile, WalWriter};
pub use reader::{WalIterator, WalReader};
pub use recovery::{RecoveryResult, WalRecovery};
