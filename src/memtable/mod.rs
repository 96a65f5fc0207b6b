//! MemTable Module
//!
//! The in-memory snapshot: key → current value, rebuilt from the WAL on
//! startup.
//!
//! ## Responsibilities
//! - Fast reads under a shared lock
//! - Apply whole records (including every pair of a bulk write) under one
//!   exclusive lock so readers never see a partial batch
//! - Remember the version that last won each key, tombstones included, for
//!   last-write-wins
//!
//! ## Data Structure Choice
//! HashMap wrapped in RwLock: there is no ordered flush path, so ordering of
//! keys is irrelevant and point lookups dominate.

mod table;

pub use table::{ApplyReport, KeyChange, MemTable};

use crate::wal::Version;

/// Entry stored in the MemTable
#[derive(Debug, Clone, PartialEq)]
pub enum MemTableEntry {
    /// A live value
    Value(Vec<u8>),

    /// A tombstone (deleted key)
    Tombstone,
}

/// An entry together with the version of the record that wrote it
#[derive(Debug, Clone, PartialEq)]
pub struct VersionedEntry {
    pub entry: MemTableEntry,
    pub version: Version,
}

/// How an incoming record is reconciled with what the table already holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Apply unconditionally, in arrival order (single writer topologies)
    Ordered,

    /// Skip a key whose current version is strictly newer than the record's.
    /// Concurrent writes to one key keep only the later one; the other is
    /// silently lost.
    LastWriteWins,
}
