//! Commit observers
//!
//! Interface for collaborators (such as a search index) that follow the
//! store. Observers hear about every key that actually changed, after it was
//! applied. They never take part in durability: an observer error is logged
//! and the write still succeeds.

use crate::error::Result;
use crate::wal::Version;

/// One key changed by a committed record
#[derive(Debug, Clone, PartialEq)]
pub struct CommitEvent {
    pub key: Vec<u8>,

    /// New value, `None` when the key was deleted
    pub value: Option<Vec<u8>>,

    /// Version of the record that wrote the key
    pub version: Version,

    /// Local WAL sequence of that record, 0 for the initial snapshot
    pub seq: u64,
}

impl CommitEvent {
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}

/// Receives committed changes in WAL order
pub trait CommitObserver: Send + Sync {
    fn on_commit(&self, event: &CommitEvent) -> Result<()>;
}
