//! Hybrid logical clock
//!
//! Stamps each locally accepted write with a [`Version`]. Timestamps follow
//! wall-clock milliseconds but never go backwards and never repeat on one
//! node; observing a peer's timestamp pushes the local clock past it, so a
//! write made after receiving a record always orders after that record.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::wal::{NodeId, Version};

pub struct HybridClock {
    node_id: NodeId,
    last: Mutex<u64>,
}

impl HybridClock {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            last: Mutex::new(0),
        }
    }

    /// Next version for a write originating on this node
    pub fn tick(&self) -> Version {
        let mut last = self.last.lock();
        let timestamp = wall_millis().max(*last + 1);
        *last = timestamp;
        Version::new(timestamp, self.node_id)
    }

    /// Fold in a timestamp seen on a replicated or replayed record
    pub fn observe(&self, timestamp: u64) {
        let mut last = self.last.lock();
        if timestamp > *last {
            *last = timestamp;
        }
    }

    /// Last timestamp issued or observed
    pub fn current(&self) -> u64 {
        *self.last.lock()
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }
}

fn wall_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
