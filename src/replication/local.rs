//! In-process transport
//!
//! Routes records straight to `Node`s living in the same process. Used to
//! run whole clusters inside one test; `disconnect` stands in for a crashed
//! or partitioned node.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::cluster::Node;
use crate::error::{DriftError, Result};
use crate::wal::LogRecord;
use super::PeerTransport;

#[derive(Default)]
pub struct LocalTransport {
    nodes: RwLock<HashMap<String, Weak<Node>>>,
    down: RwLock<HashSet<String>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `node` reachable at `addr`
    pub fn register(&self, addr: impl Into<String>, node: &Arc<Node>) {
        let addr = addr.into();
        self.down.write().remove(&addr);
        self.nodes.write().insert(addr, Arc::downgrade(node));
    }

    /// Make `addr` unreachable until it is registered or reconnected again
    pub fn disconnect(&self, addr: &str) {
        self.down.write().insert(addr.to_string());
    }

    pub fn reconnect(&self, addr: &str) {
        self.down.write().remove(addr);
    }

    fn resolve(&self, peer: &str) -> Result<Arc<Node>> {
        if self.down.read().contains(peer) {
            return Err(DriftError::Network(format!("peer {} is unreachable", peer)));
        }
        self.nodes
            .read()
            .get(peer)
            .and_then(Weak::upgrade)
            .ok_or_else(|| DriftError::Network(format!("no node registered at {}", peer)))
    }
}

impl PeerTransport for LocalTransport {
    fn deliver(&self, peer: &str, record: &LogRecord) -> Result<()> {
        let node = self.resolve(peer)?;
        node.apply_replicated(record.clone())?;
        Ok(())
    }
}
