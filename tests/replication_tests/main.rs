//! Replication test suite
//!
//! Whole clusters run in one process over `LocalTransport`.

mod primary_secondary_tests;
mod failover_tests;

use std::sync::Arc;
use std::time::Duration;

use driftkv::cluster::{Node, Role};
use driftkv::replication::{LocalTransport, Topology};
use driftkv::{Config, ReplicationConfig};
use tempfile::TempDir;

pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

pub fn addr(index: usize) -> String {
    format!("node-{}", index + 1)
}

pub struct Cluster {
    pub transport: Arc<LocalTransport>,
    configs: Vec<Config>,
    nodes: Vec<Option<Arc<Node>>>,
    _dirs: Vec<TempDir>,
}

impl Cluster {
    /// Node 0 is primary, the rest are secondaries
    pub fn primary_secondary(size: usize) -> Self {
        Self::build(size, Topology::PrimarySecondary, |i| {
            if i == 0 {
                Role::Primary
            } else {
                Role::Secondary
            }
        })
    }

    pub fn masterless(size: usize) -> Self {
        Self::build(size, Topology::Masterless, |_| Role::Peer)
    }

    fn build(size: usize, topology: Topology, role: impl Fn(usize) -> Role) -> Self {
        let transport = Arc::new(LocalTransport::new());
        let addrs: Vec<String> = (0..size).map(addr).collect();

        let mut configs = Vec::new();
        let mut dirs = Vec::new();
        for i in 0..size {
            let dir = TempDir::new().unwrap();
            configs.push(
                Config::builder()
                    .data_dir(dir.path())
                    .node_id(i as u64 + 1)
                    .listen_addr(addr(i))
                    .peers(addrs.clone())
                    .topology(topology)
                    .role(role(i))
                    .replication(ReplicationConfig {
                        retry_backoff_ms: 1,
                        ..ReplicationConfig::default()
                    })
                    .build(),
            );
            dirs.push(dir);
        }

        let mut cluster = Self {
            transport,
            configs,
            nodes: vec![None; size],
            _dirs: dirs,
        };
        for i in 0..size {
            cluster.start(i);
        }
        cluster
    }

    /// Open node `index` from its data directory and make it reachable
    pub fn start(&mut self, index: usize) {
        let node = Arc::new(Node::open(self.configs[index].clone(), self.transport.clone()).unwrap());
        self.transport.register(addr(index), &node);
        self.nodes[index] = Some(node);
    }

    /// Crash node `index`: unreachable, forwarding stopped, handle dropped
    pub fn kill(&mut self, index: usize) {
        self.transport.disconnect(&addr(index));
        if let Some(node) = self.nodes[index].take() {
            node.shutdown();
        }
    }

    pub fn node(&self, index: usize) -> Arc<Node> {
        Arc::clone(self.nodes[index].as_ref().expect("node is not running"))
    }

    /// Wait until every running node's forwarding queues drained
    pub fn settle(&self) {
        for node in self.nodes.iter().flatten() {
            assert!(node.wait_for_replication(SETTLE_TIMEOUT), "replication did not settle");
        }
    }
}
