//! Cluster Module
//!
//! Roles, promotion and the replicated node built on top of the engine.
//!
//! ## Roles
//! - **Primary**: accepts client writes, forwards them to secondaries,
//!   rejects replicated records
//! - **Secondary**: rejects client writes, applies records from the primary,
//!   can be promoted to primary
//! - **Peer**: masterless member; accepts both and forwards its own writes
//!
//! Promotion (`Secondary -> Primary`) is the only role change and is always
//! explicit. Detecting a dead primary and choosing whom to promote is the job
//! of a [`FailoverCoordinator`] or an operator.

mod coordinator;
mod node;
mod failover;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DriftError;
use crate::replication::Topology;
use crate::wal::NodeId;

pub use coordinator::{Coordinator, Promotion};
pub use node::Node;
pub use failover::{ClusterMember, FailoverCoordinator, FailoverOutcome, LocalMember, RemoteMember};

/// Role of a node within its topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Primary,
    Secondary,
    Peer,
}

impl Role {
    /// Whether clients may write to a node in this role
    pub fn accepts_client_writes(self) -> bool {
        matches!(self, Role::Primary | Role::Peer)
    }

    /// Whether records forwarded by other nodes are applied
    pub fn accepts_replication(self) -> bool {
        matches!(self, Role::Secondary | Role::Peer)
    }

    /// Whether locally accepted writes are forwarded to peers
    pub fn forwards(self) -> bool {
        matches!(self, Role::Primary | Role::Peer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Primary => write!(f, "primary"),
            Role::Secondary => write!(f, "secondary"),
            Role::Peer => write!(f, "peer"),
        }
    }
}

impl FromStr for Role {
    type Err = DriftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary" => Ok(Role::Primary),
            "secondary" => Ok(Role::Secondary),
            "peer" => Ok(Role::Peer),
            other => Err(DriftError::Config(format!("unknown role '{}'", other))),
        }
    }
}

/// Snapshot of a node's cluster-facing state, as reported by `STATUS`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node_id: NodeId,
    pub role: Role,
    pub topology: Topology,

    /// Sequence of the last durable local WAL record
    pub last_seq: u64,

    pub live_keys: usize,

    pub listen_addr: String,

    /// Peers this node currently forwards to
    pub peers: Vec<String>,
}
