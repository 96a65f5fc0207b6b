//! Role coordinator
//!
//! Owns a node's role and answers what that role allows.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{DriftError, Result};
use crate::replication::Topology;
use crate::wal::NodeId;
use super::Role;

/// Result of a promotion request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Promotion {
    /// The node was a secondary and now forwards to `peers`
    Promoted { peers: Vec<String> },

    /// The node was already primary; nothing changed
    AlreadyPrimary,
}

pub struct Coordinator {
    node_id: NodeId,
    topology: Topology,

    /// Every other cluster member, own address excluded
    cluster_peers: Vec<String>,

    role: RwLock<Role>,
}

impl Coordinator {
    pub fn new(node_id: NodeId, topology: Topology, role: Role, cluster_peers: Vec<String>) -> Result<Self> {
        if !topology.allows_role(role) {
            return Err(DriftError::Config(format!(
                "role {} is not valid in a {} topology",
                role, topology
            )));
        }
        Ok(Self {
            node_id,
            topology,
            cluster_peers,
            role: RwLock::new(role),
        })
    }

    pub fn role(&self) -> Role {
        *self.role.read()
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn cluster_peers(&self) -> &[String] {
        &self.cluster_peers
    }

    /// Peers the current role forwards to
    pub fn forward_targets(&self) -> Vec<String> {
        if self.role().forwards() {
            self.cluster_peers.clone()
        } else {
            Vec::new()
        }
    }

    /// Turn a secondary into the primary.
    ///
    /// The caller must keep writes and replicated applies out while the role
    /// changes, so nothing is accepted under the old role after this returns.
    pub fn promote(&self) -> Result<Promotion> {
        let mut role = self.role.write();
        match *role {
            Role::Primary => {
                tracing::debug!(node_id = self.node_id, "promotion requested on primary; no-op");
                Ok(Promotion::AlreadyPrimary)
            }
            Role::Secondary => {
                *role = Role::Primary;
                tracing::info!(
                    node_id = self.node_id,
                    secondaries = ?self.cluster_peers,
                    "promoted to primary"
                );
                Ok(Promotion::Promoted {
                    peers: self.cluster_peers.clone(),
                })
            }
            Role::Peer => Err(DriftError::InvalidTransition(format!(
                "node {} is a masterless peer and cannot be promoted",
                self.node_id
            ))),
        }
    }
}
