//! Failover
//!
//! An external coordinator for the primary/secondary topology: find the live
//! primary, or promote exactly one live secondary when there is none.
//!
//! Liveness is "answers STATUS". There is no lease or fencing token. A former
//! primary that comes back keeps its role and rejects the new primary's
//! records, and the new primary rejects its forwards; it has to be restarted
//! as a secondary.

use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::config::ReplicationConfig;
use crate::error::{DriftError, Result};
use crate::network::Client;
use super::{Node, NodeStatus, Promotion, Role};

/// What the failover coordinator needs from a cluster member
pub trait ClusterMember: Send + Sync {
    fn addr(&self) -> &str;

    /// Fails when the member is unreachable
    fn status(&self) -> Result<NodeStatus>;

    fn promote(&self) -> Result<Promotion>;
}

/// A node in this process. Dropping the last `Arc<Node>` makes it unreachable.
pub struct LocalMember {
    addr: String,
    node: Weak<Node>,
}

impl LocalMember {
    pub fn new(addr: impl Into<String>, node: &Arc<Node>) -> Self {
        Self {
            addr: addr.into(),
            node: Arc::downgrade(node),
        }
    }

    fn node(&self) -> Result<Arc<Node>> {
        self.node
            .upgrade()
            .ok_or_else(|| DriftError::Network(format!("node at {} is gone", self.addr)))
    }
}

impl ClusterMember for LocalMember {
    fn addr(&self) -> &str {
        &self.addr
    }

    fn status(&self) -> Result<NodeStatus> {
        Ok(self.node()?.status())
    }

    fn promote(&self) -> Result<Promotion> {
        self.node()?.promote()
    }
}

/// A node reached over TCP; every call uses a fresh connection
pub struct RemoteMember {
    addr: String,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl RemoteMember {
    pub fn new(addr: impl Into<String>, connect_timeout: Duration, io_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout,
            io_timeout,
        }
    }

    pub fn from_config(addr: impl Into<String>, config: &ReplicationConfig) -> Self {
        Self::new(addr, config.connect_timeout(), config.io_timeout())
    }

    fn client(&self) -> Result<Client> {
        Client::connect_timeout(&self.addr, self.connect_timeout, self.io_timeout)
    }
}

impl ClusterMember for RemoteMember {
    fn addr(&self) -> &str {
        &self.addr
    }

    fn status(&self) -> Result<NodeStatus> {
        self.client()?.status()
    }

    fn promote(&self) -> Result<Promotion> {
        self.client()?.promote()
    }
}

/// Result of [`FailoverCoordinator::ensure_primary`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailoverOutcome {
    /// A live primary already exists at this address
    PrimaryAlive(String),

    /// The secondary at this address was promoted
    Promoted(String),
}

impl FailoverOutcome {
    /// Address clients should write to
    pub fn primary(&self) -> &str {
        match self {
            FailoverOutcome::PrimaryAlive(addr) | FailoverOutcome::Promoted(addr) => addr,
        }
    }
}

pub struct FailoverCoordinator {
    members: Vec<Box<dyn ClusterMember>>,
}

impl FailoverCoordinator {
    /// Members in promotion preference order
    pub fn new(members: Vec<Box<dyn ClusterMember>>) -> Self {
        Self { members }
    }

    /// Address of the first live member reporting the primary role
    pub fn find_primary(&self) -> Option<String> {
        self.live_members()
            .into_iter()
            .find(|(_, status)| status.role == Role::Primary)
            .map(|(member, _)| member.addr().to_string())
    }

    /// Make sure some live member is primary, promoting the first live
    /// secondary if needed.
    pub fn ensure_primary(&self) -> Result<FailoverOutcome> {
        let live = self.live_members();

        if let Some((member, _)) = live.iter().find(|(_, status)| status.role == Role::Primary) {
            return Ok(FailoverOutcome::PrimaryAlive(member.addr().to_string()));
        }

        let (candidate, status) = live
            .iter()
            .find(|(_, status)| status.role == Role::Secondary)
            .ok_or_else(|| DriftError::Network("no live secondary to promote".to_string()))?;

        tracing::warn!(
            addr = candidate.addr(),
            node_id = status.node_id,
            last_seq = status.last_seq,
            "no live primary; promoting secondary"
        );
        candidate.promote()?;
        Ok(FailoverOutcome::Promoted(candidate.addr().to_string()))
    }

    fn live_members(&self) -> Vec<(&dyn ClusterMember, NodeStatus)> {
        self.members
            .iter()
            .filter_map(|member| match member.status() {
                Ok(status) => Some((member.as_ref(), status)),
                Err(e) => {
                    tracing::debug!(addr = member.addr(), error = %e, "member unreachable");
                    None
                }
            })
            .collect()
    }
}
