//! Replication topologies

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cluster::Role;
use crate::error::DriftError;
use crate::memtable::ConflictPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
    /// One authoritative primary forwards to followers; a follower can be
    /// promoted when the primary is lost.
    PrimarySecondary,

    /// Every node accepts writes and forwards them to every other node.
    /// Conflicts resolve per key by last-write-wins.
    Masterless,
}

impl Topology {
    /// How a node in this topology reconciles incoming records
    pub fn conflict_policy(self) -> ConflictPolicy {
        match self {
            Topology::PrimarySecondary => ConflictPolicy::Ordered,
            Topology::Masterless => ConflictPolicy::LastWriteWins,
        }
    }

    pub fn allows_role(self, role: Role) -> bool {
        match self {
            Topology::PrimarySecondary => matches!(role, Role::Primary | Role::Secondary),
            Topology::Masterless => role == Role::Peer,
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topology::PrimarySecondary => write!(f, "primary-secondary"),
            Topology::Masterless => write!(f, "masterless"),
        }
    }
}

impl FromStr for Topology {
    type Err = DriftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary-secondary" | "primary_secondary" | "ps" => Ok(Topology::PrimarySecondary),
            "masterless" => Ok(Topology::Masterless),
            other => Err(DriftError::Config(format!("unknown topology '{}'", other))),
        }
    }
}
