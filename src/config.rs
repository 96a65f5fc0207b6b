//! Configuration for DriftKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::cluster::Role;
use crate::error::{DriftError, Result};
use crate::replication::Topology;
use crate::wal::NodeId;

/// Main configuration for a DriftKV node
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for the node's data files
    /// Internal structure:
    ///   {data_dir}/
    ///     └── wal.log          (write-ahead log, the only persisted state)
    pub data_dir: PathBuf,

    /// Probability in [0, 1] that a local Set/BulkSet skips its in-memory
    /// apply after the WAL append (debug_flaky). 0 disables fault injection.
    pub fault_probability: f64,

    // -------------------------------------------------------------------------
    // Cluster Configuration
    // -------------------------------------------------------------------------
    /// Stable identifier of this node, stamped into every record it originates
    pub node_id: NodeId,

    /// Replication topology this node participates in
    pub topology: Topology,

    /// Role at startup
    pub role: Role,

    /// Addresses of the other cluster members. This node's own `listen_addr`
    /// may appear here; it is filtered out.
    pub peers: Vec<String>,

    /// Forwarding knobs
    pub replication: ReplicationConfig,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Connection read timeout (milliseconds)
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,
}

/// Peer forwarding configuration
#[derive(Debug, Clone)]
pub struct ReplicationConfig {
    /// Bounded per-peer queue; records are dropped for a peer whose queue is full
    pub queue_capacity: usize,

    /// Delivery attempts per record before it is dropped for that peer
    pub max_attempts: u32,

    /// Backoff between attempts, multiplied by the attempt number
    pub retry_backoff_ms: u64,

    /// TCP connect timeout when delivering to a peer
    pub connect_timeout_ms: u64,

    /// TCP read/write timeout when delivering to a peer
    pub io_timeout_ms: u64,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_attempts: 3,
            retry_backoff_ms: 50,
            connect_timeout_ms: 1000,
            io_timeout_ms: 5000,
        }
    }
}

impl ReplicationConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./driftkv_data"),
            fault_probability: 0.0,
            node_id: 1,
            topology: Topology::PrimarySecondary,
            role: Role::Primary,
            peers: Vec::new(),
            replication: ReplicationConfig::default(),
            listen_addr: "127.0.0.1:7400".to_string(),
            max_connections: 1024,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the configuration for values the node cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.fault_probability) {
            return Err(DriftError::Config(format!(
                "fault_probability must be within [0, 1], got {}",
                self.fault_probability
            )));
        }

        if !self.topology.allows_role(self.role) {
            return Err(DriftError::Config(format!(
                "role {} is not valid in a {} topology",
                self.role, self.topology
            )));
        }

        if self.replication.queue_capacity == 0 {
            return Err(DriftError::Config(
                "replication.queue_capacity must be at least 1".to_string(),
            ));
        }

        if self.replication.max_attempts == 0 {
            return Err(DriftError::Config(
                "replication.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.max_connections == 0 {
            return Err(DriftError::Config(
                "max_connections must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Peer addresses with this node's own address removed
    pub fn remote_peers(&self) -> Vec<String> {
        self.peers
            .iter()
            .filter(|peer| **peer != self.listen_addr)
            .cloned()
            .collect()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the debug_flaky fault probability
    pub fn fault_probability(mut self, probability: f64) -> Self {
        self.config.fault_probability = probability;
        self
    }

    /// Set this node's id
    pub fn node_id(mut self, id: NodeId) -> Self {
        self.config.node_id = id;
        self
    }

    /// Set the replication topology
    pub fn topology(mut self, topology: Topology) -> Self {
        self.config.topology = topology;
        self
    }

    /// Set the startup role
    pub fn role(mut self, role: Role) -> Self {
        self.config.role = role;
        self
    }

    /// Set the peer address list
    pub fn peers<I, S>(mut self, peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.peers = peers.into_iter().map(Into::into).collect();
        self
    }

    /// Set the forwarding configuration
    pub fn replication(mut self, replication: ReplicationConfig) -> Self {
        self.config.replication = replication;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
