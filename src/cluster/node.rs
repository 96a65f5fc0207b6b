//! Replicated node
//!
//! An [`Engine`] plus the role that decides who may write to it and where
//! its commits go.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::Config;
use crate::engine::{Engine, ReplicatedApply};
use crate::error::{DriftError, Result};
use crate::fault::FaultInjector;
use crate::replication::{Forwarder, ForwarderStats, PeerTransport};
use crate::wal::{LogRecord, RecoveryResult};
use super::{Coordinator, NodeStatus, Promotion, Role};

/// One cluster member
///
/// Every write path takes `commit_order` around role check, engine commit
/// and enqueue. That keeps each peer queue in WAL order and makes promotion
/// a clean cut: no write is accepted under the old role once it returns.
pub struct Node {
    engine: Engine,
    coordinator: Coordinator,
    forwarder: Forwarder,
    listen_addr: String,
    commit_order: Mutex<()>,
}

impl Node {
    /// Open the engine (recovering its WAL) and start forwarding
    pub fn open(config: Config, transport: Arc<dyn PeerTransport>) -> Result<Self> {
        let engine = Engine::open(config)?;
        Self::with_engine(engine, transport)
    }

    pub fn open_with_faults(
        config: Config,
        faults: Arc<dyn FaultInjector>,
        transport: Arc<dyn PeerTransport>,
    ) -> Result<Self> {
        let engine = Engine::open_with_faults(config, faults)?;
        Self::with_engine(engine, transport)
    }

    fn with_engine(engine: Engine, transport: Arc<dyn PeerTransport>) -> Result<Self> {
        let config = engine.config().clone();
        let coordinator = Coordinator::new(
            config.node_id,
            config.topology,
            config.role,
            config.remote_peers(),
        )?;
        let forwarder = Forwarder::new(
            transport,
            config.replication.clone(),
            coordinator.forward_targets(),
        );

        tracing::info!(
            node_id = config.node_id,
            role = %config.role,
            topology = %config.topology,
            peers = ?coordinator.cluster_peers(),
            "node started"
        );

        Ok(Self {
            engine,
            coordinator,
            forwarder,
            listen_addr: config.listen_addr,
            commit_order: Mutex::new(()),
        })
    }

    // =========================================================================
    // Client Operations
    // =========================================================================

    /// Read the local snapshot. Secondaries may lag the primary.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.engine.get(key)
    }

    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<LogRecord> {
        self.write(|engine| engine.set(key, value))
    }

    pub fn delete(&self, key: &[u8]) -> Result<LogRecord> {
        self.write(|engine| engine.delete(key))
    }

    pub fn bulk_set(&self, pairs: Vec<(Vec<u8>, Vec<u8>)>) -> Result<LogRecord> {
        self.write(move |engine| engine.bulk_set(pairs))
    }

    fn write<F>(&self, commit: F) -> Result<LogRecord>
    where
        F: FnOnce(&Engine) -> Result<LogRecord>,
    {
        let _order = self.commit_order.lock();

        let role = self.coordinator.role();
        if !role.accepts_client_writes() {
            tracing::debug!(node_id = self.engine.node_id(), %role, "client write rejected");
            return Err(DriftError::NotPrimary(role.to_string()));
        }

        let record = commit(&self.engine)?;
        if role.forwards() {
            self.forwarder.forward(&record);
        }
        Ok(record)
    }

    // =========================================================================
    // Replication Ingress
    // =========================================================================

    /// Apply a record forwarded by another node. Never re-forwarded.
    pub fn apply_replicated(&self, record: LogRecord) -> Result<ReplicatedApply> {
        let _order = self.commit_order.lock();

        let role = self.coordinator.role();
        if !role.accepts_replication() {
            tracing::warn!(
                node_id = self.engine.node_id(),
                origin = record.version.origin,
                origin_seq = record.origin_seq,
                "replicated record rejected by primary"
            );
            return Err(DriftError::ReplicationRejected(format!(
                "node {} is {}",
                self.engine.node_id(),
                role
            )));
        }

        self.engine.apply_replicated(record)
    }

    // =========================================================================
    // Cluster Operations
    // =========================================================================

    /// Promote this secondary to primary and start forwarding to the rest
    /// of the cluster.
    pub fn promote(&self) -> Result<Promotion> {
        let _order = self.commit_order.lock();

        let promotion = self.coordinator.promote()?;
        if let Promotion::Promoted { peers } = &promotion {
            self.forwarder.set_peers(peers.clone());
        }
        Ok(promotion)
    }

    /// Rebuild the snapshot from the WAL in place
    pub fn recover(&self) -> Result<RecoveryResult> {
        let _order = self.commit_order.lock();
        self.engine.recover()
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            node_id: self.engine.node_id(),
            role: self.coordinator.role(),
            topology: self.coordinator.topology(),
            last_seq: self.engine.last_seq(),
            live_keys: self.engine.live_len(),
            listen_addr: self.listen_addr.clone(),
            peers: self.forwarder.peers(),
        }
    }

    pub fn role(&self) -> Role {
        self.coordinator.role()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn forwarder_stats(&self) -> ForwarderStats {
        self.forwarder.stats()
    }

    /// Wait until every queued record was delivered or dropped
    pub fn wait_for_replication(&self, timeout: Duration) -> bool {
        self.forwarder.wait_idle(timeout)
    }

    /// Stop forwarding. Anything still queued is dropped.
    pub fn shutdown(&self) {
        self.forwarder.shutdown();
        tracing::info!(node_id = self.engine.node_id(), "node stopped");
    }
}
