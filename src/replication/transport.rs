//! Peer transports
//!
//! How a record physically reaches a peer.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::ReplicationConfig;
use crate::error::Result;
use crate::network::Client;
use crate::wal::LogRecord;

/// Delivers a record to one peer, blocking until the peer has applied it
/// or the attempt failed.
pub trait PeerTransport: Send + Sync {
    fn deliver(&self, peer: &str, record: &LogRecord) -> Result<()>;
}

/// Delivers over the DriftKV wire protocol (`REPLICATE` command).
///
/// Keeps one idle connection per peer; a connection that errors is dropped
/// and the next attempt reconnects.
pub struct TcpTransport {
    connect_timeout: Duration,
    io_timeout: Duration,
    idle: Mutex<HashMap<String, Client>>,
}

impl TcpTransport {
    pub fn new(connect_timeout: Duration, io_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            io_timeout,
            idle: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &ReplicationConfig) -> Self {
        Self::new(config.connect_timeout(), config.io_timeout())
    }
}

impl PeerTransport for TcpTransport {
    fn deliver(&self, peer: &str, record: &LogRecord) -> Result<()> {
        let pooled = self.idle.lock().remove(peer);
        let mut client = match pooled {
            Some(client) => client,
            None => Client::connect_timeout(peer, self.connect_timeout, self.io_timeout)?,
        };

        client.replicate(record)?;

        self.idle.lock().insert(peer.to_string(), client);
        Ok(())
    }
}
