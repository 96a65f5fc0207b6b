//! # DriftKV
//!
//! A durable, replicated key-value store with:
//! - A checksummed write-ahead log, fsynced before every acknowledgement
//! - Atomic bulk writes and crash recovery by WAL replay
//! - Primary/secondary replication with explicit promotion
//! - Masterless replication with per-key last-write-wins
//! - TCP-based client and peer protocol
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TCP Server                              │
//! │               (clients, peers, failover)                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Node                                  │
//! │          (role checks, commit order, forwarding)             │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//! ┌─────────────────────┐             ┌───────────────────┐
//! │       Engine        │             │     Forwarder      │
//! │  (single writer)    │             │ (queue per peer)   │
//! └──────┬───────┬──────┘             └─────────┬─────────┘
//!        │       │                              │
//!        ▼       ▼                              ▼
//!   ┌────────┐ ┌──────────┐              PeerTransport
//!   │  WAL   │ │ MemTable │──► CommitObserver
//!   └────────┘ └──────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod clock;

pub mod wal;
pub mod memtable;
pub mod fault;
pub mod observer;
pub mod engine;

pub mod replication;
pub mod cluster;

pub mod network;
pub mod protocol;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DriftError, Result};
pub use config::{Config, ReplicationConfig};
pub use engine::Engine;
pub use cluster::{Node, Role};
pub use replication::Topology;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of DriftKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
