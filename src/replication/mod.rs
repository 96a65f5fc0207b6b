//! Replication Module
//!
//! Ships committed records from the node that accepted them to its peers.
//!
//! ## Responsibilities
//! - Describe the two topologies and what each implies for conflict handling
//! - Deliver records to peers over a pluggable transport
//! - Keep forwarding off the client's critical path: bounded per-peer queues,
//!   bounded retries, drop instead of block
//!
//! ## Flow
//! ```text
//!   client write ──► Node ──► Engine (WAL fsync + apply) ──► ack
//!                      │
//!                      └──► Forwarder ──► [queue per peer] ──► PeerTransport
//!                                                                  │
//!                               peer Node::apply_replicated ◄──────┘
//! ```
//!
//! Delivery is asynchronous in both topologies. A record is durable on the
//! node that accepted it; copies on peers are best effort.

mod topology;
mod transport;
mod forwarder;
mod local;

pub use topology::Topology;
pub use transport::{PeerTransport, TcpTransport};
pub use forwarder::{Forwarder, ForwarderStats};
pub use local::LocalTransport;
