//! DriftKV Server Binary
//!
//! Recovers the node's WAL, then serves clients and peers over TCP.

use std::sync::Arc;

use clap::Parser;
use driftkv::cluster::{Node, Role};
use driftkv::network::Server;
use driftkv::replication::{TcpTransport, Topology};
use driftkv::{Config, ReplicationConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// DriftKV Server
#[derive(Parser, Debug)]
#[command(name = "driftkv-server")]
#[command(about = "Durable, replicated key-value store node")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./driftkv_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:7400")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Stable node id, stamped into every record this node originates
    #[arg(short, long, default_value = "1")]
    node_id: u64,

    /// Replication topology: primary-secondary or masterless
    #[arg(short, long, default_value = "primary-secondary")]
    topology: Topology,

    /// Startup role: primary, secondary or peer
    #[arg(short, long, default_value = "primary")]
    role: Role,

    /// Comma-separated addresses of every cluster member (this node's own
    /// address may be included)
    #[arg(short, long, value_delimiter = ',')]
    peers: Vec<String>,

    /// Probability in [0, 1] of skipping the in-memory apply of a Set/BulkSet
    /// after it was logged (debug_flaky)
    #[arg(long, default_value = "0.0")]
    debug_flaky: f64,

    /// Per-peer forwarding queue capacity
    #[arg(long, default_value = "1024")]
    queue_capacity: usize,

    /// Delivery attempts per record before dropping it for a peer
    #[arg(long, default_value = "3")]
    max_attempts: u32,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,driftkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("DriftKV Server v{}", driftkv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    let replication = ReplicationConfig {
        queue_capacity: args.queue_capacity,
        max_attempts: args.max_attempts,
        ..ReplicationConfig::default()
    };

    // Build config from args
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .node_id(args.node_id)
        .topology(args.topology)
        .role(args.role)
        .peers(args.peers)
        .fault_probability(args.debug_flaky)
        .replication(replication)
        .build();

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(2);
    }

    let transport = Arc::new(TcpTransport::from_config(&config.replication));

    // Open node (recovers the WAL before anything is served)
    let node = match Node::open(config.clone(), transport) {
        Ok(node) => Arc::new(node),
        Err(e) => {
            tracing::error!("Failed to open node: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::bind(config, Arc::clone(&node)) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    node.shutdown();
    tracing::info!("Server stopped");
}
