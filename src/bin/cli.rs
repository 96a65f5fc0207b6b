//! DriftKV CLI Client
//!
//! Command-line interface for interacting with DriftKV nodes.

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use driftkv::cluster::{ClusterMember, FailoverCoordinator, FailoverOutcome, Promotion, RemoteMember};
use driftkv::network::Client;
use driftkv::{DriftError, Result};

/// DriftKV CLI
#[derive(Parser, Debug)]
#[command(name = "driftkv-cli")]
#[command(about = "CLI for the DriftKV key-value store")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7400")]
    server: String,

    /// Connect and I/O timeout in milliseconds
    #[arg(short, long, default_value = "2000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Set several pairs atomically
    Bulk {
        /// Pairs as key=value
        #[arg(required = true)]
        pairs: Vec<String>,
    },

    /// Show the node's role, sequence and peers
    Status,

    /// Promote a secondary to primary
    Promote,

    /// Ping the server
    Ping,

    /// Find the live primary, promoting a secondary if there is none
    Failover {
        /// Comma-separated member addresses, in promotion preference order
        #[arg(short, long, value_delimiter = ',', required = true)]
        nodes: Vec<String>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let timeout = Duration::from_millis(args.timeout_ms);
    let server = args.server;
    let connect = || Client::connect_timeout(&server, timeout, timeout);

    match args.command {
        Commands::Get { key } => match connect()?.get(key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Set { key, value } => {
            connect()?.set(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { key } => {
            connect()?.delete(key.as_bytes())?;
            println!("OK");
        }
        Commands::Bulk { pairs } => {
            let pairs = pairs
                .iter()
                .map(|pair| parse_pair(pair))
                .collect::<Result<Vec<_>>>()?;
            let count = pairs.len();
            connect()?.bulk_set(pairs)?;
            println!("OK ({} pairs)", count);
        }
        Commands::Status => {
            let status = connect()?.status()?;
            println!("node_id:   {}", status.node_id);
            println!("role:      {}", status.role);
            println!("topology:  {}", status.topology);
            println!("last_seq:  {}", status.last_seq);
            println!("live_keys: {}", status.live_keys);
            println!("peers:     {}", status.peers.join(","));
        }
        Commands::Promote => match connect()?.promote()? {
            Promotion::Promoted { peers } => println!("promoted; secondaries: {}", peers.join(",")),
            Promotion::AlreadyPrimary => println!("already primary"),
        },
        Commands::Ping => {
            connect()?.ping()?;
            println!("PONG");
        }
        Commands::Failover { nodes } => failover(&nodes, timeout)?,
    }

    Ok(())
}

fn failover(nodes: &[String], timeout: Duration) -> Result<()> {
    let members: Vec<Box<dyn ClusterMember>> = nodes
        .iter()
        .map(|addr| Box::new(RemoteMember::new(addr.clone(), timeout, timeout)) as Box<dyn ClusterMember>)
        .collect();

    match FailoverCoordinator::new(members).ensure_primary()? {
        FailoverOutcome::PrimaryAlive(addr) => println!("primary alive at {}", addr),
        FailoverOutcome::Promoted(addr) => println!("promoted {} to primary", addr),
    }
    Ok(())
}

fn parse_pair(pair: &str) -> Result<(Vec<u8>, Vec<u8>)> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| DriftError::InvalidRequest(format!("expected key=value, got '{}'", pair)))?;
    Ok((key.as_bytes().to_vec(), value.as_bytes().to_vec()))
}
