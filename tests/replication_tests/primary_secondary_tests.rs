//! Primary/secondary replication tests
//!
//! These tests verify:
//! - Writes on the primary reach every secondary in sequence order
//! - Secondaries reject client writes; primaries reject replicated records
//! - An unreachable secondary costs the primary nothing
//! - Replicated data is durable on the secondary
//! - A write that fails to reach the WAL is never forwarded

use std::sync::Arc;

use driftkv::cluster::{Node, Role};
use driftkv::engine::ReplicatedApply;
use driftkv::error::DriftError;
use driftkv::fault::FaultInjector;
use driftkv::replication::LocalTransport;
use driftkv::Config;
use tempfile::TempDir;

use super::{addr, Cluster};

#[test]
fn test_writes_reach_every_secondary() {
    let cluster = Cluster::primary_secondary(3);
    let primary = cluster.node(0);

    primary.set(b"a", b"1").unwrap();
    primary
        .bulk_set(vec![(b"b".to_vec(), b"2".to_vec()), (b"c".to_vec(), b"3".to_vec())])
        .unwrap();
    primary.set(b"a", b"4").unwrap();
    primary.delete(b"c").unwrap();
    cluster.settle();

    for i in 1..3 {
        let secondary = cluster.node(i);
        assert_eq!(secondary.engine().snapshot(), primary.engine().snapshot());
        assert_eq!(secondary.engine().last_seq(), 4);
    }
    assert_eq!(primary.forwarder_stats().delivered, 8);
}

#[test]
fn test_many_writes_keep_order() {
    let cluster = Cluster::primary_secondary(2);
    let primary = cluster.node(0);

    for i in 0..200 {
        primary.set(b"counter", i.to_string().as_bytes()).unwrap();
    }
    cluster.settle();

    assert_eq!(cluster.node(1).get(b"counter"), Some(b"199".to_vec()));
}

#[test]
fn test_secondary_rejects_client_writes() {
    let cluster = Cluster::primary_secondary(2);
    let secondary = cluster.node(1);

    let result = secondary.set(b"k", b"v");

    assert!(matches!(result, Err(DriftError::NotPrimary(ref role)) if role == "secondary"));
    assert!(matches!(secondary.delete(b"k"), Err(DriftError::NotPrimary(_))));
    assert_eq!(secondary.engine().last_seq(), 0);
}

#[test]
fn test_primary_rejects_replicated_records() {
    let cluster = Cluster::primary_secondary(2);
    let primary = cluster.node(0);
    let record = primary.set(b"k", b"v").unwrap();

    let result = primary.apply_replicated(record);

    assert!(matches!(result, Err(DriftError::ReplicationRejected(_))));
}

#[test]
fn test_secondary_does_not_forward() {
    let cluster = Cluster::primary_secondary(3);
    cluster.node(0).set(b"k", b"v").unwrap();
    cluster.settle();

    assert_eq!(cluster.node(1).forwarder_stats().enqueued, 0);
    assert!(cluster.node(1).status().peers.is_empty());
}

#[test]
fn test_unreachable_secondary_does_not_block_primary() {
    let cluster = Cluster::primary_secondary(3);
    cluster.transport.disconnect(&addr(2));
    let primary = cluster.node(0);

    for i in 0..5 {
        primary.set(format!("k{}", i).as_bytes(), b"v").unwrap();
    }
    cluster.settle();

    assert_eq!(primary.engine().live_len(), 5);
    assert_eq!(cluster.node(1).engine().live_len(), 5);
    assert_eq!(cluster.node(2).engine().live_len(), 0);

    let stats = primary.forwarder_stats();
    assert_eq!(stats.delivered, 5);
    assert_eq!(stats.failed, 5);
}

#[test]
fn test_replicated_data_survives_secondary_restart() {
    let mut cluster = Cluster::primary_secondary(2);
    let record = cluster.node(0).set(b"k", b"v").unwrap();
    cluster.settle();

    cluster.kill(1);
    cluster.start(1);
    let secondary = cluster.node(1);

    assert_eq!(secondary.role(), Role::Secondary);
    assert_eq!(secondary.get(b"k"), Some(b"v".to_vec()));

    // A retried delivery after restart is recognised
    assert_eq!(secondary.apply_replicated(record).unwrap(), ReplicatedApply::Duplicate);
}

#[test]
fn test_status_reports_role_and_sequence() {
    let cluster = Cluster::primary_secondary(3);
    let primary = cluster.node(0);
    primary.set(b"k", b"v").unwrap();

    let status = primary.status();
    assert_eq!(status.node_id, 1);
    assert_eq!(status.role, Role::Primary);
    assert_eq!(status.last_seq, 1);
    assert_eq!(status.live_keys, 1);
    assert_eq!(status.listen_addr, addr(0));

    let mut peers = status.peers;
    peers.sort();
    assert_eq!(peers, vec![addr(1), addr(2)]);
}

/// Every WAL fsync fails
struct DeadDisk;

impl FaultInjector for DeadDisk {
    fn skip_apply(&self) -> bool {
        false
    }

    fn fail_wal_sync(&self) -> bool {
        true
    }
}

#[test]
fn test_failed_wal_write_is_not_forwarded() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .node_id(1)
        .listen_addr(addr(0))
        .peers([addr(0), addr(1)])
        .role(Role::Primary)
        .build();
    let primary =
        Node::open_with_faults(config, Arc::new(DeadDisk), Arc::new(LocalTransport::new())).unwrap();

    let result = primary.set(b"k", b"v");

    assert!(matches!(result, Err(DriftError::WalWrite(_))));
    assert_eq!(primary.get(b"k"), None);
    assert_eq!(primary.engine().last_seq(), 0);
    assert_eq!(primary.forwarder_stats().enqueued, 0);
    primary.shutdown();
}
