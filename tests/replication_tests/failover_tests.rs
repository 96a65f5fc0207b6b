//! Failover tests
//!
//! These tests verify:
//! - Promotion turns a secondary into a forwarding primary
//! - The failover coordinator promotes exactly one live secondary
//! - Records committed on the promoted node before failover are kept

use driftkv::cluster::{ClusterMember, FailoverCoordinator, FailoverOutcome, LocalMember, Promotion, Role};
use driftkv::error::DriftError;

use super::{addr, Cluster};

fn coordinator(cluster: &Cluster, size: usize) -> FailoverCoordinator {
    let members: Vec<Box<dyn ClusterMember>> = (0..size)
        .map(|i| Box::new(LocalMember::new(addr(i), &cluster.node(i))) as Box<dyn ClusterMember>)
        .collect();
    FailoverCoordinator::new(members)
}

#[test]
fn test_promote_secondary() {
    let cluster = Cluster::primary_secondary(3);
    let secondary = cluster.node(1);

    let promotion = secondary.promote().unwrap();

    let Promotion::Promoted { mut peers } = promotion else {
        panic!("expected a promotion");
    };
    peers.sort();
    assert_eq!(peers, vec![addr(0), addr(2)]);
    assert_eq!(secondary.role(), Role::Primary);

    // Promoting again changes nothing
    assert_eq!(secondary.promote().unwrap(), Promotion::AlreadyPrimary);
}

#[test]
fn test_promoting_primary_is_a_no_op() {
    let cluster = Cluster::primary_secondary(2);
    assert_eq!(cluster.node(0).promote().unwrap(), Promotion::AlreadyPrimary);
}

#[test]
fn test_failover_after_primary_crash() {
    let mut cluster = Cluster::primary_secondary(3);
    cluster.node(0).set(b"before", b"1").unwrap();
    cluster.settle();

    let failover = coordinator(&cluster, 3);
    assert_eq!(failover.find_primary(), Some(addr(0)));

    cluster.kill(0);
    assert_eq!(failover.find_primary(), None);

    let outcome = failover.ensure_primary().unwrap();
    assert_eq!(outcome, FailoverOutcome::Promoted(addr(1)));
    assert_eq!(outcome.primary(), addr(1));

    // Exactly one secondary was promoted
    assert_eq!(cluster.node(1).role(), Role::Primary);
    assert_eq!(cluster.node(2).role(), Role::Secondary);
    assert_eq!(failover.find_primary(), Some(addr(1)));

    // The new primary kept what it had received and takes new writes
    let new_primary = cluster.node(1);
    assert_eq!(new_primary.get(b"before"), Some(b"1".to_vec()));
    new_primary.set(b"after", b"2").unwrap();
    cluster.settle();

    let survivor = cluster.node(2);
    assert_eq!(survivor.get(b"before"), Some(b"1".to_vec()));
    assert_eq!(survivor.get(b"after"), Some(b"2".to_vec()));
}

#[test]
fn test_ensure_primary_keeps_live_primary() {
    let cluster = Cluster::primary_secondary(3);
    let failover = coordinator(&cluster, 3);

    assert_eq!(failover.ensure_primary().unwrap(), FailoverOutcome::PrimaryAlive(addr(0)));
    assert_eq!(cluster.node(1).role(), Role::Secondary);
}

#[test]
fn test_ensure_primary_skips_dead_secondaries() {
    let mut cluster = Cluster::primary_secondary(3);
    let failover = coordinator(&cluster, 3);

    cluster.kill(0);
    cluster.kill(1);

    assert_eq!(failover.ensure_primary().unwrap(), FailoverOutcome::Promoted(addr(2)));
}

#[test]
fn test_ensure_primary_fails_without_live_secondary() {
    let mut cluster = Cluster::primary_secondary(2);
    let failover = coordinator(&cluster, 2);

    cluster.kill(0);
    cluster.kill(1);

    assert!(matches!(failover.ensure_primary(), Err(DriftError::Network(_))));
}

#[test]
fn test_new_primary_rejects_old_primary_forwards() {
    let mut cluster = Cluster::primary_secondary(3);
    cluster.node(1).promote().unwrap();

    // The old primary is still running and still believes it is primary
    cluster.node(0).set(b"split", b"old").unwrap();
    cluster.settle();

    assert_eq!(cluster.node(1).get(b"split"), None);
    assert_eq!(cluster.node(0).forwarder_stats().failed, 1);

    cluster.kill(0);
    cluster.node(1).set(b"split", b"new").unwrap();
    cluster.settle();
    assert_eq!(cluster.node(2).get(b"split"), Some(b"new".to_vec()));
}
