//! Tests for commit observers
//!
//! These tests verify:
//! - Observers receive one event per applied key, in WAL order
//! - Registration seeds the current snapshot
//! - Observer failures never fail a write
//! - Skipped and stale keys produce no events

use std::sync::Arc;

use driftkv::engine::Engine;
use driftkv::error::{DriftError, Result};
use driftkv::fault::FixedFaults;
use driftkv::observer::{CommitEvent, CommitObserver};
use driftkv::wal::{LogRecord, Operation, Version};
use parking_lot::Mutex;
use tempfile::TempDir;

use super::{config, masterless_config, open_with_faults, setup_temp_engine};

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<CommitEvent>>,
}

impl Recorder {
    fn keys(&self) -> Vec<(Vec<u8>, Option<Vec<u8>>, u64)> {
        self.events
            .lock()
            .iter()
            .map(|e| (e.key.clone(), e.value.clone(), e.seq))
            .collect()
    }
}

impl CommitObserver for Recorder {
    fn on_commit(&self, event: &CommitEvent) -> Result<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

struct Broken;

impl CommitObserver for Broken {
    fn on_commit(&self, _event: &CommitEvent) -> Result<()> {
        Err(DriftError::InvalidRequest("index unavailable".to_string()))
    }
}

#[test]
fn test_observer_sees_each_applied_key() {
    let (_temp, engine) = setup_temp_engine();
    let recorder = Arc::new(Recorder::default());
    engine.add_observer(recorder.clone());

    engine.set(b"a", b"1").unwrap();
    engine
        .bulk_set(vec![(b"b".to_vec(), b"2".to_vec()), (b"c".to_vec(), b"3".to_vec())])
        .unwrap();
    engine.delete(b"a").unwrap();

    assert_eq!(
        recorder.keys(),
        vec![
            (b"a".to_vec(), Some(b"1".to_vec()), 1),
            (b"b".to_vec(), Some(b"2".to_vec()), 2),
            (b"c".to_vec(), Some(b"3".to_vec()), 2),
            (b"a".to_vec(), None, 3),
        ]
    );
    assert!(recorder.events.lock()[3].is_tombstone());
}

#[test]
fn test_registration_seeds_live_keys() {
    let (_temp, engine) = setup_temp_engine();
    engine.set(b"live", b"1").unwrap();
    engine.set(b"gone", b"2").unwrap();
    engine.delete(b"gone").unwrap();

    let recorder = Arc::new(Recorder::default());
    engine.add_observer(recorder.clone());

    assert_eq!(recorder.keys(), vec![(b"live".to_vec(), Some(b"1".to_vec()), 0)]);
}

#[test]
fn test_failing_observer_does_not_fail_writes() {
    let (_temp, engine) = setup_temp_engine();
    engine.add_observer(Arc::new(Broken));

    engine.set(b"k", b"v").unwrap();
    engine.delete(b"k").unwrap();

    assert_eq!(engine.get(b"k"), None);
    assert_eq!(engine.stats().observer_failures, 2);
}

#[test]
fn test_skipped_apply_fires_on_recovery() {
    let temp_dir = TempDir::new().unwrap();
    let engine = open_with_faults(temp_dir.path(), Arc::new(FixedFaults(true)));
    let recorder = Arc::new(Recorder::default());
    engine.add_observer(recorder.clone());

    engine.set(b"k", b"v").unwrap();
    assert!(recorder.keys().is_empty());

    engine.recover().unwrap();
    assert_eq!(recorder.keys(), vec![(b"k".to_vec(), Some(b"v".to_vec()), 0)]);
}

#[test]
fn test_stale_keys_fire_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(masterless_config(temp_dir.path(), 1)).unwrap();
    let recorder = Arc::new(Recorder::default());
    engine.add_observer(recorder.clone());

    let newer = LogRecord::local(
        1,
        Operation::Set { key: b"k".to_vec(), value: b"new".to_vec() },
        Version::new(500, 2),
    );
    let older = LogRecord::local(
        1,
        Operation::BulkSet {
            pairs: vec![(b"k".to_vec(), b"old".to_vec()), (b"j".to_vec(), b"1".to_vec())],
        },
        Version::new(400, 3),
    );
    engine.apply_replicated(newer).unwrap();
    engine.apply_replicated(older).unwrap();

    let keys: Vec<Vec<u8>> = recorder.keys().into_iter().map(|(k, _, _)| k).collect();
    assert_eq!(keys, vec![b"k".to_vec(), b"j".to_vec()]);
    assert_eq!(engine.get(b"k"), Some(b"new".to_vec()));
}

#[test]
fn test_late_observer_is_seeded_then_follows() {
    let temp_dir = TempDir::new().unwrap();
    let engine = Engine::open(config(temp_dir.path(), 1)).unwrap();
    let first = Arc::new(Recorder::default());
    let second = Arc::new(Recorder::default());

    engine.add_observer(first.clone());
    engine.set(b"a", b"1").unwrap();
    engine.add_observer(second.clone());
    engine.set(b"b", b"2").unwrap();

    assert_eq!(first.keys().len(), 2);
    // Seeded with "a", then saw "b"
    assert_eq!(
        second.keys(),
        vec![(b"a".to_vec(), Some(b"1".to_vec()), 0), (b"b".to_vec(), Some(b"2".to_vec()), 2)]
    );
}
