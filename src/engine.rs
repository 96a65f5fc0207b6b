//! Engine Module
//!
//! The store engine: one node's WAL and in-memory snapshot as a single unit.
//!
//! ## Responsibilities
//! - Log every mutation durably before applying it
//! - Apply records (bulk writes included) atomically to the snapshot
//! - Resolve replicated records (duplicates, last-write-wins)
//! - Rebuild the snapshot from the WAL on startup

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::clock::HybridClock;
use crate::config::Config;
use crate::error::{DriftError, Result};
use crate::fault::{FaultInjector, FaultyWalFile, NoFaults, ProbabilisticFaults};
use crate::memtable::{ApplyReport, ConflictPolicy, MemTable, VersionedEntry};
use crate::observer::{CommitEvent, CommitObserver};
use crate::wal::{LogRecord, NodeId, Operation, OperationKind, RecoveryResult, WalRecovery, WalWriter};

/// Largest accepted key (64 KB)
pub const MAX_KEY_SIZE: usize = 64 * 1024;

/// Largest accepted value (16 MB)
pub const MAX_VALUE_SIZE: usize = 16 * 1024 * 1024;

/// What happened to a record received from a peer
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicatedApply {
    /// Logged locally (under the returned local sequence) and applied
    Applied(LogRecord),

    /// Already received from this origin; ignored
    Duplicate,

    /// Every key already holds a newer version; ignored (last-write-wins)
    Stale,
}

/// Point-in-time engine counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub records_appended: u64,
    pub applies_skipped: u64,
    pub stale_records: u64,
    pub stale_keys: u64,
    pub duplicate_records: u64,
    pub observer_failures: u64,
}

#[derive(Default)]
struct Counters {
    records_appended: AtomicU64,
    applies_skipped: AtomicU64,
    stale_records: AtomicU64,
    stale_keys: AtomicU64,
    duplicate_records: AtomicU64,
    observer_failures: AtomicU64,
}

/// `origin_seq`s received from one remote origin: every sequence up to
/// `contiguous`, plus those that arrived ahead of a missing one
#[derive(Debug, Default)]
struct OriginProgress {
    contiguous: u64,
    ahead: BTreeSet<u64>,
}

impl OriginProgress {
    fn contains(&self, origin_seq: u64) -> bool {
        origin_seq <= self.contiguous || self.ahead.contains(&origin_seq)
    }

    fn insert(&mut self, origin_seq: u64) {
        if origin_seq <= self.contiguous {
            return;
        }
        self.ahead.insert(origin_seq);
        while self.ahead.remove(&(self.contiguous + 1)) {
            self.contiguous += 1;
        }
    }
}

/// State owned by whoever holds the append slot
struct WriteState {
    wal: WalWriter,

    /// Sequences received per remote origin
    received: HashMap<NodeId, OriginProgress>,
}

/// The store engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (set/delete/bulk_set/apply_replicated/recover): Serialized by
///   the `writer` mutex, held across version stamping → WAL append+fsync →
///   snapshot apply → observer notification. Apply order is WAL order.
///
/// - **Reads** (get): Never touch the writer mutex. The MemTable's RwLock is
///   taken exclusively once per record, so a reader sees either none or all
///   of a bulk write.
pub struct Engine {
    config: Config,

    wal_path: PathBuf,

    policy: ConflictPolicy,

    /// Append slot: WAL writer plus per-origin receive tracking
    writer: Mutex<WriteState>,

    memtable: MemTable,

    clock: HybridClock,

    faults: Arc<dyn FaultInjector>,

    observers: RwLock<Vec<Arc<dyn CommitObserver>>>,

    counters: Counters,
}

/// Snapshot rebuilt from the WAL
struct Replayed {
    memtable: MemTable,
    received: HashMap<NodeId, OriginProgress>,
    result: RecoveryResult,
}

impl Engine {
    const WAL_FILENAME: &'static str = "wal.log";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Recover: truncate any invalid WAL tail, replay the rest
    /// 3. Ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let faults: Arc<dyn FaultInjector> = if config.fault_probability > 0.0 {
            Arc::new(ProbabilisticFaults::new(config.fault_probability)?)
        } else {
            Arc::new(NoFaults)
        };
        Self::open_with_faults(config, faults)
    }

    /// Open with an explicit fault injector
    pub fn open_with_faults(config: Config, faults: Arc<dyn FaultInjector>) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let wal_path = config.data_dir.join(Self::WAL_FILENAME);
        let policy = config.topology.conflict_policy();
        let clock = HybridClock::new(config.node_id);

        let replayed = Self::replay(&wal_path, policy, &clock, config.node_id)?;
        Self::log_recovery(&replayed.result);

        let wal = Self::open_wal(&wal_path, replayed.result.last_seq, &faults)?;

        tracing::info!(
            node_id = config.node_id,
            data_dir = %config.data_dir.display(),
            records = replayed.result.records_recovered,
            live_keys = replayed.memtable.live_len(),
            "engine opened"
        );

        Ok(Self {
            wal_path,
            policy,
            writer: Mutex::new(WriteState {
                wal,
                received: replayed.received,
            }),
            memtable: replayed.memtable,
            clock,
            faults,
            observers: RwLock::new(Vec::new()),
            counters: Counters::default(),
            config,
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    // =========================================================================
    // Client Operations
    // =========================================================================

    /// Current value of a key. Reads the snapshot only.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.memtable.get(key)
    }

    /// Set a key. Returns the committed record once it is durable.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<LogRecord> {
        validate_key(key)?;
        validate_value(value)?;
        self.commit_local(Operation::Set {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    /// Delete a key. Deleting a missing key still logs a tombstone.
    pub fn delete(&self, key: &[u8]) -> Result<LogRecord> {
        validate_key(key)?;
        self.commit_local(Operation::Delete { key: key.to_vec() })
    }

    /// Set every pair in one record: one append, one fsync, one apply.
    pub fn bulk_set(&self, pairs: Vec<(Vec<u8>, Vec<u8>)>) -> Result<LogRecord> {
        if pairs.is_empty() {
            return Err(DriftError::InvalidRequest(
                "bulk set requires at least one pair".to_string(),
            ));
        }
        for (key, value) in &pairs {
            validate_key(key)?;
            validate_value(value)?;
        }
        self.commit_local(Operation::BulkSet { pairs })
    }

    fn commit_local(&self, operation: Operation) -> Result<LogRecord> {
        let mut state = self.writer.lock();

        let version = self.clock.tick();
        let record = LogRecord::local(state.wal.next_seq(), operation, version);
        state.wal.append(&record)?;
        self.counters.records_appended.fetch_add(1, Ordering::Relaxed);

        let injectable = matches!(record.kind(), OperationKind::Set | OperationKind::BulkSet);
        if injectable && self.faults.skip_apply() {
            self.counters.applies_skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(seq = record.seq, "fault injector skipped apply; WAL holds the record");
            return Ok(record);
        }

        let report = self.memtable.apply(&record.operation, record.version, self.policy);
        self.finish_apply(&record, &report);

        tracing::trace!(seq = record.seq, kind = ?record.kind(), "record committed");
        Ok(record)
    }

    // =========================================================================
    // Replication Ingress
    // =========================================================================

    /// Apply a record forwarded by a peer.
    ///
    /// Skips client validation and the fault injector. Records may arrive
    /// in any order. Duplicates (an `origin_seq` already received from that
    /// origin) and, under last-write-wins, records with nothing left to win
    /// are dropped without touching the WAL. Anything else is logged under a
    /// fresh local sequence and applied.
    pub fn apply_replicated(&self, record: LogRecord) -> Result<ReplicatedApply> {
        let mut state = self.writer.lock();
        let origin = record.version.origin;

        self.clock.observe(record.version.timestamp);

        let progress = state.received.entry(origin).or_default();
        if progress.contains(record.origin_seq) {
            self.counters.duplicate_records.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(origin, origin_seq = record.origin_seq, "duplicate replicated record dropped");
            return Ok(ReplicatedApply::Duplicate);
        }
        if record.origin_seq > progress.contiguous + 1 {
            tracing::debug!(
                origin,
                expected = progress.contiguous + 1,
                received = record.origin_seq,
                "replicated record arrived ahead of earlier records from its origin"
            );
        }

        if self.policy == ConflictPolicy::LastWriteWins
            && self.memtable.is_stale(&record.operation, record.version)
        {
            progress.insert(record.origin_seq);
            self.counters.stale_records.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(origin, origin_seq = record.origin_seq, "stale replicated record discarded");
            return Ok(ReplicatedApply::Stale);
        }

        let local = record.relogged(state.wal.next_seq());
        state.wal.append(&local)?;
        state.received.entry(origin).or_default().insert(record.origin_seq);
        self.counters.records_appended.fetch_add(1, Ordering::Relaxed);

        let report = self.memtable.apply(&local.operation, local.version, self.policy);
        self.finish_apply(&local, &report);

        tracing::trace!(seq = local.seq, origin, origin_seq = local.origin_seq, "replicated record applied");
        Ok(ReplicatedApply::Applied(local))
    }

    // =========================================================================
    // Recovery
    // =========================================================================

    /// Rebuild the snapshot from the WAL.
    ///
    /// Truncates any invalid tail, then replays every valid record into an
    /// empty table. The fault injector is not consulted, so writes whose
    /// apply was skipped become visible. Observers are re-seeded with the
    /// rebuilt snapshot.
    pub fn recover(&self) -> Result<RecoveryResult> {
        let mut state = self.writer.lock();

        let replayed = Self::replay(&self.wal_path, self.policy, &self.clock, self.config.node_id)?;
        Self::log_recovery(&replayed.result);

        state.wal = Self::open_wal(&self.wal_path, replayed.result.last_seq, &self.faults)?;
        state.received = replayed.received;
        self.memtable.replace_with(replayed.memtable);

        for observer in self.observers.read().iter() {
            self.seed_observer(observer.as_ref());
        }

        Ok(replayed.result)
    }

    fn open_wal(path: &Path, last_seq: u64, faults: &Arc<dyn FaultInjector>) -> Result<WalWriter> {
        let file = FaultyWalFile::new(WalWriter::open_file(path)?, Arc::clone(faults));
        WalWriter::with_file(path, Box::new(file), last_seq)
    }

    fn replay(
        wal_path: &Path,
        policy: ConflictPolicy,
        clock: &HybridClock,
        node_id: NodeId,
    ) -> Result<Replayed> {
        let (records, result) = WalRecovery::recover(wal_path)?;

        let memtable = MemTable::new();
        let mut received: HashMap<NodeId, OriginProgress> = HashMap::new();

        for record in &records {
            clock.observe(record.version.timestamp);
            memtable.apply(&record.operation, record.version, policy);

            let origin = record.version.origin;
            if origin != node_id {
                received.entry(origin).or_default().insert(record.origin_seq);
            }
        }

        Ok(Replayed {
            memtable,
            received,
            result,
        })
    }

    /// Replay summary. A discarded tail was already reported by `WalRecovery`.
    fn log_recovery(result: &RecoveryResult) {
        if result.records_recovered > 0 || result.was_truncated {
            tracing::info!(
                records = result.records_recovered,
                last_seq = result.last_seq,
                truncated = result.was_truncated,
                "WAL replayed"
            );
        }
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Register an observer. It first receives every live key of the
    /// current snapshot (with `seq` 0), then each subsequent commit.
    pub fn add_observer(&self, observer: Arc<dyn CommitObserver>) {
        // Holding the append slot keeps commits from slipping between the
        // seed and the registration.
        let _state = self.writer.lock();
        self.seed_observer(observer.as_ref());
        self.observers.write().push(observer);
    }

    fn seed_observer(&self, observer: &dyn CommitObserver) {
        for (key, value, version) in self.memtable.live_entries() {
            let event = CommitEvent {
                key,
                value: Some(value),
                version,
                seq: 0,
            };
            if let Err(e) = observer.on_commit(&event) {
                self.counters.observer_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "observer failed while seeding");
            }
        }
    }

    fn finish_apply(&self, record: &LogRecord, report: &ApplyReport) {
        if report.stale_keys > 0 {
            self.counters
                .stale_keys
                .fetch_add(report.stale_keys as u64, Ordering::Relaxed);
            tracing::debug!(seq = record.seq, stale_keys = report.stale_keys, "keys lost last-write-wins");
        }

        let observers = self.observers.read();
        if observers.is_empty() {
            return;
        }

        for change in &report.changes {
            let event = CommitEvent {
                key: change.key.clone(),
                value: change.value.clone(),
                version: record.version,
                seq: record.seq,
            };
            for observer in observers.iter() {
                if let Err(e) = observer.on_commit(&event) {
                    self.counters.observer_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(seq = record.seq, error = %e, "commit observer failed");
                }
            }
        }
    }

    /// Sync the WAL and drop the engine
    pub fn close(self) -> Result<()> {
        self.writer.lock().wal.sync()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Entry and version for a key, tombstones included
    pub fn entry(&self, key: &[u8]) -> Option<VersionedEntry> {
        self.memtable.entry(key)
    }

    /// Sorted copy of all live key/value pairs
    pub fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.memtable.snapshot()
    }

    /// Number of live keys
    pub fn live_len(&self) -> usize {
        self.memtable.live_len()
    }

    /// Sequence number of the last durable record
    pub fn last_seq(&self) -> u64 {
        self.writer.lock().wal.last_seq()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            records_appended: self.counters.records_appended.load(Ordering::Relaxed),
            applies_skipped: self.counters.applies_skipped.load(Ordering::Relaxed),
            stale_records: self.counters.stale_records.load(Ordering::Relaxed),
            stale_keys: self.counters.stale_keys.load(Ordering::Relaxed),
            duplicate_records: self.counters.duplicate_records.load(Ordering::Relaxed),
            observer_failures: self.counters.observer_failures.load(Ordering::Relaxed),
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.config.node_id
    }

    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

fn validate_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(DriftError::InvalidRequest("key must not be empty".to_string()));
    }
    if key.len() > MAX_KEY_SIZE {
        return Err(DriftError::InvalidRequest(format!(
            "key of {} bytes exceeds the {} byte limit",
            key.len(),
            MAX_KEY_SIZE
        )));
    }
    Ok(())
}

fn validate_value(value: &[u8]) -> Result<()> {
    if value.len() > MAX_VALUE_SIZE {
        return Err(DriftError::InvalidRequest(format!(
            "value of {} bytes exceeds the {} byte limit",
            value.len(),
            MAX_VALUE_SIZE
        )));
    }
    Ok(())
}
