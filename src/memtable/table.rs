//! MemTable implementation
//!
//! HashMap-based memtable with RwLock for concurrency.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;

use crate::wal::{Operation, Version};
use super::{ConflictPolicy, MemTableEntry, VersionedEntry};

/// A key whose value changed while applying a record
#[derive(Debug, Clone, PartialEq)]
pub struct KeyChange {
    pub key: Vec<u8>,

    /// New value, `None` for a delete
    pub value: Option<Vec<u8>>,
}

/// Outcome of applying one record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// Keys that took the record's value, in application order
    pub changes: Vec<KeyChange>,

    /// Keys skipped because a newer version was already applied
    pub stale_keys: usize,
}

/// In-memory key → value snapshot
pub struct MemTable {
    data: RwLock<HashMap<Vec<u8>, VersionedEntry>>,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Current value for a key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.data.read().get(key) {
            Some(VersionedEntry {
                entry: MemTableEntry::Value(value),
                ..
            }) => Some(value.clone()),
            _ => None,
        }
    }

    /// Entry and version for a key, tombstones included
    pub fn entry(&self, key: &[u8]) -> Option<VersionedEntry> {
        self.data.read().get(key).cloned()
    }

    /// Apply every key of `operation` under a single write lock.
    pub fn apply(
        &self,
        operation: &Operation,
        version: Version,
        policy: ConflictPolicy,
    ) -> ApplyReport {
        let mut data = self.data.write();
        let mut report = ApplyReport::default();

        let mut put = |key: &[u8], value: Option<&[u8]>| {
            if policy == ConflictPolicy::LastWriteWins {
                if let Some(current) = data.get(key) {
                    if current.version > version {
                        report.stale_keys += 1;
                        return;
                    }
                }
            }

            let entry = match value {
                Some(v) => MemTableEntry::Value(v.to_vec()),
                None => MemTableEntry::Tombstone,
            };
            data.insert(key.to_vec(), VersionedEntry { entry, version });
            report.changes.push(KeyChange {
                key: key.to_vec(),
                value: value.map(<[u8]>::to_vec),
            });
        };

        match operation {
            Operation::Set { key, value } => put(key.as_slice(), Some(value.as_slice())),
            Operation::Delete { key } => put(key.as_slice(), None),
            Operation::BulkSet { pairs } => {
                for (key, value) in pairs {
                    put(key.as_slice(), Some(value.as_slice()));
                }
            }
        }

        report
    }

    /// True when every key of `operation` already holds a strictly newer
    /// version, i.e. applying it under last-write-wins would change nothing.
    pub fn is_stale(&self, operation: &Operation, version: Version) -> bool {
        let data = self.data.read();
        operation.keys().iter().all(|key| {
            data.get(*key)
                .map(|current| current.version > version)
                .unwrap_or(false)
        })
    }

    /// Number of live (non-deleted) keys
    pub fn live_len(&self) -> usize {
        self.data
            .read()
            .values()
            .filter(|e| matches!(e.entry, MemTableEntry::Value(_)))
            .count()
    }

    /// Number of tracked keys, tombstones included
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Sorted copy of all live key/value pairs
    pub fn snapshot(&self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        self.data
            .read()
            .iter()
            .filter_map(|(key, e)| match &e.entry {
                MemTableEntry::Value(value) => Some((key.clone(), value.clone())),
                MemTableEntry::Tombstone => None,
            })
            .collect()
    }

    /// Live entries with the version that wrote them
    pub fn live_entries(&self) -> Vec<(Vec<u8>, Vec<u8>, Version)> {
        self.data
            .read()
            .iter()
            .filter_map(|(key, e)| match &e.entry {
                MemTableEntry::Value(value) => Some((key.clone(), value.clone(), e.version)),
                MemTableEntry::Tombstone => None,
            })
            .collect()
    }

    /// Replace the whole table with `other`'s contents
    pub fn replace_with(&self, other: MemTable) {
        *self.data.write() = other.data.into_inner();
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.data.write().clear();
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
