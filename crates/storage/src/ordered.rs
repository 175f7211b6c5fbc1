//! OrderedStore: multi-versioned ordered byte store
//!
//! Keys are kept in a single `BTreeMap` so range scans come back in key
//! order, which the run partitions depend on (newest-first completed runs).
//! Each key maps to a `VersionChain`; readers pick the newest entry at or
//! below their snapshot version, so a snapshot never observes a later commit.
//!
//! # Locking
//!
//! One `parking_lot::RwLock` guards the map. Commits take the write lock for
//! the whole batch, which makes every batch atomic to readers.
//!
//! # Reclamation
//!
//! A commit that supersedes or deletes an existing key queues that key with
//! the commit version. Once no snapshot older than that version is live,
//! [`OrderedStore::reclaim_before`] trims the key's chain and drops it
//! entirely when only a tombstone is left. Lock order is map, then queue.

use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use runstore_core::{Result, ScanVisitor, Storage, VersionedValue};
use tracing::{debug, trace};

use crate::snapshot::OrderedSnapshot;
use crate::stored_value::StoredValue;

/// Version chain for MVCC - stores multiple versions of a value
///
/// Versions are stored in descending order (newest first) for efficient
/// snapshot reads - we typically want the most recent version <= snapshot_version.
#[derive(Debug, Clone)]
pub struct VersionChain {
    versions: VecDeque<StoredValue>,
}

impl VersionChain {
    /// Create a new version chain with a single version
    pub fn new(value: StoredValue) -> Self {
        let mut versions = VecDeque::with_capacity(2);
        versions.push_front(value);
        Self { versions }
    }

    /// Add a new version (must be newer than existing versions)
    #[inline]
    pub fn push(&mut self, value: StoredValue) {
        debug_assert!(self
            .versions
            .front()
            .map_or(true, |v| v.version() <= value.version()));
        self.versions.push_front(value);
    }

    /// Get the version at or before the given max_version
    pub fn get_at_version(&self, max_version: u64) -> Option<&StoredValue> {
        self.versions.iter().find(|sv| sv.version() <= max_version)
    }

    /// Get the latest version
    #[inline]
    pub fn latest(&self) -> Option<&StoredValue> {
        self.versions.front()
    }

    /// Drop versions no snapshot at or above `min_version` can see
    ///
    /// Keeps every version newer than `min_version` plus the newest one at or
    /// below it. Returns the number of versions removed.
    pub fn gc(&mut self, min_version: u64) -> usize {
        let keep = match self
            .versions
            .iter()
            .position(|sv| sv.version() <= min_version)
        {
            Some(idx) => idx + 1,
            None => return 0,
        };
        let removed = self.versions.len() - keep;
        self.versions.truncate(keep);
        removed
    }

    /// True if the only remaining version is a tombstone visible at `min_version`
    fn is_dead(&self, min_version: u64) -> bool {
        self.versions.len() == 1
            && self
                .versions
                .front()
                .map_or(true, |sv| sv.is_tombstone() && sv.version() <= min_version)
    }

    /// Number of versions stored
    pub fn version_count(&self) -> usize {
        self.versions.len()
    }
}

/// Ordered multi-versioned store
#[derive(Debug, Default)]
pub struct OrderedStore {
    data: RwLock<BTreeMap<Vec<u8>, VersionChain>>,
    version: AtomicU64,
    /// Keys with stale versions, in commit-version order
    reclaim: Mutex<VecDeque<(u64, Vec<u8>)>>,
}

impl OrderedStore {
    /// Create an empty store at version 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest committed version
    #[inline]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Snapshot at the current version
    pub fn snapshot(self: &Arc<Self>) -> OrderedSnapshot {
        OrderedSnapshot::new(self.version(), Arc::clone(self))
    }

    /// Number of keys whose latest version is live
    pub fn live_key_count(&self) -> usize {
        self.data
            .read()
            .values()
            .filter(|chain| chain.latest().map_or(false, |sv| !sv.is_tombstone()))
            .count()
    }

    /// Total versions held across all keys
    pub fn total_versions(&self) -> usize {
        self.data.read().values().map(VersionChain::version_count).sum()
    }

    /// Prune versions invisible to every snapshot at or above `min_version`
    ///
    /// Callers must not hold snapshots older than `min_version`.
    /// Returns the number of versions removed.
    pub fn gc_versions_before(&self, min_version: u64) -> usize {
        let mut data = self.data.write();
        let mut removed = 0;
        data.retain(|_, chain| {
            removed += chain.gc(min_version);
            if chain.is_dead(min_version) {
                removed += 1;
                false
            } else {
                true
            }
        });
        debug!(min_version, removed, "pruned old versions");
        removed
    }

    /// Reclaim keys superseded at or before `min_version`
    ///
    /// `min_version` must not exceed the version of the oldest live snapshot.
    /// Only keys queued by earlier commits are visited. Returns the number of
    /// versions removed.
    pub fn reclaim_before(&self, min_version: u64) -> usize {
        let mut data = self.data.write();
        let mut queue = self.reclaim.lock();
        let mut removed = 0;
        while let Some((version, _)) = queue.front() {
            if *version > min_version {
                break;
            }
            let Some((_, key)) = queue.pop_front() else {
                break;
            };
            let Some(chain) = data.get_mut(&key) else {
                continue;
            };
            removed += chain.gc(min_version);
            if chain.is_dead(min_version) {
                data.remove(&key);
                removed += 1;
            }
        }
        if removed > 0 {
            trace!(min_version, removed, pending = queue.len(), "reclaimed versions");
        }
        removed
    }

    /// Keys waiting for reclamation
    pub fn pending_reclaim(&self) -> usize {
        self.reclaim.lock().len()
    }

    pub(crate) fn read_at(&self, key: &[u8], max_version: u64) -> Option<VersionedValue> {
        self.data
            .read()
            .get(key)
            .and_then(|chain| chain.get_at_version(max_version))
            .and_then(StoredValue::to_versioned)
    }

    pub(crate) fn scan_at(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        max_version: u64,
        visit: &mut ScanVisitor<'_>,
    ) {
        let upper = match end {
            Some(end) if end <= start => return,
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        let data = self.data.read();
        for (key, chain) in data.range::<[u8], _>((Bound::Included(start), upper)) {
            let Some(vv) = chain
                .get_at_version(max_version)
                .and_then(StoredValue::to_versioned)
            else {
                continue;
            };
            if !visit(key, &vv) {
                break;
            }
        }
    }
}

impl Storage for OrderedStore {
    fn get(&self, key: &[u8]) -> Result<Option<VersionedValue>> {
        Ok(self.read_at(key, u64::MAX))
    }

    fn get_versioned(&self, key: &[u8], max_version: u64) -> Result<Option<VersionedValue>> {
        Ok(self.read_at(key, max_version))
    }

    fn scan_range(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        max_version: u64,
        visit: &mut ScanVisitor<'_>,
    ) -> Result<()> {
        self.scan_at(start, end, max_version, visit);
        Ok(())
    }

    fn current_version(&self) -> u64 {
        self.version()
    }

    fn apply_batch(
        &self,
        writes: Vec<(Vec<u8>, Vec<u8>)>,
        deletes: Vec<Vec<u8>>,
        version: u64,
    ) -> Result<()> {
        let mut data = self.data.write();
        let mut reclaim = self.reclaim.lock();
        for (key, value) in writes {
            let stored = StoredValue::new(value, version);
            match data.get_mut(&key) {
                Some(chain) => {
                    chain.push(stored);
                    reclaim.push_back((version, key));
                }
                None => {
                    data.insert(key, VersionChain::new(stored));
                }
            }
        }
        for key in deletes {
            // Tombstones only matter for keys that exist
            if let Some(chain) = data.get_mut(&key) {
                chain.push(StoredValue::tombstone(version));
                reclaim.push_back((version, key));
            }
        }
        // Publish while still holding the write lock so new snapshots see the whole batch
        self.version.fetch_max(version, Ordering::AcqRel);
        Ok(())
    }
}
