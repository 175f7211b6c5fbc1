//! Core traits for storage and snapshot abstraction
//!
//! Both traits work on raw byte keys ordered lexicographically. Range scans
//! hand rows to a visitor instead of materializing them, so callers can stop
//! early (limits, wall-clock budgets) without copying the rest of the range.

use crate::error::Result;
use crate::value::VersionedValue;

/// Row visitor used by range scans
///
/// Return `false` to stop the scan.
pub type ScanVisitor<'a> = dyn FnMut(&[u8], &VersionedValue) -> bool + 'a;

/// Ordered, multi-versioned byte store
///
/// Thread safety: All methods must be safe to call concurrently from
/// multiple threads (requires Send + Sync).
pub trait Storage: Send + Sync {
    /// Get current value for key (latest version)
    ///
    /// Returns None if the key doesn't exist or its latest version is a tombstone.
    fn get(&self, key: &[u8]) -> Result<Option<VersionedValue>>;

    /// Get the latest value at or before `max_version`
    fn get_versioned(&self, key: &[u8], max_version: u64) -> Result<Option<VersionedValue>>;

    /// Visit live rows in `[start, end)` as of `max_version`, in key order
    ///
    /// `end = None` scans to the end of the keyspace.
    fn scan_range(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        max_version: u64,
        visit: &mut ScanVisitor<'_>,
    ) -> Result<()>;

    /// Highest version assigned so far
    fn current_version(&self) -> u64;

    /// Apply a committed write set atomically at `version`
    ///
    /// Every write and delete gets the same version. Deletes leave tombstones
    /// so older snapshots keep seeing the previous value.
    fn apply_batch(
        &self,
        writes: Vec<(Vec<u8>, Vec<u8>)>,
        deletes: Vec<Vec<u8>>,
        version: u64,
    ) -> Result<()>;
}

/// Version-bounded read view of storage
pub trait SnapshotView: Send + Sync {
    /// Get value as it existed at the snapshot version
    fn get(&self, key: &[u8]) -> Result<Option<VersionedValue>>;

    /// Visit rows in `[start, end)` as they existed at the snapshot version
    fn scan_range(&self, start: &[u8], end: Option<&[u8]>, visit: &mut ScanVisitor<'_>)
        -> Result<()>;

    /// Version this snapshot was created at
    fn version(&self) -> u64;
}
