//! OrderedSnapshot: version-bounded view over the live store
//!
//! Instead of cloning data at creation time, the snapshot keeps an `Arc` to
//! the store plus the version it was taken at. Every read filters version
//! chains to that version, so creating a snapshot is O(1).

use std::sync::Arc;

use runstore_core::{Result, ScanVisitor, SnapshotView, VersionedValue};

use crate::ordered::OrderedStore;

/// Point-in-time read view of an [`OrderedStore`]
#[derive(Debug, Clone)]
pub struct OrderedSnapshot {
    /// Version captured at snapshot time
    version: u64,
    /// Reference to the underlying store
    store: Arc<OrderedStore>,
}

impl OrderedSnapshot {
    /// Create a snapshot of `store` at `version`
    ///
    /// This is typically called by `OrderedStore::snapshot()`, not directly.
    pub fn new(version: u64, store: Arc<OrderedStore>) -> Self {
        Self { version, store }
    }
}

impl SnapshotView for OrderedSnapshot {
    fn get(&self, key: &[u8]) -> Result<Option<VersionedValue>> {
        Ok(self.store.read_at(key, self.version))
    }

    fn scan_range(
        &self,
        start: &[u8],
        end: Option<&[u8]>,
        visit: &mut ScanVisitor<'_>,
    ) -> Result<()> {
        self.store.scan_at(start, end, self.version, visit);
        Ok(())
    }

    fn version(&self) -> u64 {
        self.version
    }
}
