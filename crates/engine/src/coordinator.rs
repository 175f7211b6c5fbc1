//! Transaction coordinator for managing transaction lifecycle
//!
//! The TransactionCoordinator wraps TransactionManager and adds:
//! - Snapshot creation for new transactions
//! - Transaction metrics (started, committed, aborted, conflicted)
//! - Commit rate calculation
//! - Tracking of live snapshot versions, which bounds version reclamation

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use runstore_concurrency::{CommitError, TransactionContext, TransactionManager};
use runstore_core::{Error, Result, SnapshotView, Storage};
use runstore_storage::OrderedStore;
use tracing::{debug, warn};

/// Transaction coordinator for the database
///
/// The metric counters use Relaxed ordering: they are observational only
/// and do not synchronize other memory.
pub struct TransactionCoordinator {
    manager: TransactionManager,
    active_count: AtomicU64,
    total_started: AtomicU64,
    total_committed: AtomicU64,
    total_aborted: AtomicU64,
    total_conflicts: AtomicU64,
    /// Start version -> number of unfinished transactions reading at it
    live_snapshots: Mutex<BTreeMap<u64, usize>>,
}

impl TransactionCoordinator {
    /// Create new coordinator with initial version
    pub fn new(initial_version: u64) -> Self {
        Self {
            manager: TransactionManager::new(initial_version),
            active_count: AtomicU64::new(0),
            total_started: AtomicU64::new(0),
            total_committed: AtomicU64::new(0),
            total_aborted: AtomicU64::new(0),
            total_conflicts: AtomicU64::new(0),
            live_snapshots: Mutex::new(BTreeMap::new()),
        }
    }

    /// Start a new transaction on a snapshot of `storage`
    ///
    /// The snapshot stays registered until the transaction is committed or
    /// aborted through this coordinator.
    pub fn start_transaction(&self, storage: &Arc<OrderedStore>) -> TransactionContext {
        let txn_id = self.manager.next_txn_id();
        let snapshot = {
            // Taken under the registry lock so reclamation never passes it
            let mut live = self.live_snapshots.lock();
            let snapshot = storage.snapshot();
            *live.entry(snapshot.version()).or_insert(0) += 1;
            snapshot
        };
        self.record_start();
        debug!(target: "runstore::txn", txn_id, version = snapshot.version(), "Transaction started");
        TransactionContext::with_snapshot(txn_id, Box::new(snapshot))
    }

    /// Commit a transaction through the concurrency layer
    ///
    /// Records commit/abort metrics and converts `CommitError` into `Error`.
    pub fn commit<S: Storage + ?Sized>(&self, txn: &mut TransactionContext, store: &S) -> Result<u64> {
        let was_active = txn.is_active();
        let result = self.manager.commit(txn, store);
        if was_active {
            self.release_snapshot(txn.start_version);
        }
        match result {
            Ok(version) => {
                self.record_commit();
                debug!(target: "runstore::txn", txn_id = txn.txn_id, version, "Transaction committed");
                Ok(version)
            }
            Err(e) => {
                if matches!(e, CommitError::ValidationFailed(_)) {
                    self.total_conflicts.fetch_add(1, Ordering::Relaxed);
                }
                self.record_abort();
                warn!(target: "runstore::txn", txn_id = txn.txn_id, error = %e, "Transaction aborted");
                Err(Error::from(e))
            }
        }
    }

    /// Abort an active transaction and release its snapshot
    ///
    /// Does nothing if the transaction already finished.
    pub fn abort(&self, txn: &mut TransactionContext, reason: String) -> Result<()> {
        self.manager.abort(txn, reason)?;
        self.release_snapshot(txn.start_version);
        self.record_abort();
        Ok(())
    }

    fn release_snapshot(&self, version: u64) {
        let mut live = self.live_snapshots.lock();
        if let Some(count) = live.get_mut(&version) {
            *count -= 1;
            if *count == 0 {
                live.remove(&version);
            }
        }
    }

    /// Oldest version any unfinished transaction reads at
    ///
    /// `current` when no transaction is running.
    pub fn min_live_version(&self, current: u64) -> u64 {
        self.live_snapshots
            .lock()
            .keys()
            .next()
            .copied()
            .map_or(current, |oldest| oldest.min(current))
    }

    /// Reclaim versions no running transaction can read
    pub fn reclaim(&self, storage: &OrderedStore) -> usize {
        let min_version = self.min_live_version(storage.version());
        storage.reclaim_before(min_version)
    }

    /// Record transaction start
    pub fn record_start(&self) {
        self.active_count.fetch_add(1, Ordering::Relaxed);
        self.total_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record transaction commit
    pub fn record_commit(&self) {
        self.decrement_active();
        self.total_committed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record transaction abort
    pub fn record_abort(&self) {
        self.decrement_active();
        self.total_aborted.fetch_add(1, Ordering::Relaxed);
    }

    fn decrement_active(&self) {
        // Saturating: a double-recorded end must not wrap the gauge
        let _ = self
            .active_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |x| {
                Some(x.saturating_sub(1))
            });
    }

    /// Get current global version
    pub fn current_version(&self) -> u64 {
        self.manager.current_version()
    }

    /// Get transaction metrics
    pub fn metrics(&self) -> TransactionMetrics {
        let started = self.total_started.load(Ordering::Relaxed);
        let committed = self.total_committed.load(Ordering::Relaxed);

        TransactionMetrics {
            active_count: self.active_count.load(Ordering::Relaxed),
            total_started: started,
            total_committed: committed,
            total_aborted: self.total_aborted.load(Ordering::Relaxed),
            total_conflicts: self.total_conflicts.load(Ordering::Relaxed),
            commit_rate: if started > 0 {
                committed as f64 / started as f64
            } else {
                0.0
            },
        }
    }
}

/// Transaction metrics snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionMetrics {
    /// Transactions begun but not yet finished
    pub active_count: u64,
    /// Total transactions started
    pub total_started: u64,
    /// Total transactions committed
    pub total_committed: u64,
    /// Total transactions aborted (conflicts, closure errors, timeouts)
    pub total_aborted: u64,
    /// Aborts caused by failed read-set validation
    pub total_conflicts: u64,
    /// committed / started
    pub commit_rate: f64,
}
