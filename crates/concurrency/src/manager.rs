//! Transaction manager for coordinating commit operations
//!
//! Provides atomic commit by orchestrating:
//! 1. Validation (first-committer-wins)
//! 2. Version allocation
//! 3. Storage application (visibility)
//!
//! Validation and application run under one commit lock, so no other
//! transaction can commit between a transaction's validation and the moment
//! its writes become visible.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use runstore_core::{Result, Storage};
use tracing::trace;

use crate::{CommitError, TransactionContext};

/// Manages transaction lifecycle and atomic commits
pub struct TransactionManager {
    /// Global version counter
    ///
    /// Monotonically increasing. Each committed write transaction increments by 1.
    version: AtomicU64,

    /// Next transaction ID
    next_txn_id: AtomicU64,

    /// Serializes validate + apply
    commit_lock: Mutex<()>,
}

impl TransactionManager {
    /// Create a new transaction manager starting at `initial_version`
    pub fn new(initial_version: u64) -> Self {
        TransactionManager {
            version: AtomicU64::new(initial_version),
            next_txn_id: AtomicU64::new(1),
            commit_lock: Mutex::new(()),
        }
    }

    /// Get current global version
    pub fn current_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Allocate next transaction ID
    pub fn next_txn_id(&self) -> u64 {
        self.next_txn_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Allocate next commit version
    pub fn allocate_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Commit a transaction atomically
    ///
    /// Returns the commit version. Read-only transactions commit at their
    /// snapshot version without allocating a new one.
    pub fn commit<S: Storage + ?Sized>(
        &self,
        txn: &mut TransactionContext,
        store: &S,
    ) -> std::result::Result<u64, CommitError> {
        let _guard = self.commit_lock.lock();

        txn.commit(store)?;
        if txn.is_read_only() {
            return Ok(txn.start_version);
        }

        let commit_version = self.allocate_version();
        let applied = txn
            .apply_writes(store, commit_version)
            .map_err(|e| CommitError::StorageError(e.to_string()))?;
        trace!(
            txn_id = txn.txn_id,
            commit_version,
            puts = applied.puts_applied,
            deletes = applied.deletes_applied,
            "transaction applied"
        );
        Ok(commit_version)
    }

    /// Explicitly abort a transaction
    pub fn abort(&self, txn: &mut TransactionContext, reason: String) -> Result<()> {
        txn.mark_aborted(reason)
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("version", &self.current_version())
            .field("next_txn_id", &self.next_txn_id.load(Ordering::SeqCst))
            .finish()
    }
}
