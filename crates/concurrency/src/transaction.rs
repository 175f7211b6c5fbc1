//! Transaction context for OCC
//!
//! This module implements the core transaction data structure for optimistic
//! concurrency control. TransactionContext tracks all reads, writes and
//! deletes for a transaction, enabling validation at commit time.
//!
//! Reads go through a version-bounded snapshot and are recorded in the read
//! set; writes and deletes are buffered and only reach storage when the
//! transaction commits, all at one commit version.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::time::{Duration, Instant};

use runstore_core::{Error, Result, SnapshotView, Storage};

use crate::validation::{validate_transaction, ValidationResult};

/// Error type for commit failures
#[derive(Debug, Clone)]
pub enum CommitError {
    /// Transaction aborted due to read-set conflicts
    ValidationFailed(ValidationResult),

    /// Transaction was not in correct state for commit
    InvalidState(String),

    /// Storage rejected the write batch
    StorageError(String),
}

impl std::fmt::Display for CommitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitError::ValidationFailed(result) => {
                write!(f, "Commit failed: {} conflict(s)", result.conflict_count())
            }
            CommitError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            CommitError::StorageError(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for CommitError {}

impl From<CommitError> for Error {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::ValidationFailed(result) => Error::TransactionConflict(format!(
                "validation failed: {} conflict(s)",
                result.conflict_count()
            )),
            CommitError::InvalidState(msg) => Error::TransactionNotActive(msg),
            CommitError::StorageError(msg) => Error::Storage(msg),
        }
    }
}

/// Result of applying transaction writes to storage
#[derive(Debug, Clone)]
pub struct ApplyResult {
    /// Version assigned to all writes in this transaction
    pub commit_version: u64,
    /// Number of puts applied
    pub puts_applied: usize,
    /// Number of deletes applied
    pub deletes_applied: usize,
}

impl ApplyResult {
    /// Total number of operations applied
    pub fn total_operations(&self) -> usize {
        self.puts_applied + self.deletes_applied
    }
}

/// Summary of pending operations that would be rolled back on abort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOperations {
    /// Number of pending put operations
    pub puts: usize,
    /// Number of pending delete operations
    pub deletes: usize,
}

impl PendingOperations {
    /// Total number of pending operations
    pub fn total(&self) -> usize {
        self.puts + self.deletes
    }

    /// Check if there are no pending operations
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Status of a transaction in its lifecycle
///
/// State transitions:
/// - `Active` → `Validating` (begin commit)
/// - `Validating` → `Committed` (validation passed)
/// - `Validating` → `Aborted` (conflict detected)
/// - `Active` → `Aborted` (user abort or error)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Transaction is executing, can read/write
    Active,
    /// Transaction is being validated for conflicts
    Validating,
    /// Transaction committed successfully
    Committed,
    /// Transaction was aborted
    Aborted {
        /// Why the transaction aborted
        reason: String,
    },
}

/// Transaction context for OCC with snapshot isolation
pub struct TransactionContext {
    /// Unique transaction ID
    pub txn_id: u64,
    /// Snapshot version this transaction reads at
    pub start_version: u64,
    snapshot: Option<Box<dyn SnapshotView>>,
    /// Keys read from the snapshot and the version observed (0 = absent)
    read_set: HashMap<Vec<u8>, u64>,
    /// Buffered writes, ordered so range scans can merge them
    write_set: BTreeMap<Vec<u8>, Vec<u8>>,
    /// Buffered deletes
    delete_set: BTreeSet<Vec<u8>>,
    /// Current status
    pub status: TransactionStatus,
    start_time: Instant,
}

impl TransactionContext {
    /// Create a transaction reading from `snapshot`
    pub fn with_snapshot(txn_id: u64, snapshot: Box<dyn SnapshotView>) -> Self {
        let start_version = snapshot.version();
        Self {
            txn_id,
            start_version,
            snapshot: Some(snapshot),
            read_set: HashMap::new(),
            write_set: BTreeMap::new(),
            delete_set: BTreeSet::new(),
            status: TransactionStatus::Active,
            start_time: Instant::now(),
        }
    }

    // === Read Operations ===

    /// Get a value, seeing this transaction's own writes and deletes
    ///
    /// Only reads that reach the snapshot are tracked in the read set.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.ensure_active()?;

        if let Some(value) = self.write_set.get(key) {
            return Ok(Some(value.clone()));
        }
        if self.delete_set.contains(key) {
            return Ok(None);
        }
        self.read_from_snapshot(key)
    }

    fn read_from_snapshot(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let snapshot = self.snapshot.as_ref().ok_or_else(|| {
            Error::TransactionNotActive(format!("transaction {} has no snapshot", self.txn_id))
        })?;

        match snapshot.get(key)? {
            Some(vv) => {
                self.read_set.insert(key.to_vec(), vv.version);
                Ok(Some(vv.value))
            }
            None => {
                // Absent reads are tracked too: a concurrent create must conflict
                self.read_set.insert(key.to_vec(), 0);
                Ok(None)
            }
        }
    }

    /// Check if a key exists in the transaction's view
    pub fn exists(&mut self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Visit rows in `[start, end)` in key order
    ///
    /// Buffered writes are merged in, buffered deletes are hidden, and every
    /// snapshot row visited is tracked in the read set. The visitor returns
    /// `Ok(false)` to stop early; rows past that point are never read.
    pub fn scan_range<F>(&mut self, start: &[u8], end: Option<&[u8]>, mut visit: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<bool>,
    {
        self.ensure_active()?;
        let upper = match end {
            Some(end) if end <= start => return Ok(()),
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };

        let txn_id = self.txn_id;
        let snapshot = self.snapshot.as_ref().ok_or_else(|| {
            Error::TransactionNotActive(format!("transaction {} has no snapshot", txn_id))
        })?;
        let write_set = &self.write_set;
        let delete_set = &self.delete_set;
        let read_set = &mut self.read_set;

        let mut pending = write_set
            .range::<[u8], _>((Bound::Included(start), upper))
            .peekable();
        let mut outcome: Result<bool> = Ok(true);

        snapshot.scan_range(start, end, &mut |key, vv| {
            while let Some((wkey, wvalue)) = pending.peek() {
                if wkey.as_slice() >= key {
                    break;
                }
                match visit(wkey.as_slice(), wvalue.as_slice()) {
                    Ok(true) => {
                        pending.next();
                    }
                    other => {
                        outcome = other;
                        return false;
                    }
                }
            }

            read_set.insert(key.to_vec(), vv.version);
            // Overwritten rows are emitted from the write set instead
            if delete_set.contains(key) || write_set.contains_key(key) {
                return true;
            }
            match visit(key, &vv.value) {
                Ok(true) => true,
                other => {
                    outcome = other;
                    false
                }
            }
        })?;

        if !outcome? {
            return Ok(());
        }
        for (wkey, wvalue) in pending {
            if !visit(wkey.as_slice(), wvalue.as_slice())? {
                break;
            }
        }
        Ok(())
    }

    /// Get the version that was read for a key (from read_set)
    pub fn get_read_version(&self, key: &[u8]) -> Option<u64> {
        self.read_set.get(key).copied()
    }

    /// All snapshot reads recorded so far
    pub fn read_set(&self) -> &HashMap<Vec<u8>, u64> {
        &self.read_set
    }

    // === Write Operations ===

    /// Buffer a write operation
    ///
    /// Writes are "blind": no read_set entry unless the key was read first.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.ensure_active()?;
        self.delete_set.remove(&key);
        self.write_set.insert(key, value);
        Ok(())
    }

    /// Buffer a delete operation
    pub fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        self.ensure_active()?;
        self.write_set.remove(&key);
        self.delete_set.insert(key);
        Ok(())
    }

    // === State Management ===

    /// Check if transaction is active
    pub fn is_active(&self) -> bool {
        matches!(self.status, TransactionStatus::Active)
    }

    /// Check if transaction is committed
    pub fn is_committed(&self) -> bool {
        matches!(self.status, TransactionStatus::Committed)
    }

    /// Check if transaction is aborted
    pub fn is_aborted(&self) -> bool {
        matches!(self.status, TransactionStatus::Aborted { .. })
    }

    /// Time since the transaction began
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Check if the transaction has run longer than `timeout`
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.elapsed() > timeout
    }

    /// Check if transaction can accept operations
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::TransactionNotActive(format!(
                "transaction {} is {:?}",
                self.txn_id, self.status
            )))
        }
    }

    /// Abort the transaction, discarding buffered operations
    pub fn mark_aborted(&mut self, reason: String) -> Result<()> {
        match &self.status {
            TransactionStatus::Committed => Err(Error::TransactionNotActive(format!(
                "cannot abort committed transaction {}",
                self.txn_id
            ))),
            TransactionStatus::Aborted { .. } => Err(Error::TransactionNotActive(format!(
                "transaction {} already aborted",
                self.txn_id
            ))),
            _ => {
                self.status = TransactionStatus::Aborted { reason };
                self.write_set.clear();
                self.delete_set.clear();
                Ok(())
            }
        }
    }

    /// Get summary of pending operations
    pub fn pending_operations(&self) -> PendingOperations {
        PendingOperations {
            puts: self.write_set.len(),
            deletes: self.delete_set.len(),
        }
    }

    // === Commit Operation ===

    /// Validate the transaction against current storage
    ///
    /// Transitions `Active → Validating → Committed`, or to `Aborted` when the
    /// read set no longer matches storage. Does not apply writes.
    pub fn commit<S: Storage + ?Sized>(&mut self, store: &S) -> std::result::Result<(), CommitError> {
        if !self.is_active() {
            return Err(CommitError::InvalidState(format!(
                "cannot commit transaction {} from {:?} state",
                self.txn_id, self.status
            )));
        }
        self.status = TransactionStatus::Validating;

        let validation = validate_transaction(self, store)
            .map_err(|e| CommitError::StorageError(e.to_string()))?;
        if !validation.is_valid() {
            self.status = TransactionStatus::Aborted {
                reason: format!(
                    "commit failed: {} conflict(s) detected",
                    validation.conflict_count()
                ),
            };
            return Err(CommitError::ValidationFailed(validation));
        }

        self.status = TransactionStatus::Committed;
        Ok(())
    }

    /// Apply all buffered writes to storage at `commit_version`
    pub fn apply_writes<S: Storage + ?Sized>(
        &mut self,
        store: &S,
        commit_version: u64,
    ) -> Result<ApplyResult> {
        if !self.is_committed() {
            return Err(Error::TransactionNotActive(format!(
                "cannot apply writes: transaction {} is {:?}",
                self.txn_id, self.status
            )));
        }
        let writes: Vec<_> = std::mem::take(&mut self.write_set).into_iter().collect();
        let deletes: Vec<_> = std::mem::take(&mut self.delete_set).into_iter().collect();
        let result = ApplyResult {
            commit_version,
            puts_applied: writes.len(),
            deletes_applied: deletes.len(),
        };
        store.apply_batch(writes, deletes, commit_version)?;
        Ok(result)
    }

    // === Introspection ===

    /// Number of keys read from the snapshot
    pub fn read_count(&self) -> usize {
        self.read_set.len()
    }

    /// Number of buffered writes
    pub fn write_count(&self) -> usize {
        self.write_set.len()
    }

    /// Number of buffered deletes
    pub fn delete_count(&self) -> usize {
        self.delete_set.len()
    }

    /// True if nothing has been written or deleted
    pub fn is_read_only(&self) -> bool {
        self.write_set.is_empty() && self.delete_set.is_empty()
    }

    /// Reason for abort, if aborted
    pub fn abort_reason(&self) -> Option<&str> {
        match &self.status {
            TransactionStatus::Aborted { reason } => Some(reason),
            _ => None,
        }
    }
}

impl std::fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("txn_id", &self.txn_id)
            .field("start_version", &self.start_version)
            .field("status", &self.status)
            .field("reads", &self.read_set.len())
            .field("writes", &self.write_set.len())
            .field("deletes", &self.delete_set.len())
            .finish()
    }
}
