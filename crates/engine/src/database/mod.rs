//! Database struct and transaction API
//!
//! This module provides the main Database struct that orchestrates:
//! - Storage initialization
//! - Configuration
//! - Transaction API
//!
//! ## Transaction API
//!
//! The Database provides two ways to execute transactions:
//!
//! 1. **Closure API** (recommended): `db.transaction(|txn| { ... })`
//!    - Automatic commit on success, abort on error
//!    - Returns the closure's return value
//!
//! 2. **Manual API**: `begin_transaction()` + `commit_transaction()`
//!    - For cases requiring external control over commit timing
//!
//! Transactions that outlive `transaction_timeout_secs` are aborted at commit.
//!
//! Every commit reclaims versions superseded before the oldest running
//! transaction's snapshot, so deleted run rows do not accumulate.

pub mod config;
mod transactions;

pub use config::{StoreConfig, CONFIG_FILE_NAME};
pub use transactions::RetryConfig;

use std::path::Path;
use std::sync::Arc;

use runstore_concurrency::TransactionContext;
use runstore_core::{Error, Result};
use runstore_storage::OrderedStore;
use tracing::{debug, info, warn};

use crate::coordinator::{TransactionCoordinator, TransactionMetrics};

/// Transactional ordered store holding the run keyspace
pub struct Database {
    storage: Arc<OrderedStore>,
    coordinator: TransactionCoordinator,
    config: StoreConfig,
}

impl Database {
    /// Empty database with default configuration
    pub fn new() -> Self {
        Self::build(StoreConfig::default())
    }

    /// Empty database with the given configuration
    pub fn with_config(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Empty database configured from `runstore.toml` in `dir`
    ///
    /// Writes the default config file first if it is missing.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::Config(format!(
                "failed to create directory '{}': {}",
                dir.display(),
                e
            ))
        })?;
        let path = dir.join(CONFIG_FILE_NAME);
        StoreConfig::write_default_if_missing(&path)?;
        let config = StoreConfig::from_file(&path)?;
        info!(target: "runstore::db", path = %path.display(), "Loaded store config");
        Self::with_config(config)
    }

    fn build(config: StoreConfig) -> Self {
        let storage = Arc::new(OrderedStore::new());
        let coordinator = TransactionCoordinator::new(storage.version());
        debug!(
            target: "runstore::db",
            timeout_secs = config.transaction_timeout_secs,
            "Database created"
        );
        Self {
            storage,
            coordinator,
            config,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Underlying store
    pub fn storage(&self) -> &Arc<OrderedStore> {
        &self.storage
    }

    /// Highest committed version
    pub fn current_version(&self) -> u64 {
        self.coordinator.current_version()
    }

    /// Transaction counters
    pub fn metrics(&self) -> TransactionMetrics {
        self.coordinator.metrics()
    }

    /// Prune versions older than `min_version` across the whole store
    ///
    /// `min_version` is capped at the oldest running transaction's snapshot.
    pub fn gc_versions_before(&self, min_version: u64) -> usize {
        let live = self.coordinator.min_live_version(self.storage.version());
        self.storage.gc_versions_before(min_version.min(live))
    }

    /// Reclaim versions superseded before every running transaction's snapshot
    pub fn reclaim(&self) -> usize {
        self.coordinator.reclaim(&self.storage)
    }

    // ========================================================================
    // Transaction API
    // ========================================================================

    /// Execute a transaction with the given closure
    ///
    /// - Creates TransactionContext with snapshot
    /// - Executes closure with transaction
    /// - Validates and commits on success
    /// - Aborts on error
    ///
    /// # Example
    /// ```text
    /// let value = db.transaction(|txn| {
    ///     let val = txn.get(&key)?;
    ///     txn.put(key, new_value)?;
    ///     Ok(val)
    /// })?;
    /// ```
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut TransactionContext) -> Result<T>,
    {
        let mut txn = self.begin_transaction();
        let result = f(&mut txn);
        self.run_single_attempt(&mut txn, result)
    }

    /// Execute a transaction, retrying on conflict
    ///
    /// The closure is re-run from scratch on a fresh snapshot after each
    /// conflict, so it must be `Fn`. Non-conflict errors return immediately.
    pub fn transaction_with_retry<F, T>(&self, config: &RetryConfig, f: F) -> Result<T>
    where
        F: Fn(&mut TransactionContext) -> Result<T>,
    {
        let mut attempt = 0;
        loop {
            let mut txn = self.begin_transaction();
            let result = f(&mut txn);
            match self.run_single_attempt(&mut txn, result) {
                Err(e) if e.is_conflict() && attempt < config.max_retries => {
                    let delay = config.calculate_delay(attempt);
                    debug!(target: "runstore::txn", attempt, ?delay, "Retrying after conflict");
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    /// Execute a transaction using the configured retry policy
    pub fn transaction_with_default_retry<F, T>(&self, f: F) -> Result<T>
    where
        F: Fn(&mut TransactionContext) -> Result<T>,
    {
        self.transaction_with_retry(&self.config.retry, f)
    }

    fn run_single_attempt<T>(&self, txn: &mut TransactionContext, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.commit_transaction(txn)?;
                Ok(value)
            }
            Err(e) => {
                // Fails only if the closure already finished the transaction
                let _ = self.coordinator.abort(txn, format!("Closure error: {}", e));
                Err(e)
            }
        }
    }

    /// Begin a new transaction (for manual control)
    ///
    /// Returns a TransactionContext that must be committed or aborted; until
    /// then its snapshot holds back version reclamation.
    /// Prefer `transaction()` closure API for automatic handling.
    pub fn begin_transaction(&self) -> TransactionContext {
        self.coordinator.start_transaction(&self.storage)
    }

    /// Commit a transaction, returning its commit version
    ///
    /// # Errors
    /// - `TransactionConflict` - read set changed since the snapshot
    /// - `TransactionTimeout` - transaction exceeded the configured timeout
    /// - `TransactionNotActive` - transaction not in Active state
    pub fn commit_transaction(&self, txn: &mut TransactionContext) -> Result<u64> {
        let timeout = self.config.transaction_timeout();
        if txn.is_active() && txn.is_expired(timeout) {
            let msg = format!(
                "transaction {} ran {:?}, limit {:?}",
                txn.txn_id,
                txn.elapsed(),
                timeout
            );
            warn!(target: "runstore::txn", txn_id = txn.txn_id, "Transaction timed out");
            self.coordinator.abort(txn, msg.clone())?;
            return Err(Error::TransactionTimeout(msg));
        }
        let version = self.coordinator.commit(txn, self.storage.as_ref())?;
        self.reclaim();
        Ok(version)
    }

    /// Abort a transaction started with `begin_transaction`
    pub fn abort_transaction(&self, txn: &mut TransactionContext, reason: &str) -> Result<()> {
        self.coordinator.abort(txn, reason.to_string())
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("version", &self.current_version())
            .field("config", &self.config)
            .finish()
    }
}
