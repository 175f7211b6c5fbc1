//! Transaction validation for OCC
//!
//! Rules:
//! - First-committer-wins based on READ-SET, not write-set
//! - Blind writes (write without read) do NOT conflict
//! - Write skew is ALLOWED (do not try to prevent it)
//! - A key read as absent is recorded at version 0; a deleted key also
//!   validates as version 0

use std::collections::HashMap;

use runstore_core::{Result, Storage};

use crate::transaction::TransactionContext;

/// Types of conflicts that can occur during transaction validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictType {
    /// Read-write conflict: key was read at one version but current version differs
    ReadWriteConflict {
        /// The key that has a conflict
        key: Vec<u8>,
        /// Version recorded in read_set when read
        read_version: u64,
        /// Current version in storage at validation time
        current_version: u64,
    },
}

/// Result of validating a transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    /// All conflicts found
    pub conflicts: Vec<ConflictType>,
}

impl ValidationResult {
    /// A passing result
    pub fn ok() -> Self {
        Self::default()
    }

    /// A failing result with one conflict
    pub fn conflict(conflict: ConflictType) -> Self {
        Self {
            conflicts: vec![conflict],
        }
    }

    /// True if no conflicts were found
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Fold another result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.conflicts.extend(other.conflicts);
    }

    /// Number of conflicts
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }
}

/// Check every read-set entry against the latest committed version
pub fn validate_read_set<S: Storage + ?Sized>(
    read_set: &HashMap<Vec<u8>, u64>,
    store: &S,
) -> Result<ValidationResult> {
    let mut result = ValidationResult::ok();
    for (key, read_version) in read_set {
        let current_version = store.get(key)?.map_or(0, |vv| vv.version);
        if current_version != *read_version {
            result.merge(ValidationResult::conflict(ConflictType::ReadWriteConflict {
                key: key.clone(),
                read_version: *read_version,
                current_version,
            }));
        }
    }
    Ok(result)
}

/// Validate a whole transaction
///
/// Read-only transactions always pass: their snapshot was consistent when taken.
pub fn validate_transaction<S: Storage + ?Sized>(
    txn: &TransactionContext,
    store: &S,
) -> Result<ValidationResult> {
    if txn.is_read_only() {
        return Ok(ValidationResult::ok());
    }
    validate_read_set(txn.read_set(), store)
}
