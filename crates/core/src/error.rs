//! Error types for the run-record store
//!
//! This module defines all error types used throughout the workspace.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use thiserror::Error;

/// Result type alias for runstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the run-record store
#[derive(Debug, Error)]
pub enum Error {
    /// The record required by a lifecycle transition does not exist
    ///
    /// Raised when stopping, suspending or resuming a run (or linking a
    /// workflow node) finds no record in the expected partition. Callers
    /// treat this as fatal; the store never retries it.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A run targeted by an update does not exist in any mutable partition
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied an unusable argument (filter string, timestamp, config value)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A stored key could not be decoded
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Transaction lost an optimistic concurrency race
    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),

    /// Transaction ran past the configured transaction timeout
    #[error("Transaction timed out: {0}")]
    TransactionTimeout(String),

    /// Operation attempted on a transaction that is no longer active
    #[error("Transaction not active: {0}")]
    TransactionNotActive(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration file could not be read, parsed or written
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Build an `InvalidInput` error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Build an `InvalidState` error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Build a `NotFound` error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// True if the error is an OCC conflict that may succeed on retry
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::TransactionConflict(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
