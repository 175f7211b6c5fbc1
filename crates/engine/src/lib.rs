//! Database engine for the run-record store
//!
//! This crate orchestrates the lower layers:
//! - Database: ordered store, configuration and the transaction API
//! - Transaction coordination and metrics
//! - Conflict retry with exponential backoff
//!
//! Record semantics live one layer up, in `runstore-primitives`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coordinator;
pub mod database;

pub use coordinator::{TransactionCoordinator, TransactionMetrics};
pub use database::{Database, RetryConfig, StoreConfig, CONFIG_FILE_NAME};
