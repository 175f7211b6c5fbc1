//! Primitives layer for runstore
//!
//! Provides the run-record store as a stateless facade over the Database engine:
//! - **RunRecordStore**: run lifecycle (start, suspend, resume, stop), lookups,
//!   listings, workflow node links and workflow tokens
//! - **RunningInRangeScan**: time-bounded, resumable scans for runs active in a window
//!
//! ## Design Principle: Stateless Facades
//!
//! `RunRecordStore` holds only an `Arc<Database>` reference and delegates all
//! operations to the transactional engine. Multiple instances on the same
//! Database are safe and there is nothing to warm up or invalidate.
//!
//! ## Caller-Controlled Transactions
//!
//! Every operation is also available on `TransactionContext` through
//! [`extensions::RunRecordExt`], so several operations can commit atomically:
//!
//! ```rust,ignore
//! use runstore_primitives::extensions::*;
//!
//! db.transaction(|txn| {
//!     txn.record_program_stop(&program, &run_id, now, RunStatus::Completed)?;
//!     txn.record_program_start(&program, &next_run, now, None, BTreeMap::new())?;
//!     Ok(())
//! })?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod extensions;
pub mod range_scan;
pub mod run_records;

pub use extensions::{RunPredicate, RunRecordExt};
pub use range_scan::{ManualTicker, RunningInRangeScan, SystemTicker, Ticker};
pub use run_records::RunRecordStore;
