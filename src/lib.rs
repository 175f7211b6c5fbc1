//! runstore - transactional store for program run records
//!
//! Tracks every execution of every program: lifecycle state, start and stop
//! times, suspend/resume transitions and links between workflow runs and the
//! program runs they launch.
//!
//! # Quick Start
//!
//! ```ignore
//! use runstore::{Database, ProgramId, ProgramType, RunId, RunRecordStore, RunStatus};
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! let db = Arc::new(Database::new());
//! let runs = RunRecordStore::new(db);
//!
//! let program = ProgramId::new("default", "purchases", ProgramType::Mapreduce, "counter");
//! let run_id = RunId::generate();
//! runs.record_program_start(&program, &run_id, 100, None, BTreeMap::new())?;
//! runs.record_program_stop(&program, &run_id, 200, RunStatus::Completed)?;
//!
//! let record = runs.get_run(&program, &run_id)?.unwrap();
//! assert_eq!(record.stop_ts, Some(200));
//! ```
//!
//! # Architecture
//!
//! - `runstore-core`: types, key codec, partitions, errors
//! - `runstore-storage`: ordered MVCC store
//! - `runstore-concurrency`: optimistic transactions
//! - `runstore-engine`: `Database`, configuration, retries
//! - `runstore-primitives`: `RunRecordStore` and the time-bounded range scanner

pub use runstore_core::{
    Error, NodeValue, Partition, ProgramId, ProgramType, Result, RunId, RunRecord, RunStatus,
    RunStatusFilter, Scope, WorkflowToken,
};
pub use runstore_engine::{
    Database, RetryConfig, StoreConfig, TransactionMetrics, CONFIG_FILE_NAME,
};
pub use runstore_primitives::{
    ManualTicker, RunRecordExt, RunRecordStore, RunningInRangeScan, SystemTicker, Ticker,
};
