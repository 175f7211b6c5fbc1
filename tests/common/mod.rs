//! Shared test utilities for integration test suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Once};

pub use runstore::{
    Database, Error, ManualTicker, Partition, ProgramId, ProgramType, RunId, RunRecord,
    RunRecordExt, RunRecordStore, RunStatus, RunStatusFilter, RunningInRangeScan, Scope, StoreConfig,
    WorkflowToken,
};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output through the test harness so it shows on failure.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

// ============================================================================
// TestStore - database plus run-record facade
// ============================================================================

/// In-memory database with a run-record store on top.
pub struct TestStore {
    pub db: Arc<Database>,
    pub runs: RunRecordStore,
}

impl TestStore {
    pub fn new() -> Self {
        init_tracing();
        let db = Arc::new(Database::new());
        let runs = RunRecordStore::new(db.clone());
        TestStore { db, runs }
    }

    /// Store whose range scans use a manual ticker.
    pub fn with_ticker(config: StoreConfig, ticker: Arc<ManualTicker>) -> Self {
        init_tracing();
        let db = Arc::new(Database::with_config(config).expect("valid config"));
        let runs = RunRecordStore::with_ticker(db.clone(), ticker);
        TestStore { db, runs }
    }

    pub fn start(&self, program: &ProgramId, run: &RunId, start_ts: i64) {
        self.runs
            .record_program_start(program, run, start_ts, None, BTreeMap::new())
            .expect("start");
    }

    pub fn stop(&self, program: &ProgramId, run: &RunId, stop_ts: i64, status: RunStatus) {
        self.runs
            .record_program_stop(program, run, stop_ts, status)
            .expect("stop");
    }

    /// Partitions holding a row for `run` of `program`.
    pub fn partitions_of(&self, program: &ProgramId, run: &RunId) -> Vec<Partition> {
        let mut found = Vec::new();
        for (partition, filter) in [
            (Partition::Started, RunStatusFilter::Only(RunStatus::Running)),
            (Partition::Suspended, RunStatusFilter::Only(RunStatus::Suspended)),
        ] {
            let hits = self
                .runs
                .get_runs(Some(program), filter, 0, i64::MAX, usize::MAX)
                .expect("list");
            if hits.iter().any(|r| &r.run_id == run) {
                found.push(partition);
            }
        }
        let completed = [RunStatus::Completed, RunStatus::Killed, RunStatus::Failed]
            .into_iter()
            .any(|status| {
                self.runs
                    .get_runs(Some(program), status.into(), 0, i64::MAX, usize::MAX)
                    .expect("list")
                    .iter()
                    .any(|r| &r.run_id == run)
            });
        if completed {
            found.push(Partition::Completed);
        }
        found
    }

    /// Run ids returned by a listing, sorted.
    pub fn ids(&self, program: Option<&ProgramId>, filter: RunStatusFilter) -> Vec<RunId> {
        let mut ids: Vec<RunId> = self
            .runs
            .get_runs(program, filter, 0, i64::MAX, usize::MAX)
            .expect("list")
            .into_iter()
            .map(|r| r.run_id)
            .collect();
        ids.sort();
        ids
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn program(name: &str) -> ProgramId {
    ProgramId::new("default", "purchases", ProgramType::Mapreduce, name)
}

pub fn workflow(name: &str) -> ProgramId {
    ProgramId::workflow("default", "purchases", name)
}
