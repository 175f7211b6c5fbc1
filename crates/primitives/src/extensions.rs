//! Transaction extension traits
//!
//! Extension traits let run-record operations take part in a transaction the
//! caller controls. The trait is implemented for `TransactionContext` in
//! `run_records.rs`; the `RunRecordStore` facade delegates to the same
//! implementation, so both paths share one source of truth.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use runstore_primitives::extensions::*;
//!
//! db.transaction(|txn| {
//!     txn.record_program_stop(&program, &run_id, stop_ts, RunStatus::Completed)?;
//!     txn.record_program_start(&next, &next_run, stop_ts, None, BTreeMap::new())?;
//!     Ok(())
//! })?;
//! ```

use std::collections::BTreeMap;

use runstore_core::{ProgramId, Result, RunId, RunRecord, RunStatus, RunStatusFilter, WorkflowToken};

/// Row predicate applied while listing runs
pub type RunPredicate<'a> = &'a dyn Fn(&RunRecord) -> bool;

/// Run-record operations within a transaction
///
/// None of these begin or commit transactions.
pub trait RunRecordExt {
    /// Record a new run in the Started partition with status `Running`
    ///
    /// An existing Started record with the same run id is overwritten.
    fn record_program_start(
        &mut self,
        program: &ProgramId,
        run_id: &RunId,
        start_ts: i64,
        twill_run_id: Option<&str>,
        runtime_args: BTreeMap<String, String>,
    ) -> Result<()>;

    /// Move a run from Started to Suspended
    fn record_program_suspend(&mut self, program: &ProgramId, run_id: &RunId) -> Result<()>;

    /// Move a run from Suspended back to Started
    fn record_program_resumed(&mut self, program: &ProgramId, run_id: &RunId) -> Result<()>;

    /// Move a run from Started to Completed with a terminal status
    fn record_program_stop(
        &mut self,
        program: &ProgramId,
        run_id: &RunId,
        stop_ts: i64,
        status: RunStatus,
    ) -> Result<()>;

    /// Look a run up in whichever partition holds it
    fn get_run(&mut self, program: &ProgramId, run_id: &RunId) -> Result<Option<RunRecord>>;

    /// List runs started in `[start, end)`, at most `limit` per partition
    fn get_runs(
        &mut self,
        program: Option<&ProgramId>,
        filter: RunStatusFilter,
        start: i64,
        end: i64,
        limit: usize,
    ) -> Result<Vec<RunRecord>>;

    /// Like [`RunRecordExt::get_runs`], keeping only rows accepted by `predicate`
    fn get_runs_filtered(
        &mut self,
        program: Option<&ProgramId>,
        filter: RunStatusFilter,
        start: i64,
        end: i64,
        limit: usize,
        predicate: RunPredicate<'_>,
    ) -> Result<Vec<RunRecord>>;

    /// Every run of every program matching `filter` and `predicate`
    fn get_runs_all_programs(
        &mut self,
        filter: RunStatusFilter,
        predicate: RunPredicate<'_>,
    ) -> Result<Vec<RunRecord>>;

    /// Start a program run as node `node_id` of a running workflow
    ///
    /// Links the child into the workflow's record and the workflow into the
    /// child's record.
    #[allow(clippy::too_many_arguments)]
    fn record_workflow_program_start(
        &mut self,
        program: &ProgramId,
        run_id: &RunId,
        workflow: &ProgramId,
        workflow_run_id: &RunId,
        node_id: &str,
        start_ts: i64,
        twill_run_id: Option<&str>,
    ) -> Result<()>;

    /// Replace the token stored on a running or suspended workflow run
    fn update_workflow_token(
        &mut self,
        workflow: &ProgramId,
        run_id: &RunId,
        token: &WorkflowToken,
    ) -> Result<()>;

    /// Token of a workflow run
    ///
    /// `None` if the run does not exist; an empty token if it never stored one.
    fn get_workflow_token(
        &mut self,
        workflow: &ProgramId,
        run_id: &RunId,
    ) -> Result<Option<WorkflowToken>>;

    /// Delete every run record of an application, or of a whole namespace
    ///
    /// Returns the number of records deleted.
    fn delete_program_history(&mut self, namespace: &str, application: Option<&str>)
        -> Result<usize>;
}
