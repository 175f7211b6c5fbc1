//! RunRecordStore: lifecycle records for program runs
//!
//! ## Partitions
//!
//! Every run lives in exactly one of three partitions of the keyspace:
//!
//! - Started: `[runRecordStarted, ns, app, TYPE, program, runId]`
//! - Suspended: `[runRecordSuspended, ns, app, TYPE, program, runId]`
//! - Completed: `[runRecordCompleted, ns, app, TYPE, program, MAX - startTs, runId]`
//!
//! Lifecycle transitions delete the source row and write the destination row
//! in the same transaction. Completed rows sort newest-first.
//!
//! ## Failure Semantics
//!
//! A transition whose source row is missing fails with `InvalidState`. It is
//! never retried: a concurrent transition on the same run makes exactly one
//! caller win, and the loser re-runs on a fresh snapshot and fails loudly.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use runstore_concurrency::TransactionContext;
use runstore_core::{
    invert_scan_bound, Error, KeyBuilder, MdsKey, Partition, ProgramId, Result, RunId, RunKey,
    RunRecord, RunStatus, RunStatusFilter, WorkflowToken,
};
use runstore_engine::Database;
use tracing::{debug, error, trace};

use crate::extensions::{RunPredicate, RunRecordExt};
use crate::range_scan::{RunningInRangeScan, SystemTicker, Ticker};

/// Partitions searched by `get_running_in_range`, in order
const RANGE_SCAN_ORDER: [Partition; 3] = [
    Partition::Completed,
    Partition::Suspended,
    Partition::Started,
];

/// Stateless facade over the run-record keyspace
///
/// Each call runs in its own transaction. Mutations retry on conflict using
/// the database's retry policy; reads run once.
///
/// ## Example
///
/// ```rust,ignore
/// let runs = RunRecordStore::new(db.clone());
/// let run_id = RunId::generate();
///
/// runs.record_program_start(&program, &run_id, now, None, BTreeMap::new())?;
/// runs.record_program_stop(&program, &run_id, later, RunStatus::Completed)?;
///
/// let record = runs.get_run(&program, &run_id)?.unwrap();
/// assert_eq!(record.status, RunStatus::Completed);
/// ```
#[derive(Clone)]
pub struct RunRecordStore {
    db: Arc<Database>,
    ticker: Arc<dyn Ticker>,
}

impl RunRecordStore {
    /// Create new RunRecordStore instance
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_ticker(db, Arc::new(SystemTicker::new()))
    }

    /// Create a store whose range scans are timed by `ticker`
    pub fn with_ticker(db: Arc<Database>, ticker: Arc<dyn Ticker>) -> Self {
        Self { db, ticker }
    }

    /// Get the underlying database reference
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    // ========== Lifecycle ==========

    /// Record the start of a run
    pub fn record_program_start(
        &self,
        program: &ProgramId,
        run_id: &RunId,
        start_ts: i64,
        twill_run_id: Option<&str>,
        runtime_args: BTreeMap<String, String>,
    ) -> Result<()> {
        self.db.transaction_with_default_retry(|txn| {
            txn.record_program_start(program, run_id, start_ts, twill_run_id, runtime_args.clone())
        })
    }

    /// Suspend a running run
    pub fn record_program_suspend(&self, program: &ProgramId, run_id: &RunId) -> Result<()> {
        self.db
            .transaction_with_default_retry(|txn| txn.record_program_suspend(program, run_id))
    }

    /// Resume a suspended run
    pub fn record_program_resumed(&self, program: &ProgramId, run_id: &RunId) -> Result<()> {
        self.db
            .transaction_with_default_retry(|txn| txn.record_program_resumed(program, run_id))
    }

    /// Record the end of a run
    pub fn record_program_stop(
        &self,
        program: &ProgramId,
        run_id: &RunId,
        stop_ts: i64,
        status: RunStatus,
    ) -> Result<()> {
        self.db.transaction_with_default_retry(|txn| {
            txn.record_program_stop(program, run_id, stop_ts, status)
        })
    }

    /// Start a program run as a workflow node
    #[allow(clippy::too_many_arguments)]
    pub fn record_workflow_program_start(
        &self,
        program: &ProgramId,
        run_id: &RunId,
        workflow: &ProgramId,
        workflow_run_id: &RunId,
        node_id: &str,
        start_ts: i64,
        twill_run_id: Option<&str>,
    ) -> Result<()> {
        self.db.transaction_with_default_retry(|txn| {
            txn.record_workflow_program_start(
                program,
                run_id,
                workflow,
                workflow_run_id,
                node_id,
                start_ts,
                twill_run_id,
            )
        })
    }

    /// Store a workflow run's token
    pub fn update_workflow_token(
        &self,
        workflow: &ProgramId,
        run_id: &RunId,
        token: &WorkflowToken,
    ) -> Result<()> {
        self.db.transaction_with_default_retry(|txn| {
            txn.update_workflow_token(workflow, run_id, token)
        })
    }

    /// Delete all run history of an application or namespace
    pub fn delete_program_history(&self, namespace: &str, application: Option<&str>) -> Result<usize> {
        let deleted = self.db.transaction_with_default_retry(|txn| {
            txn.delete_program_history(namespace, application)
        })?;
        debug!(
            target: "runstore::runs",
            namespace,
            application = application.unwrap_or("*"),
            deleted,
            "Deleted program history"
        );
        Ok(deleted)
    }

    // ========== Lookups ==========

    /// Find a run in any partition
    pub fn get_run(&self, program: &ProgramId, run_id: &RunId) -> Result<Option<RunRecord>> {
        self.db.transaction(|txn| txn.get_run(program, run_id))
    }

    /// List runs started in `[start, end)`
    pub fn get_runs(
        &self,
        program: Option<&ProgramId>,
        filter: RunStatusFilter,
        start: i64,
        end: i64,
        limit: usize,
    ) -> Result<Vec<RunRecord>> {
        self.db
            .transaction(|txn| txn.get_runs(program, filter, start, end, limit))
    }

    /// List runs started in `[start, end)` that satisfy `predicate`
    pub fn get_runs_filtered(
        &self,
        program: Option<&ProgramId>,
        filter: RunStatusFilter,
        start: i64,
        end: i64,
        limit: usize,
        predicate: RunPredicate<'_>,
    ) -> Result<Vec<RunRecord>> {
        self.db.transaction(|txn| {
            txn.get_runs_filtered(program, filter, start, end, limit, predicate)
        })
    }

    /// List runs of every program
    pub fn get_runs_all_programs(
        &self,
        filter: RunStatusFilter,
        predicate: RunPredicate<'_>,
    ) -> Result<Vec<RunRecord>> {
        self.db
            .transaction(|txn| txn.get_runs_all_programs(filter, predicate))
    }

    /// Token of a workflow run
    pub fn get_workflow_token(
        &self,
        workflow: &ProgramId,
        run_id: &RunId,
    ) -> Result<Option<WorkflowToken>> {
        self.db
            .transaction(|txn| txn.get_workflow_token(workflow, run_id))
    }

    // ========== Range Scans ==========

    /// Runs of any program active at some point of `[start_secs, end_secs)`
    ///
    /// Scans Completed, Suspended and Started in time-bounded batches, each
    /// batch in its own transaction. Not atomic across batches.
    pub fn get_running_in_range(&self, start_secs: i64, end_secs: i64) -> Result<HashSet<RunId>> {
        let mut run_ids = HashSet::new();
        for partition in RANGE_SCAN_ORDER {
            for batch in self.running_in_range_batches(partition, start_secs, end_secs)? {
                run_ids.extend(batch);
            }
        }
        Ok(run_ids)
    }

    /// Per-batch results of the time-bounded scan over one partition
    pub fn running_in_range_batches(
        &self,
        partition: Partition,
        start_secs: i64,
        end_secs: i64,
    ) -> Result<Vec<Vec<RunId>>> {
        let budget = self.db.config().scan_budget();
        trace!(target: "runstore::scan", %partition, ?budget, "Scan budget");

        let mut scan = RunningInRangeScan::new(
            partition,
            start_secs,
            end_secs,
            budget,
            self.ticker.as_ref(),
        );
        let mut batches = Vec::new();
        while let Some(batch) = self.db.transaction(|txn| scan.next_batch(txn))? {
            batches.push(batch);
        }
        Ok(batches)
    }
}

// ========== Helpers ==========

fn no_meta(kind: &str, program: &ProgramId, run_id: &RunId) -> Error {
    let msg = format!(
        "No meta for {} run record for namespace {} app {} program type {} program {} pid {} exists",
        kind,
        program.namespace,
        program.application,
        program.program_type,
        program.program,
        run_id
    );
    error!(target: "runstore::runs", "{}", msg);
    Error::invalid_state(msg)
}

fn check_timestamp(what: &str, ts: i64) -> Result<()> {
    if ts < 0 {
        return Err(Error::invalid_input(format!(
            "{} must be non-negative seconds, got {}",
            what, ts
        )));
    }
    Ok(())
}

/// Read a row keyed without a start time (Started, Suspended)
fn read_unfinished(
    txn: &mut TransactionContext,
    partition: Partition,
    program: &ProgramId,
    run_id: &RunId,
) -> Result<Option<RunRecord>> {
    let key = partition.run_key(program, run_id, 0);
    read_at(txn, &key, program)
}

fn read_at(txn: &mut TransactionContext, key: &MdsKey, program: &ProgramId) -> Result<Option<RunRecord>> {
    match txn.get(key.as_bytes())? {
        Some(bytes) => Ok(Some(RunRecord::from_value(program.clone(), &bytes)?)),
        None => Ok(None),
    }
}

fn write_record(txn: &mut TransactionContext, partition: Partition, record: &RunRecord) -> Result<()> {
    let key = partition.run_key(&record.program, &record.run_id, record.start_ts);
    txn.put(key.into_bytes(), record.to_value()?)
}

fn delete_record(txn: &mut TransactionContext, partition: Partition, record: &RunRecord) -> Result<()> {
    let key = partition.run_key(&record.program, &record.run_id, record.start_ts);
    txn.delete(key.into_bytes())
}

/// Delete a run from `from` and write it to `to` with a new status
fn move_run(
    txn: &mut TransactionContext,
    from: Partition,
    to: Partition,
    program: &ProgramId,
    run_id: &RunId,
    status: RunStatus,
) -> Result<RunRecord> {
    let kind = match from {
        Partition::Started => "started",
        Partition::Suspended => "suspended",
        Partition::Completed => "completed",
    };
    let record = read_unfinished(txn, from, program, run_id)?
        .ok_or_else(|| no_meta(kind, program, run_id))?;
    delete_record(txn, from, &record)?;
    let moved = record.with_status(status);
    write_record(txn, to, &moved)?;
    Ok(moved)
}

/// Decode rows of `[start, end)` in key order, keeping up to `limit` accepted ones
fn collect_records<F>(
    txn: &mut TransactionContext,
    start: &[u8],
    end: Option<&[u8]>,
    limit: usize,
    keep: F,
) -> Result<Vec<RunRecord>>
where
    F: Fn(&RunRecord) -> bool,
{
    let mut out = Vec::new();
    if limit == 0 {
        return Ok(out);
    }
    txn.scan_range(start, end, |key, value| {
        let run_key = RunKey::decode(key)?;
        let record = RunRecord::from_value(run_key.program, value)?;
        if keep(&record) {
            out.push(record);
        }
        Ok(out.len() < limit)
    })?;
    Ok(out)
}

fn in_window(record: &RunRecord, start: i64, end: i64) -> bool {
    record.start_ts >= start && record.start_ts < end
}

/// Started or Suspended runs whose start time is in `[start, end)`
fn scan_unfinished(
    txn: &mut TransactionContext,
    partition: Partition,
    program: Option<&ProgramId>,
    start: i64,
    end: i64,
    limit: usize,
    predicate: RunPredicate<'_>,
) -> Result<Vec<RunRecord>> {
    let prefix = partition.scope_prefix(program);
    let stop = prefix.stop_key();
    collect_records(
        txn,
        prefix.as_bytes(),
        stop.as_ref().map(MdsKey::as_bytes),
        limit,
        |r| in_window(r, start, end) && predicate(r),
    )
}

/// Completed runs whose start time is in `[start, end)`, newest first
///
/// With a program the window becomes a key range over inverted start times;
/// across programs the whole partition is scanned and filtered.
fn scan_completed<F>(
    txn: &mut TransactionContext,
    program: Option<&ProgramId>,
    start: i64,
    end: i64,
    limit: usize,
    keep: F,
) -> Result<Vec<RunRecord>>
where
    F: Fn(&RunRecord) -> bool,
{
    let accept = |r: &RunRecord| in_window(r, start, end) && keep(r);
    let Some(program) = program else {
        let prefix = Partition::Completed.prefix();
        let stop = prefix.stop_key();
        return collect_records(
            txn,
            prefix.as_bytes(),
            stop.as_ref().map(MdsKey::as_bytes),
            limit,
            accept,
        );
    };

    let prefix = Partition::Completed.program_prefix(program);
    // Newest admissible start time sits at the low end of the key range
    let low = match invert_scan_bound(end) {
        Some(inverted) => KeyBuilder::from_key(&prefix).add_i64(inverted).build(),
        None => return Ok(Vec::new()),
    };
    let high = match invert_scan_bound(start) {
        Some(inverted) => Some(KeyBuilder::from_key(&prefix).add_i64(inverted).build()),
        None => prefix.stop_key(),
    };
    collect_records(
        txn,
        low.as_bytes(),
        high.as_ref().map(MdsKey::as_bytes),
        limit,
        accept,
    )
}

/// Completed run located by scanning, for run ids that carry no start time
fn find_completed_by_scan(
    txn: &mut TransactionContext,
    program: &ProgramId,
    run_id: &RunId,
) -> Result<Option<RunRecord>> {
    let prefix = Partition::Completed.program_prefix(program);
    let stop = prefix.stop_key();
    let found = collect_records(
        txn,
        prefix.as_bytes(),
        stop.as_ref().map(MdsKey::as_bytes),
        1,
        |r| &r.run_id == run_id,
    )?;
    Ok(found.into_iter().next())
}

impl RunRecordExt for TransactionContext {
    fn record_program_start(
        &mut self,
        program: &ProgramId,
        run_id: &RunId,
        start_ts: i64,
        twill_run_id: Option<&str>,
        runtime_args: BTreeMap<String, String>,
    ) -> Result<()> {
        check_timestamp("start time", start_ts)?;
        let record = RunRecord::started(
            program.clone(),
            run_id.clone(),
            start_ts,
            twill_run_id.map(str::to_string),
            runtime_args,
        );
        write_record(self, Partition::Started, &record)?;
        debug!(target: "runstore::runs", %program, %run_id, start_ts, "Run started");
        Ok(())
    }

    fn record_program_suspend(&mut self, program: &ProgramId, run_id: &RunId) -> Result<()> {
        move_run(
            self,
            Partition::Started,
            Partition::Suspended,
            program,
            run_id,
            RunStatus::Suspended,
        )?;
        debug!(target: "runstore::runs", %program, %run_id, "Run suspended");
        Ok(())
    }

    fn record_program_resumed(&mut self, program: &ProgramId, run_id: &RunId) -> Result<()> {
        move_run(
            self,
            Partition::Suspended,
            Partition::Started,
            program,
            run_id,
            RunStatus::Running,
        )?;
        debug!(target: "runstore::runs", %program, %run_id, "Run resumed");
        Ok(())
    }

    fn record_program_stop(
        &mut self,
        program: &ProgramId,
        run_id: &RunId,
        stop_ts: i64,
        status: RunStatus,
    ) -> Result<()> {
        if !status.is_terminal() {
            return Err(Error::invalid_input(format!(
                "run {} cannot stop with non-terminal status {}",
                run_id,
                status.as_str()
            )));
        }
        check_timestamp("stop time", stop_ts)?;

        let started = read_unfinished(self, Partition::Started, program, run_id)?
            .ok_or_else(|| no_meta("started", program, run_id))?;
        delete_record(self, Partition::Started, &started)?;

        let mut completed = started.with_status(status);
        completed.stop_ts = Some(stop_ts);
        write_record(self, Partition::Completed, &completed)?;
        debug!(
            target: "runstore::runs",
            %program,
            %run_id,
            stop_ts,
            status = status.as_str(),
            "Run stopped"
        );
        Ok(())
    }

    fn get_run(&mut self, program: &ProgramId, run_id: &RunId) -> Result<Option<RunRecord>> {
        if let Some(record) = read_unfinished(self, Partition::Started, program, run_id)? {
            return Ok(Some(record));
        }

        if let Some(start_ts) = run_id.start_time_secs() {
            let key = Partition::Completed.run_key(program, run_id, start_ts);
            if let Some(record) = read_at(self, &key, program)? {
                return Ok(Some(record));
            }
        }

        if let Some(record) = read_unfinished(self, Partition::Suspended, program, run_id)? {
            return Ok(Some(record));
        }

        // The embedded time is only a hint: the row is keyed by the recorded
        // start time, which callers may have set independently of the id
        find_completed_by_scan(self, program, run_id)
    }

    fn get_runs(
        &mut self,
        program: Option<&ProgramId>,
        filter: RunStatusFilter,
        start: i64,
        end: i64,
        limit: usize,
    ) -> Result<Vec<RunRecord>> {
        self.get_runs_filtered(program, filter, start, end, limit, &|_: &RunRecord| true)
    }

    fn get_runs_filtered(
        &mut self,
        program: Option<&ProgramId>,
        filter: RunStatusFilter,
        start: i64,
        end: i64,
        limit: usize,
        predicate: RunPredicate<'_>,
    ) -> Result<Vec<RunRecord>> {
        match filter {
            RunStatusFilter::All => {
                let mut runs = scan_unfinished(
                    self,
                    Partition::Suspended,
                    program,
                    start,
                    end,
                    limit,
                    predicate,
                )?;
                runs.extend(scan_unfinished(
                    self,
                    Partition::Started,
                    program,
                    start,
                    end,
                    limit,
                    predicate,
                )?);
                runs.extend(scan_completed(self, program, start, end, limit, predicate)?);
                Ok(runs)
            }
            RunStatusFilter::Only(RunStatus::Running) => scan_unfinished(
                self,
                Partition::Started,
                program,
                start,
                end,
                limit,
                predicate,
            ),
            RunStatusFilter::Only(RunStatus::Suspended) => scan_unfinished(
                self,
                Partition::Suspended,
                program,
                start,
                end,
                limit,
                predicate,
            ),
            RunStatusFilter::Only(status) => {
                scan_completed(self, program, start, end, limit, |r| {
                    r.status == status && predicate(r)
                })
            }
        }
    }

    fn get_runs_all_programs(
        &mut self,
        filter: RunStatusFilter,
        predicate: RunPredicate<'_>,
    ) -> Result<Vec<RunRecord>> {
        self.get_runs_filtered(None, filter, 0, i64::MAX, usize::MAX, predicate)
    }

    fn record_workflow_program_start(
        &mut self,
        program: &ProgramId,
        run_id: &RunId,
        workflow: &ProgramId,
        workflow_run_id: &RunId,
        node_id: &str,
        start_ts: i64,
        twill_run_id: Option<&str>,
    ) -> Result<()> {
        check_timestamp("start time", start_ts)?;

        let mut parent = read_unfinished(self, Partition::Started, workflow, workflow_run_id)?
            .ok_or_else(|| {
                let msg = format!(
                    "No meta found for associated Workflow {} run record {}, while recording run for the \
                     namespace {} app {} type {} program {} runid {}",
                    workflow.program,
                    workflow_run_id,
                    program.namespace,
                    program.application,
                    program.program_type,
                    program.program,
                    run_id
                );
                error!(target: "runstore::runs", "{}", msg);
                Error::invalid_state(msg)
            })?;
        parent
            .workflow_nodes
            .insert(node_id.to_string(), run_id.clone());
        write_record(self, Partition::Started, &parent)?;

        let mut child = RunRecord::started(
            program.clone(),
            run_id.clone(),
            start_ts,
            twill_run_id.map(str::to_string),
            BTreeMap::new(),
        );
        child.parent_workflow_run = Some(workflow_run_id.clone());
        write_record(self, Partition::Started, &child)?;
        debug!(
            target: "runstore::runs",
            %program,
            %run_id,
            %workflow_run_id,
            node_id,
            "Workflow node started"
        );
        Ok(())
    }

    fn update_workflow_token(
        &mut self,
        workflow: &ProgramId,
        run_id: &RunId,
        token: &WorkflowToken,
    ) -> Result<()> {
        // A node of a suspended workflow still flushes its token when it finishes
        for partition in [Partition::Started, Partition::Suspended] {
            if let Some(mut record) = read_unfinished(self, partition, workflow, run_id)? {
                record.workflow_token = Some(token.clone());
                return write_record(self, partition, &record);
            }
        }
        Err(Error::not_found(format!(
            "run {} of workflow {}",
            run_id, workflow
        )))
    }

    fn get_workflow_token(
        &mut self,
        workflow: &ProgramId,
        run_id: &RunId,
    ) -> Result<Option<WorkflowToken>> {
        let Some(record) = self.get_run(workflow, run_id)? else {
            return Ok(None);
        };
        Ok(Some(record.workflow_token.unwrap_or_else(|| {
            debug!(target: "runstore::runs", %workflow, %run_id, "No workflow token stored");
            WorkflowToken::empty()
        })))
    }

    fn delete_program_history(
        &mut self,
        namespace: &str,
        application: Option<&str>,
    ) -> Result<usize> {
        let mut deleted = 0;
        for partition in Partition::ALL {
            let prefix = partition.namespace_prefix(namespace, application);
            let stop = prefix.stop_key();
            let mut keys = Vec::new();
            self.scan_range(prefix.as_bytes(), stop.as_ref().map(MdsKey::as_bytes), |key, _| {
                keys.push(key.to_vec());
                Ok(true)
            })?;
            deleted += keys.len();
            for key in keys {
                self.delete(key)?;
            }
        }
        Ok(deleted)
    }
}
