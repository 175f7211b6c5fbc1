//! Run record types
//!
//! ## Design
//!
//! - `RunStatus`: lifecycle status of one run (Running, Suspended, Completed, Killed, Failed)
//! - `RunStatusFilter`: status selector for listing queries (adds `All`)
//! - `RunRecord`: typed record handed to callers
//! - `StoredRunRecord`: the persisted JSON shape
//!
//! The persisted shape keeps run arguments, the parent workflow link, the
//! workflow token and workflow node links in one flat `properties` map. In
//! memory they are separate typed fields; conversion happens only at the
//! storage boundary.

use crate::error::{Error, Result};
use crate::partition::Partition;
use crate::types::{ProgramId, RunId};
use crate::workflow::WorkflowToken;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Property holding JSON-encoded runtime arguments
pub const RUNTIME_ARGS_KEY: &str = "runtimeArgs";
/// Property holding the parent workflow's run id
pub const WORKFLOW_RUN_ID_KEY: &str = "workflowrunid";
/// Property holding the JSON-encoded workflow token
pub const WORKFLOW_TOKEN_KEY: &str = "workflowToken";

/// Lifecycle status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    /// Executing
    Running,
    /// Paused; may be resumed
    Suspended,
    /// Finished successfully
    Completed,
    /// Stopped by a user
    Killed,
    /// Finished with an error
    Failed,
}

impl RunStatus {
    /// True for statuses that end a run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Killed | RunStatus::Failed
        )
    }

    /// Partition a record with this status lives in
    pub fn partition(&self) -> Partition {
        match self {
            RunStatus::Running => Partition::Started,
            RunStatus::Suspended => Partition::Suspended,
            RunStatus::Completed | RunStatus::Killed | RunStatus::Failed => Partition::Completed,
        }
    }

    /// Persisted name
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Suspended => "SUSPENDED",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Killed => "KILLED",
            RunStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status selector for run listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatusFilter {
    /// Every status
    All,
    /// Only runs with this status
    Only(RunStatus),
}

impl RunStatusFilter {
    /// True if `status` passes the filter
    pub fn matches(&self, status: RunStatus) -> bool {
        match self {
            RunStatusFilter::All => true,
            RunStatusFilter::Only(s) => *s == status,
        }
    }
}

impl From<RunStatus> for RunStatusFilter {
    fn from(status: RunStatus) -> Self {
        RunStatusFilter::Only(status)
    }
}

impl FromStr for RunStatusFilter {
    type Err = Error;

    /// Parse a filter name, ignoring case
    fn from_str(s: &str) -> Result<Self> {
        let filter = match s.to_ascii_uppercase().as_str() {
            "ALL" => RunStatusFilter::All,
            "RUNNING" => RunStatus::Running.into(),
            "SUSPENDED" => RunStatus::Suspended.into(),
            "COMPLETED" => RunStatus::Completed.into(),
            "KILLED" => RunStatus::Killed.into(),
            "FAILED" => RunStatus::Failed.into(),
            _ => {
                return Err(Error::invalid_input(format!(
                    "Supported options for status of runs are running/completed/failed/killed/suspended/all, got '{}'",
                    s
                )))
            }
        };
        Ok(filter)
    }
}

/// Persisted shape of a run record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRunRecord {
    /// Run id
    pub pid: String,
    /// Start time, seconds
    pub start_ts: i64,
    /// Stop time, seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_ts: Option<i64>,
    /// Status name
    pub status: RunStatus,
    /// Flat auxiliary properties
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Cluster-level application id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twill_run_id: Option<String>,
}

impl StoredRunRecord {
    /// Convert into a typed record owned by `program`
    pub fn into_run_record(self, program: ProgramId) -> Result<RunRecord> {
        let mut runtime_args = BTreeMap::new();
        let mut parent_workflow_run = None;
        let mut workflow_token = None;
        let mut workflow_nodes = BTreeMap::new();

        for (key, value) in self.properties {
            match key.as_str() {
                RUNTIME_ARGS_KEY => runtime_args = serde_json::from_str(&value)?,
                WORKFLOW_RUN_ID_KEY => parent_workflow_run = Some(RunId::new(value)),
                WORKFLOW_TOKEN_KEY => workflow_token = Some(serde_json::from_str(&value)?),
                _ => {
                    workflow_nodes.insert(key, RunId::new(value));
                }
            }
        }

        Ok(RunRecord {
            program,
            run_id: RunId::new(self.pid),
            start_ts: self.start_ts,
            stop_ts: self.stop_ts,
            status: self.status,
            twill_run_id: self.twill_run_id,
            runtime_args,
            parent_workflow_run,
            workflow_nodes,
            workflow_token,
        })
    }
}

/// One execution of a program
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    /// Program this run belongs to
    pub program: ProgramId,
    /// Run id
    pub run_id: RunId,
    /// Start time, seconds since epoch
    pub start_ts: i64,
    /// Stop time, present once the run is terminal
    pub stop_ts: Option<i64>,
    /// Current status
    pub status: RunStatus,
    /// Cluster-level application id
    pub twill_run_id: Option<String>,
    /// Arguments the run was started with
    pub runtime_args: BTreeMap<String, String>,
    /// Run of the workflow that launched this run
    pub parent_workflow_run: Option<RunId>,
    /// Child runs launched by this workflow run, keyed by node id
    pub workflow_nodes: BTreeMap<String, RunId>,
    /// Token shared by the nodes of this workflow run
    pub workflow_token: Option<WorkflowToken>,
}

impl RunRecord {
    /// A freshly started run
    pub fn started(
        program: ProgramId,
        run_id: RunId,
        start_ts: i64,
        twill_run_id: Option<String>,
        runtime_args: BTreeMap<String, String>,
    ) -> Self {
        Self {
            program,
            run_id,
            start_ts,
            stop_ts: None,
            status: RunStatus::Running,
            twill_run_id,
            runtime_args,
            parent_workflow_run: None,
            workflow_nodes: BTreeMap::new(),
            workflow_token: None,
        }
    }

    /// Same record with a different status
    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.status = status;
        self
    }

    /// True if the run was active at any point of `[start, end)`
    pub fn overlaps(&self, start: i64, end: i64) -> bool {
        self.start_ts < end && self.stop_ts.map_or(true, |stop| stop >= start)
    }

    /// Convert into the persisted shape
    pub fn to_stored(&self) -> Result<StoredRunRecord> {
        let mut properties: BTreeMap<String, String> = self
            .workflow_nodes
            .iter()
            .map(|(node, run)| (node.clone(), run.as_str().to_string()))
            .collect();
        properties.insert(
            RUNTIME_ARGS_KEY.to_string(),
            serde_json::to_string(&self.runtime_args)?,
        );
        if let Some(parent) = &self.parent_workflow_run {
            properties.insert(WORKFLOW_RUN_ID_KEY.to_string(), parent.as_str().to_string());
        }
        if let Some(token) = &self.workflow_token {
            properties.insert(WORKFLOW_TOKEN_KEY.to_string(), serde_json::to_string(token)?);
        }
        Ok(StoredRunRecord {
            pid: self.run_id.as_str().to_string(),
            start_ts: self.start_ts,
            stop_ts: self.stop_ts,
            status: self.status,
            properties,
            twill_run_id: self.twill_run_id.clone(),
        })
    }

    /// Serialize to a stored value
    pub fn to_value(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_stored()?)?)
    }

    /// Deserialize from a stored value
    pub fn from_value(program: ProgramId, bytes: &[u8]) -> Result<Self> {
        let stored: StoredRunRecord = serde_json::from_slice(bytes)?;
        stored.into_run_record(program)
    }
}
