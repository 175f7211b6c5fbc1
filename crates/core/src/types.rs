//! Identity types for programs and runs
//!
//! - `ProgramType`: kind of program (flow, workflow, service, ...)
//! - `ProgramId`: namespace + application + type + program name
//! - `RunId`: opaque run identifier, optionally carrying its creation time

use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::{NoContext, Timestamp, Uuid};

/// Kind of program a run belongs to
///
/// The upper-case name is part of every persisted run key, so variants
/// must never be renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProgramType {
    /// Real-time flow
    Flow,
    /// MapReduce job
    Mapreduce,
    /// Spark job
    Spark,
    /// Workflow of other programs
    Workflow,
    /// Long-running service
    Service,
    /// Worker
    Worker,
    /// Web application
    Webapp,
}

impl ProgramType {
    /// All program types, in declaration order
    pub const ALL: [ProgramType; 7] = [
        ProgramType::Flow,
        ProgramType::Mapreduce,
        ProgramType::Spark,
        ProgramType::Workflow,
        ProgramType::Service,
        ProgramType::Worker,
        ProgramType::Webapp,
    ];

    /// Persisted name
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramType::Flow => "FLOW",
            ProgramType::Mapreduce => "MAPREDUCE",
            ProgramType::Spark => "SPARK",
            ProgramType::Workflow => "WORKFLOW",
            ProgramType::Service => "SERVICE",
            ProgramType::Worker => "WORKER",
            ProgramType::Webapp => "WEBAPP",
        }
    }
}

impl fmt::Display for ProgramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgramType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ProgramType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::invalid_input(format!("unknown program type '{}'", s)))
    }
}

/// Fully qualified program identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProgramId {
    /// Namespace (tenant)
    pub namespace: String,
    /// Application within the namespace
    pub application: String,
    /// Program kind
    pub program_type: ProgramType,
    /// Program name within the application
    pub program: String,
}

impl ProgramId {
    /// Create a new program identity
    pub fn new(
        namespace: impl Into<String>,
        application: impl Into<String>,
        program_type: ProgramType,
        program: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            application: application.into(),
            program_type,
            program: program.into(),
        }
    }

    /// Shorthand for a workflow program
    pub fn workflow(
        namespace: impl Into<String>,
        application: impl Into<String>,
        program: impl Into<String>,
    ) -> Self {
        Self::new(namespace, application, ProgramType::Workflow, program)
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.namespace, self.application, self.program_type, self.program
        )
    }
}

/// Run identifier
///
/// Any string is a valid run id. Ids created by [`RunId::generate`] or
/// [`RunId::from_time`] are time-based UUIDs whose creation time can be
/// recovered with [`RunId::start_time_secs`]; older ids may be opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Wrap an existing run id string
    pub fn new(id: impl Into<String>) -> Self {
        RunId(id.into())
    }

    /// Generate a time-based run id for the current instant
    pub fn generate() -> Self {
        let now = Utc::now();
        let secs = now.timestamp().max(0) as u64;
        let ts = Timestamp::from_unix(NoContext, secs, now.timestamp_subsec_nanos());
        RunId(Uuid::new_v7(ts).to_string())
    }

    /// Generate a time-based run id whose embedded time is `secs`
    ///
    /// Negative times are clamped to the epoch.
    pub fn from_time(secs: i64) -> Self {
        let ts = Timestamp::from_unix(NoContext, secs.max(0) as u64, 0);
        RunId(Uuid::new_v7(ts).to_string())
    }

    /// Creation time embedded in the id, in seconds
    ///
    /// `None` for opaque ids (non-UUIDs, or UUIDs without a timestamp such as v4).
    pub fn start_time_secs(&self) -> Option<i64> {
        let uuid = Uuid::parse_str(&self.0).ok()?;
        let (secs, _) = uuid.get_timestamp()?.to_unix();
        i64::try_from(secs).ok()
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        RunId(s.to_string())
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        RunId(s)
    }
}
