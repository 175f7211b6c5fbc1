//! Record-type partitions
//!
//! Run records live in one of three partitions of a single ordered keyspace,
//! distinguished by a leading tag segment:
//!
//! ```text
//! [tag, namespace, application, programType, program, runId]                 Started / Suspended
//! [tag, namespace, application, programType, program, invertedStart, runId]  Completed
//! ```

use crate::error::{Error, Result};
use crate::key::{invert_ts, KeyBuilder, MdsKey};
use crate::types::{ProgramId, RunId};
use std::fmt;

/// Lifecycle partition a run record lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Runs that are currently executing
    Started,
    /// Runs paused by the user
    Suspended,
    /// Runs that reached a terminal status
    Completed,
}

impl Partition {
    /// All partitions
    pub const ALL: [Partition; 3] = [
        Partition::Started,
        Partition::Suspended,
        Partition::Completed,
    ];

    /// Persisted tag
    pub fn tag(&self) -> &'static str {
        match self {
            Partition::Started => "runRecordStarted",
            Partition::Suspended => "runRecordSuspended",
            Partition::Completed => "runRecordCompleted",
        }
    }

    /// Partition for a persisted tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        Partition::ALL.iter().copied().find(|p| p.tag() == tag)
    }

    /// Key prefix covering the whole partition
    pub fn prefix(&self) -> MdsKey {
        KeyBuilder::new().add_str(self.tag()).build()
    }

    /// Key prefix covering a namespace, or one application within it
    pub fn namespace_prefix(&self, namespace: &str, application: Option<&str>) -> MdsKey {
        let builder = KeyBuilder::new().add_str(self.tag()).add_str(namespace);
        match application {
            Some(app) => builder.add_str(app).build(),
            None => builder.build(),
        }
    }

    /// Key prefix covering every run of one program
    pub fn program_prefix(&self, program: &ProgramId) -> MdsKey {
        KeyBuilder::new()
            .add_str(self.tag())
            .add_str(&program.namespace)
            .add_str(&program.application)
            .add_str(program.program_type.as_str())
            .add_str(&program.program)
            .build()
    }

    /// Prefix for `program`, or the whole partition when `program` is `None`
    pub fn scope_prefix(&self, program: Option<&ProgramId>) -> MdsKey {
        match program {
            Some(p) => self.program_prefix(p),
            None => self.prefix(),
        }
    }

    /// Full key of one run
    ///
    /// `start_ts` is only encoded for [`Partition::Completed`].
    pub fn run_key(&self, program: &ProgramId, run_id: &RunId, start_ts: i64) -> MdsKey {
        let builder = KeyBuilder::from_key(&self.program_prefix(program));
        let builder = match self {
            Partition::Completed => builder.add_i64(invert_ts(start_ts)),
            Partition::Started | Partition::Suspended => builder,
        };
        builder.add_str(run_id.as_str()).build()
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A decoded run key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunKey {
    /// Partition the row lives in
    pub partition: Partition,
    /// Owning program
    pub program: ProgramId,
    /// Inverted start time (Completed rows only)
    pub inverted_start: Option<i64>,
    /// Run id
    pub run_id: RunId,
}

impl RunKey {
    /// Decode a stored run key
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let key = MdsKey::from_bytes(bytes.to_vec());
        let mut s = key.split();
        let tag = s.get_string()?;
        let partition = Partition::from_tag(&tag)
            .ok_or_else(|| Error::Corruption(format!("unknown partition tag '{}'", tag)))?;
        let namespace = s.get_string()?;
        let application = s.get_string()?;
        let program_type = s
            .get_string()?
            .parse()
            .map_err(|e| Error::Corruption(format!("bad program type in key: {}", e)))?;
        let program = s.get_string()?;
        let inverted_start = match partition {
            Partition::Completed => Some(s.get_i64()?),
            Partition::Started | Partition::Suspended => None,
        };
        let run_id = RunId::new(s.get_string()?);
        if s.has_remaining() {
            return Err(Error::Corruption("trailing bytes after run key".to_string()));
        }
        Ok(RunKey {
            partition,
            program: ProgramId::new(namespace, application, program_type, program),
            inverted_start,
            run_id,
        })
    }

    /// Start time recovered from the inverted segment
    pub fn start_ts(&self) -> Option<i64> {
        self.inverted_start.map(|inv| i64::MAX - inv)
    }
}
