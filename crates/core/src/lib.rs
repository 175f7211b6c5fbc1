//! Core types and traits for runstore
//!
//! This crate defines the foundational types used throughout the system:
//! - ProgramId / RunId: identity of programs and their runs
//! - MdsKey: composite byte keys (key codec)
//! - Partition: record-type partitions of the run keyspace
//! - RunRecord / RunStatus: run lifecycle records
//! - WorkflowToken: state shared between workflow nodes
//! - Error: Error type hierarchy
//! - Traits: Core trait definitions (Storage, SnapshotView)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod key;
pub mod partition;
pub mod run_types;
pub mod traits;
pub mod types;
pub mod value;
pub mod workflow;

pub use error::{Error, Result};
pub use key::{invert_scan_bound, invert_ts, stop_key_for_prefix, KeyBuilder, KeySplitter, MdsKey};
pub use partition::{Partition, RunKey};
pub use run_types::{RunRecord, RunStatus, RunStatusFilter, StoredRunRecord};
pub use traits::{ScanVisitor, SnapshotView, Storage};
pub use types::{ProgramId, ProgramType, RunId};
pub use value::VersionedValue;
pub use workflow::{NodeValue, Scope, WorkflowToken};
