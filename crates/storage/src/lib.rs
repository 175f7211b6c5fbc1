//! Storage layer for runstore
//!
//! This crate implements the ordered storage backend with:
//! - OrderedStore: BTreeMap of version chains behind a RwLock
//! - Version management with AtomicU64
//! - OrderedSnapshot: lazy, version-bounded snapshot views
//! - Versioned tombstones for deletes

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ordered;
pub mod snapshot;
pub mod stored_value;

pub use ordered::{OrderedStore, VersionChain};
pub use snapshot::OrderedSnapshot;
pub use stored_value::StoredValue;
