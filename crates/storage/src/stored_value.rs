//! Storage-layer value wrapper with tombstone support
//!
//! The contract type `VersionedValue` only describes live values. Deletes
//! must stay visible to newer snapshots while older snapshots keep reading
//! the previous value, so the storage layer records them as versioned
//! tombstones.

use runstore_core::VersionedValue;

/// One entry of a key's version chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    /// Value bytes, `None` for a tombstone
    value: Option<Vec<u8>>,
    /// Commit version
    version: u64,
}

impl StoredValue {
    /// A live value written at `version`
    pub fn new(value: Vec<u8>, version: u64) -> Self {
        StoredValue {
            value: Some(value),
            version,
        }
    }

    /// A delete marker written at `version`
    pub fn tombstone(version: u64) -> Self {
        StoredValue {
            value: None,
            version,
        }
    }

    /// Commit version
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// True for delete markers
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    /// Live value as a `VersionedValue`, `None` for tombstones
    pub fn to_versioned(&self) -> Option<VersionedValue> {
        self.value
            .as_ref()
            .map(|v| VersionedValue::new(v.clone(), self.version))
    }
}
