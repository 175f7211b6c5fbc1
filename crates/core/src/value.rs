//! Versioned values returned by storage reads

/// A stored value together with the commit version that wrote it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    /// Raw value bytes
    pub value: Vec<u8>,
    /// Commit version that produced this value
    pub version: u64,
}

impl VersionedValue {
    /// Create a new versioned value
    pub fn new(value: Vec<u8>, version: u64) -> Self {
        Self { value, version }
    }
}
