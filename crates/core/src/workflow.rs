//! Workflow token
//!
//! A workflow token is the key/value scratchpad a workflow run's nodes use to
//! pass results to each other. Every value remembers which node wrote it.
//! The token is stored inside the workflow's own run record.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default size cap for new tokens
pub const DEFAULT_MAX_TOKEN_BYTES: usize = 30 * 1024;

/// Who wrote a token entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scope {
    /// Values put by user code
    User,
    /// Values recorded by the platform (counters, node outputs)
    System,
}

/// A value together with the node that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeValue {
    /// Node name
    pub node: String,
    /// Value
    pub value: String,
}

/// Scoped key/value history shared between the nodes of one workflow run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowToken {
    max_size_bytes: usize,
    size_bytes: usize,
    values: BTreeMap<Scope, BTreeMap<String, Vec<NodeValue>>>,
}

impl WorkflowToken {
    /// Token with the given size cap
    pub fn new(max_size_bytes: usize) -> Self {
        Self {
            max_size_bytes,
            size_bytes: 0,
            values: BTreeMap::new(),
        }
    }

    /// Token reported for runs that never stored one
    ///
    /// Has a zero size cap, so it cannot be written to.
    pub fn empty() -> Self {
        Self::new(0)
    }

    /// Record `value` for `key`, attributed to `node`
    pub fn put(
        &mut self,
        scope: Scope,
        node: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        let key = key.into();
        let value = value.into();
        let added = key.len() + value.len();
        if self.size_bytes + added > self.max_size_bytes {
            return Err(Error::invalid_input(format!(
                "workflow token exceeds {} bytes",
                self.max_size_bytes
            )));
        }
        self.size_bytes += added;
        self.values
            .entry(scope)
            .or_default()
            .entry(key)
            .or_default()
            .push(NodeValue {
                node: node.into(),
                value,
            });
        Ok(())
    }

    /// Most recent value for `key`
    pub fn get(&self, scope: Scope, key: &str) -> Option<&str> {
        self.get_all(scope, key).last().map(|nv| nv.value.as_str())
    }

    /// Value for `key` as written by `node`
    pub fn get_from_node(&self, scope: Scope, key: &str, node: &str) -> Option<&str> {
        self.get_all(scope, key)
            .iter()
            .rev()
            .find(|nv| nv.node == node)
            .map(|nv| nv.value.as_str())
    }

    /// Full history for `key`, oldest first
    pub fn get_all(&self, scope: Scope, key: &str) -> &[NodeValue] {
        self.values
            .get(&scope)
            .and_then(|m| m.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Latest value of every key written by `node`
    pub fn values_for_node(&self, scope: Scope, node: &str) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        if let Some(keys) = self.values.get(&scope) {
            for (key, history) in keys {
                if let Some(nv) = history.iter().rev().find(|nv| nv.node == node) {
                    out.insert(key.clone(), nv.value.clone());
                }
            }
        }
        out
    }

    /// True if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.values.values().all(BTreeMap::is_empty)
    }

    /// Bytes consumed by keys and values
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Size cap
    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }
}

impl Default for WorkflowToken {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKEN_BYTES)
    }
}
