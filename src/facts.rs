//! Node identity and discovered facts
//!
//! A node is a managed machine: an identity plus an immutable snapshot of
//! facts describing its runtime environment. Everything here is rebuilt
//! fresh for every compilation run; nothing persists between runs.

use anyhow::Result;
use catalog::AttrValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable key-value snapshot of a node's runtime attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Facts(BTreeMap<String, AttrValue>);

impl Facts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a fact by name
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.0.get(name)
    }

    /// Get a fact as an integer
    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(AttrValue::as_int)
    }

    /// Iterate facts in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttrValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, AttrValue)> for Facts {
    fn from_iter<I: IntoIterator<Item = (String, AttrValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, AttrValue>> for Facts {
    fn from(map: BTreeMap<String, AttrValue>) -> Self {
        Self(map)
    }
}

/// A managed machine instance
///
/// `group` and `stage` position the node in the lookup data hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node identity (hostname-like)
    pub name: String,
    /// Group the node belongs to (e.g. "ci", "web")
    pub group: String,
    /// Deployment stage (e.g. "prod", "dev")
    pub stage: String,
    /// Fact snapshot, immutable for the run
    pub facts: Facts,
}

/// Read-only source of fact snapshots, consumed before evaluation begins
pub trait FactSource {
    /// Produce the fact snapshot for a node
    fn facts(&self, node_name: &str) -> Result<Facts>;
}

/// Fact source backed by a fixed per-node map
#[derive(Debug, Default)]
pub struct StaticFacts(BTreeMap<String, Facts>);

impl StaticFacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, name: impl Into<String>, facts: Facts) -> Self {
        self.0.insert(name.into(), facts);
        self
    }
}

impl FactSource for StaticFacts {
    fn facts(&self, node_name: &str) -> Result<Facts> {
        Ok(self.0.get(node_name).cloned().unwrap_or_default())
    }
}

/// JVM heap size for a machine with `total_mb` megabytes of memory
///
/// Leaves 4 GB for the rest of the system on large machines and takes
/// half the memory on everything else. The canonical example of a value
/// that is computed from a fact rather than looked up: 16384 MB yields
/// 12288 MB, 8192 MB falls in the 50% branch and yields 4096 MB.
pub fn jvm_heap_mb(total_mb: i64) -> i64 {
    if total_mb > 8192 {
        total_mb - 4096
    } else {
        (total_mb as f64 * 0.5).round() as i64
    }
}
