//! Diff computation between desired assertions and observed state

use crate::apply::ReconciliationEngine;
use crate::assertion::{AttrValue, ResourceAssertion};
use crate::catalog::Catalog;
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

/// State of a managed item as observed by a reconciliation engine
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservedState {
    /// The item exists with these attributes
    Present { attributes: BTreeMap<String, AttrValue> },
    /// The item does not exist
    Absent,
    /// The engine cannot determine the state
    Unknown,
}

impl ObservedState {
    /// Check whether this observation already satisfies the desired attributes
    ///
    /// Satisfied means present with every desired attribute set to the
    /// desired value; observed attributes the assertion does not mention
    /// are ignored.
    pub fn satisfies(&self, desired: &BTreeMap<String, AttrValue>) -> bool {
        match self {
            Self::Present { attributes } => desired
                .iter()
                .all(|(k, v)| attributes.get(k) == Some(v)),
            Self::Absent | Self::Unknown => false,
        }
    }
}

/// A diff between one assertion and what the engine observed
#[derive(Debug, Clone, Serialize)]
pub struct AssertionDiff {
    /// Catalog key ("kind/id") of the assertion
    pub key: String,
    /// Desired attributes
    pub desired: BTreeMap<String, AttrValue>,
    /// What the engine observed
    pub observed: ObservedState,
}

impl AssertionDiff {
    /// Create a diff from an assertion, returning None if already satisfied
    pub fn from_assertion(
        engine: &dyn ReconciliationEngine,
        assertion: &ResourceAssertion,
    ) -> Result<Option<Self>> {
        let observed = engine.current(assertion)?;
        if observed.satisfies(&assertion.attributes) {
            return Ok(None);
        }
        Ok(Some(Self {
            key: assertion.key(),
            desired: assertion.attributes.clone(),
            observed,
        }))
    }

    /// Check if this diff represents a creation
    pub fn is_addition(&self) -> bool {
        matches!(self.observed, ObservedState::Absent)
    }

    /// Check if this diff represents an attribute change on an existing item
    pub fn is_modification(&self) -> bool {
        matches!(self.observed, ObservedState::Present { .. })
    }
}

/// Compute diffs for a whole catalog
///
/// Returns only assertions the engine does not already consider satisfied,
/// in catalog order.
pub fn compute_diffs(
    engine: &dyn ReconciliationEngine,
    catalog: &Catalog,
) -> Result<Vec<AssertionDiff>> {
    let mut diffs = Vec::new();
    for assertion in catalog {
        if let Some(diff) = AssertionDiff::from_assertion(engine, assertion)? {
            diffs.push(diff);
        }
    }
    Ok(diffs)
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffSummary {
    /// Items to create
    pub additions: usize,
    /// Items to modify
    pub modifications: usize,
    /// Items whose state could not be determined
    pub unknown: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[AssertionDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            if diff.is_addition() {
                summary.additions += 1;
            } else if diff.is_modification() {
                summary.modifications += 1;
            } else {
                summary.unknown += 1;
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.modifications + self.unknown
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by the kind prefix of their key
pub fn group_by_kind(diffs: &[AssertionDiff]) -> BTreeMap<String, Vec<&AssertionDiff>> {
    let mut groups: BTreeMap<String, Vec<&AssertionDiff>> = BTreeMap::new();
    for diff in diffs {
        let kind = diff.key.split('/').next().unwrap_or("").to_string();
        groups.entry(kind).or_default().push(diff);
    }
    groups
}
