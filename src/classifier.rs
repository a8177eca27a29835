//! Node classification - map a node to exactly one role
//!
//! Rules are checked in declaration order; the first rule whose pattern
//! and fact constraints both match wins. Classification is deterministic
//! for a given fact snapshot and has no side effects.

use crate::error::EvalError;
use crate::facts::Node;
use catalog::AttrValue;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One classifier rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Regex matched against the node name; absent means match any name
    #[serde(default)]
    pub pattern: Option<String>,
    /// Fact equalities that must all hold
    #[serde(default)]
    pub facts: BTreeMap<String, AttrValue>,
    /// Role assigned when the rule matches
    pub role: String,
}

impl Rule {
    fn matches(&self, node: &Node) -> Result<bool, EvalError> {
        if let Some(pattern) = &self.pattern {
            let re = Regex::new(pattern).map_err(|source| EvalError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
            if !re.is_match(&node.name) {
                return Ok(false);
            }
        }
        Ok(self
            .facts
            .iter()
            .all(|(name, want)| node.facts.get(name) == Some(want)))
    }
}

/// Classify a node, returning the name of its role
pub fn classify<'a>(rules: &'a [Rule], node: &Node) -> Result<&'a str, EvalError> {
    for rule in rules {
        if rule.matches(node)? {
            log::debug!(
                "node '{}' classified as role '{}' (pattern {:?})",
                node.name,
                rule.role,
                rule.pattern
            );
            return Ok(&rule.role);
        }
    }
    Err(EvalError::UnclassifiedNode {
        node: node.name.clone(),
    })
}
