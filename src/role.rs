//! Roles - parameterless compositions of configuration units
//!
//! A role lists unit names and may include other roles; it never carries
//! parameters for the units it lists and never declares resources itself.
//! Resolution is pure expansion: included roles expand before the role's
//! own units, duplicates keep their first position, and inclusion cycles
//! are fatal.

use crate::error::EvalError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A desired-state bundle assigned wholesale to a node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleDef {
    /// Roles expanded before this role's own units
    #[serde(default)]
    pub includes: Vec<String>,
    /// Ordered unit names this role is composed of
    #[serde(default)]
    pub units: Vec<String>,
}

/// Expand a role into its ordered list of unit names
pub fn resolve(roles: &BTreeMap<String, RoleDef>, name: &str) -> Result<Vec<String>, EvalError> {
    let mut units = Vec::new();
    let mut stack = Vec::new();
    expand(roles, name, "classifier", &mut stack, &mut units)?;
    Ok(units)
}

fn expand(
    roles: &BTreeMap<String, RoleDef>,
    name: &str,
    referrer: &str,
    stack: &mut Vec<String>,
    units: &mut Vec<String>,
) -> Result<(), EvalError> {
    if stack.iter().any(|r| r == name) {
        let mut path: Vec<&str> = stack.iter().map(String::as_str).collect();
        path.push(name);
        return Err(EvalError::CyclicBundle {
            role: name.to_string(),
            path: path.join(" -> "),
        });
    }

    let role = roles.get(name).ok_or_else(|| EvalError::UnknownRole {
        role: name.to_string(),
        referrer: referrer.to_string(),
    })?;

    stack.push(name.to_string());
    for included in &role.includes {
        expand(roles, included, name, stack, units)?;
    }
    for unit in &role.units {
        if !units.iter().any(|u| u == unit) {
            units.push(unit.clone());
        }
    }
    stack.pop();
    Ok(())
}
