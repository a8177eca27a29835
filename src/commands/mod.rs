//! CLI command implementations
//!
//! Every command loads the site configuration, then drives the pipeline:
//! classifier -> role resolution -> unit evaluation -> catalog.

pub mod apply;
pub mod classify;
pub mod compile;
pub mod lookup;
pub mod validate;

use crate::classifier;
use crate::evaluator::{self, Evaluator};
use crate::facts::{FactSource, Node};
use crate::lookup::LayeredLookup;
use crate::role;
use crate::schema::SiteConfig;
use anyhow::{Context, Result};
use catalog::Catalog;
use serde::Serialize;

/// Result of compiling one node
#[derive(Serialize)]
pub struct Compiled {
    pub node: Node,
    /// Role the node was classified to; absent for single-unit evaluation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub catalog: Catalog,
}

/// Materialize a configured node with its fact snapshot
fn materialize(config: &SiteConfig, name: &str) -> Result<Node> {
    let def = config
        .find_node(name)
        .with_context(|| format!("node '{name}' is not defined in the site config"))?;
    let facts = config.facts(name)?;
    Ok(def.to_node(facts))
}

/// Run the full pipeline for one configured node
pub fn compile_node(config: &SiteConfig, name: &str) -> Result<Compiled> {
    let node = materialize(config, name)?;

    let role = classifier::classify(&config.classifier.rules, &node)?.to_string();
    let units = role::resolve(&config.roles, &role)?;
    log::info!(
        "node '{}' -> role '{role}' ({} units)",
        node.name,
        units.len()
    );

    let lookup = LayeredLookup::for_node(&config.data_dir(), &node)?;
    let catalog = Evaluator::new(&config.units, &node, &lookup).evaluate_role(&units)?;
    Ok(Compiled {
        node,
        role: Some(role),
        catalog,
    })
}

/// Evaluate one unit for a node, outside any role
pub fn compile_unit(config: &SiteConfig, name: &str, unit: &str) -> Result<Compiled> {
    let node = materialize(config, name)?;
    let lookup = LayeredLookup::for_node(&config.data_dir(), &node)?;
    let catalog = evaluator::evaluate_unit(&config.units, &node, &lookup, unit)?;
    Ok(Compiled {
        node,
        role: None,
        catalog,
    })
}
