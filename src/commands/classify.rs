//! `converge classify` - show the role a node is assigned

use crate::classifier;
use crate::facts::FactSource;
use crate::schema::SiteConfig;
use crate::Context;
use anyhow::{Context as AnyhowContext, Result};

pub fn run(_ctx: &Context, config: &SiteConfig, node_name: &str) -> Result<()> {
    let def = config
        .find_node(node_name)
        .with_context(|| format!("node '{node_name}' is not defined in the site config"))?;
    let node = def.to_node(config.facts(node_name)?);
    let role = classifier::classify(&config.classifier.rules, &node)?;
    println!("{role}");
    Ok(())
}
