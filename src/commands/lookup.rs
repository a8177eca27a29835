//! `converge lookup` - trace a key through a node's data layers

use crate::facts::FactSource;
use crate::lookup::LayeredLookup;
use crate::schema::SiteConfig;
use crate::{ui, Context};
use anyhow::{Context as AnyhowContext, Result};

pub fn run(ctx: &Context, config: &SiteConfig, node_name: &str, key: &str) -> Result<()> {
    let def = config
        .find_node(node_name)
        .with_context(|| format!("node '{node_name}' is not defined in the site config"))?;
    let node = def.to_node(config.facts(node_name)?);
    let lookup = LayeredLookup::for_node(&config.data_dir(), &node)?;

    if ctx.verbose > 0 {
        ui::section("search order");
        for name in lookup.layer_names() {
            ui::dim(name);
        }
        println!();
    }

    match lookup.explain(key) {
        Some((layer, value)) => {
            println!("{value}");
            if !ctx.quiet {
                ui::dim(&format!("defined in {layer}"));
            }
            Ok(())
        }
        None => anyhow::bail!("key '{key}' is not defined in any layer for node '{node_name}'"),
    }
}
