//! `converge compile` - build node catalogs

use super::{compile_node, compile_unit, Compiled};
use crate::cli::OutputFormat;
use crate::schema::SiteConfig;
use crate::{ui, Context};
use anyhow::Result;
use catalog::ResourceKind;
use colored::Colorize;
use rayon::prelude::*;

const KINDS: [ResourceKind; 4] = [
    ResourceKind::Package,
    ResourceKind::File,
    ResourceKind::Service,
    ResourceKind::User,
];

pub fn run(
    ctx: &Context,
    config: &SiteConfig,
    node: Option<&str>,
    all: bool,
    unit: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let compiled = if all {
        // Node evaluations are self-contained, so they compile in parallel
        config
            .nodes
            .par_iter()
            .map(|def| compile_node(config, &def.name))
            .collect::<Result<Vec<_>>>()?
    } else {
        let Some(name) = node else {
            anyhow::bail!("pass --node NAME or --all");
        };
        let compiled = match unit {
            Some(unit) => compile_unit(config, name, unit)?,
            None => compile_node(config, name)?,
        };
        vec![compiled]
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&compiled)?);
        }
        OutputFormat::Text => {
            for item in &compiled {
                print_catalog(ctx, item);
            }
        }
    }
    Ok(())
}

fn print_catalog(ctx: &Context, compiled: &Compiled) {
    if ctx.quiet {
        return;
    }
    ui::header(&format!(
        "{} ({} assertions)",
        compiled.node.name,
        compiled.catalog.len()
    ));
    if let Some(role) = &compiled.role {
        ui::kv("role", role);
    }

    for kind in KINDS {
        let assertions: Vec<_> = compiled.catalog.of_kind(kind).collect();
        if assertions.is_empty() {
            continue;
        }
        ui::section(&kind.to_string());
        for assertion in assertions {
            println!("  {}", assertion.id.bold());
            for (key, value) in &assertion.attributes {
                ui::dim(&format!("{key} = {value}"));
            }
        }
    }
}
