//! `converge validate` - check the site configuration

use crate::schema::SiteConfig;
use crate::{ui, Context};
use anyhow::Result;

pub fn run(_ctx: &Context, config: &SiteConfig) -> Result<()> {
    config.validate()?;
    ui::success(&format!(
        "site config is valid: {} node(s), {} role(s), {} unit(s), {} classifier rule(s)",
        config.nodes.len(),
        config.roles.len(),
        config.units.len(),
        config.classifier.rules.len()
    ));
    Ok(())
}
