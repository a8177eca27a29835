//! Site configuration schema
//!
//! One TOML file describes the whole site: the nodes under management,
//! the classifier rules, the roles, the units, and where the lookup data
//! lives. Loaded once per invocation; validation catches reference errors
//! before any node is compiled.

use crate::classifier::Rule;
use crate::facts::{FactSource, Facts, Node};
use crate::role::RoleDef;
use crate::unit::{ResourceTemplate, UnitDef};
use anyhow::{Context, Result};
use catalog::AttrValue;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Default site config filename searched in the working directory
const SITE_FILE: &str = "site.toml";

/// The unified site configuration
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub site: SiteSection,

    /// Nodes under management
    #[serde(default)]
    pub nodes: Vec<NodeDef>,

    /// Classifier rules, checked in order
    #[serde(default)]
    pub classifier: ClassifierSection,

    /// Roles by name
    #[serde(default)]
    pub roles: BTreeMap<String, RoleDef>,

    /// Units by name
    #[serde(default)]
    pub units: BTreeMap<String, UnitDef>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SiteSection {
    /// Lookup data directory, relative to the working directory
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ClassifierSection {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// A node entry in the site config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    pub name: String,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_stage")]
    pub stage: String,
    #[serde(default)]
    pub facts: BTreeMap<String, AttrValue>,
}

fn default_group() -> String {
    "default".to_string()
}

fn default_stage() -> String {
    "prod".to_string()
}

impl NodeDef {
    /// Materialize the node for a compilation run
    pub fn to_node(&self, facts: Facts) -> Node {
        Node {
            name: self.name.clone(),
            group: self.group.clone(),
            stage: self.stage.clone(),
            facts,
        }
    }
}

impl SiteConfig {
    /// Load a site config from an explicit path, the working directory,
    /// or the user config directory, in that order
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref()),
            None => {
                let local = PathBuf::from(SITE_FILE);
                if local.exists() {
                    local
                } else {
                    let home = dirs::home_dir().context("could not determine home directory")?;
                    home.join(".config").join("converge").join(SITE_FILE)
                }
            }
        };
        Self::load_from(&path)
    }

    /// Load and parse a specific config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("could not read site config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("invalid TOML in site config {}", path.display()))?;
        Ok(config)
    }

    /// Expanded lookup data directory
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.site.data_dir).as_ref())
    }

    /// Find a node definition by name
    pub fn find_node(&self, name: &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Validate the configuration
    ///
    /// Catches dangling references, invalid classifier patterns, role
    /// listings of private units, private units included from more than
    /// one place, and parameter references no template can resolve.
    pub fn validate(&self) -> Result<()> {
        for rule in &self.classifier.rules {
            if let Some(pattern) = &rule.pattern {
                Regex::new(pattern)
                    .with_context(|| format!("invalid classifier pattern '{pattern}'"))?;
            }
            if !self.roles.contains_key(&rule.role) {
                anyhow::bail!("classifier rule targets unknown role '{}'", rule.role);
            }
        }

        for (name, role) in &self.roles {
            for included in &role.includes {
                if !self.roles.contains_key(included) {
                    anyhow::bail!("role '{name}' includes unknown role '{included}'");
                }
            }
            for unit in &role.units {
                let Some(def) = self.units.get(unit) else {
                    anyhow::bail!("role '{name}' lists unknown unit '{unit}'");
                };
                if def.private {
                    anyhow::bail!("role '{name}' lists private unit '{unit}'");
                }
            }
        }

        let mut private_referrers: HashMap<&str, &str> = HashMap::new();
        for (name, unit) in &self.units {
            unit_is_valid(name, unit).with_context(|| format!("invalid unit '{name}'"))?;
            for include in &unit.include {
                let target = include.unit();
                let Some(def) = self.units.get(target) else {
                    anyhow::bail!("unit '{name}' includes unknown unit '{target}'");
                };
                if let Some(overrides) = include.overrides() {
                    for param in overrides.keys() {
                        if !def.params.contains_key(param) {
                            anyhow::bail!(
                                "unit '{name}' passes unknown parameter '{param}' to '{target}'"
                            );
                        }
                    }
                }
                if def.private
                    && let Some(first) = private_referrers.insert(target, name)
                {
                    anyhow::bail!(
                        "private unit '{target}' is included by both '{first}' and '{name}'"
                    );
                }
            }
        }

        Ok(())
    }
}

/// Fact snapshots come from the site config itself: each node entry
/// carries its facts inline.
impl FactSource for SiteConfig {
    fn facts(&self, node_name: &str) -> Result<Facts> {
        Ok(self
            .find_node(node_name)
            .map(|def| Facts::from(def.facts.clone()))
            .unwrap_or_default())
    }
}

/// Per-unit validation: every `${param}` reference must be declared
fn unit_is_valid(name: &str, unit: &UnitDef) -> Result<()> {
    for template in &unit.resources {
        template_refs_resolve(name, unit, template)?;
    }
    Ok(())
}

fn template_refs_resolve(name: &str, unit: &UnitDef, template: &ResourceTemplate) -> Result<()> {
    let mut check = |s: &str| -> Result<()> {
        for reference in param_refs(s) {
            if !unit.params.contains_key(&reference) {
                anyhow::bail!(
                    "resource '{}' references undeclared parameter '{reference}' of unit '{name}'",
                    template.name
                );
            }
        }
        Ok(())
    };

    check(&template.name)?;
    for value in template.attrs.values() {
        check_value(value, &mut check)?;
    }
    Ok(())
}

fn check_value(value: &AttrValue, check: &mut impl FnMut(&str) -> Result<()>) -> Result<()> {
    match value {
        AttrValue::String(s) => check(s),
        AttrValue::List(items) => {
            for item in items {
                check_value(item, check)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Extract `${param}` reference names from a template string
fn param_refs(template: &str) -> Vec<String> {
    let mut refs = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else { break };
        refs.push(after[..end].to_string());
        rest = &after[end + 1..];
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE: &str = r#"
        [site]
        data_dir = "data"

        [[nodes]]
        name = "ci-master-01"
        group = "ci"
        stage = "prod"
        facts = { memory_mb = 16384, os_family = "debian" }

        [[classifier.rules]]
        pattern = "^ci-"
        role = "ci_master"

        [roles.base]
        units = ["motd"]

        [roles.ci_master]
        includes = ["base"]
        units = ["jenkins"]

        [units.motd]
        [[units.motd.resources]]
        kind = "file"
        name = "/etc/motd"
        attrs = { mode = "0644" }

        [units.jenkins]
        include = ["java"]
        [[units.jenkins.resources]]
        kind = "service"
        name = "jenkins"
        attrs = { ensure = "running" }

        [units.java.params.heap_mb]
        from_fact = "memory_mb"
        derive = "jvm_heap"
        [[units.java.resources]]
        kind = "package"
        name = "openjdk-17"
        attrs = { ensure = "installed" }
        "#;

    #[test]
    fn test_full_site_parses_and_validates() {
        let config: SiteConfig = toml::from_str(SITE).unwrap();
        config.validate().unwrap();
        assert_eq!(config.nodes.len(), 1);
        assert_eq!(config.find_node("ci-master-01").unwrap().group, "ci");
        assert!(config.find_node("other").is_none());
        assert_eq!(config.site.data_dir, "data");
    }

    #[test]
    fn test_node_defaults() {
        let config: SiteConfig = toml::from_str(
            r#"
            [[nodes]]
            name = "solo"
            "#,
        )
        .unwrap();
        let facts = config.facts("solo").unwrap();
        let node = config.find_node("solo").unwrap().to_node(facts);
        assert_eq!(node.group, "default");
        assert_eq!(node.stage, "prod");
        assert!(node.facts.is_empty());
    }

    #[test]
    fn test_fact_source_returns_configured_facts() {
        let config: SiteConfig = toml::from_str(SITE).unwrap();
        let facts = config.facts("ci-master-01").unwrap();
        assert_eq!(facts.get_int("memory_mb"), Some(16384));
        assert!(config.facts("unknown").unwrap().is_empty());
    }

    #[test]
    fn test_validate_rejects_unknown_role_target() {
        let config: SiteConfig = toml::from_str(
            r#"
            [[classifier.rules]]
            role = "ghost"
            "#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_validate_rejects_private_unit_in_role() {
        let config: SiteConfig = toml::from_str(
            r#"
            [roles.top]
            units = ["hidden"]

            [units.hidden]
            private = true
            "#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("private unit 'hidden'"));
    }

    #[test]
    fn test_validate_rejects_multiply_included_private_unit() {
        let config: SiteConfig = toml::from_str(
            r#"
            [units.hidden]
            private = true

            [units.a]
            include = ["hidden"]

            [units.b]
            include = ["hidden"]
            "#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("included by both"));
    }

    #[test]
    fn test_validate_rejects_undeclared_param_reference() {
        let config: SiteConfig = toml::from_str(
            r#"
            [units.jenkins]
            [[units.jenkins.resources]]
            kind = "file"
            name = "/etc/default/jenkins"
            attrs = { content = "heap=${heap_mb}" }
            "#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(format!("{err:#}").contains("heap_mb"));
    }

    #[test]
    fn test_validate_rejects_bad_override() {
        let config: SiteConfig = toml::from_str(
            r#"
            [units.ssh.params.port]
            value = 22

            [units.top]
            include = [{ unit = "ssh", params = { prot = 1 } }]
            "#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("prot"));
    }

    #[test]
    fn test_load_from_missing_file_errors() {
        let err = SiteConfig::load_from(Path::new("/nonexistent/site.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("could not read"));
    }
}
