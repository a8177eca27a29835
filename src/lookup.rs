//! Layered key-value lookup
//!
//! External configuration data lives in TOML files under the site's data
//! directory, layered from most to least specific:
//!
//! ```text
//! nodes/<name>.toml            per-node
//! groups/<group>/<stage>.toml  per-group-and-stage
//! groups/<group>.toml          per-group
//! common.toml                  global defaults
//! ```
//!
//! The first layer defining a key wins. Layers are read once per run and
//! never written, so concurrent node compilations can share nothing and
//! still need no locking.

use crate::facts::Node;
use anyhow::{Context, Result};
use catalog::AttrValue;
use std::collections::BTreeMap;
use std::path::Path;

/// Read-only key-value store queried during unit evaluation
pub trait LookupService {
    /// Resolve a key, or None if no layer defines it
    fn get(&self, key: &str) -> Option<AttrValue>;

    /// Resolve a key, falling back to a caller-supplied default
    fn get_or(&self, key: &str, default: AttrValue) -> AttrValue {
        self.get(key).unwrap_or(default)
    }
}

/// One data layer: a name (for diagnostics) and its flattened keys
#[derive(Debug, Clone)]
struct Layer {
    name: String,
    values: BTreeMap<String, AttrValue>,
}

/// Lookup service over an ordered stack of data layers
#[derive(Debug, Default)]
pub struct LayeredLookup {
    layers: Vec<Layer>,
}

impl LayeredLookup {
    /// Build the layer stack for a node from the site data directory
    ///
    /// Missing layer files are treated as empty layers, not errors.
    pub fn for_node(data_dir: &Path, node: &Node) -> Result<Self> {
        let paths = [
            format!("nodes/{}.toml", node.name),
            format!("groups/{}/{}.toml", node.group, node.stage),
            format!("groups/{}.toml", node.group),
            "common.toml".to_string(),
        ];

        let mut lookup = Self::default();
        for rel in paths {
            let path = data_dir.join(&rel);
            let values = if path.exists() {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("could not read data layer {}", path.display()))?;
                let table: toml::Table = content
                    .parse()
                    .with_context(|| format!("invalid TOML in data layer {}", path.display()))?;
                flatten(&table)
            } else {
                BTreeMap::new()
            };
            lookup.layers.push(Layer { name: rel, values });
        }
        Ok(lookup)
    }

    /// Build a lookup from in-memory layers, most specific first
    pub fn from_layers<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = (String, BTreeMap<String, AttrValue>)>,
    {
        Self {
            layers: layers
                .into_iter()
                .map(|(name, values)| Layer { name, values })
                .collect(),
        }
    }

    /// Resolve a key and report which layer defined it
    pub fn explain(&self, key: &str) -> Option<(&str, &AttrValue)> {
        self.layers
            .iter()
            .find_map(|layer| layer.values.get(key).map(|v| (layer.name.as_str(), v)))
    }

    /// Names of the layers in search order
    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.name.as_str())
    }
}

impl LookupService for LayeredLookup {
    fn get(&self, key: &str) -> Option<AttrValue> {
        self.explain(key).map(|(_, v)| v.clone())
    }
}

/// Flatten a TOML table into dotted keys with attribute values
///
/// Nested tables become dotted key segments ("jenkins_master.admin_user");
/// scalars and arrays convert directly. Datetimes are not supported and
/// are skipped.
fn flatten(table: &toml::Table) -> BTreeMap<String, AttrValue> {
    let mut out = BTreeMap::new();
    flatten_into(table, "", &mut out);
    out
}

fn flatten_into(table: &toml::Table, prefix: &str, out: &mut BTreeMap<String, AttrValue>) {
    for (key, value) in table {
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(inner) => flatten_into(inner, &full, out),
            other => {
                if let Some(attr) = convert(other) {
                    out.insert(full, attr);
                }
            }
        }
    }
}

fn convert(value: &toml::Value) -> Option<AttrValue> {
    match value {
        toml::Value::String(s) => Some(AttrValue::String(s.clone())),
        toml::Value::Integer(n) => Some(AttrValue::Int(*n)),
        toml::Value::Float(x) => Some(AttrValue::Float(*x)),
        toml::Value::Boolean(b) => Some(AttrValue::Bool(*b)),
        toml::Value::Array(items) => Some(AttrValue::List(
            items.iter().filter_map(convert).collect(),
        )),
        toml::Value::Datetime(_) | toml::Value::Table(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::Facts;

    fn layer(name: &str, pairs: &[(&str, AttrValue)]) -> (String, BTreeMap<String, AttrValue>) {
        (
            name.to_string(),
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_node_layer_beats_global() {
        let lookup = LayeredLookup::from_layers([
            layer("nodes/ci-01.toml", &[("ssh.port", AttrValue::Int(2222))]),
            layer("common.toml", &[("ssh.port", AttrValue::Int(22))]),
        ]);
        assert_eq!(lookup.get("ssh.port"), Some(AttrValue::Int(2222)));
        let (winner, _) = lookup.explain("ssh.port").unwrap();
        assert_eq!(winner, "nodes/ci-01.toml");
    }

    #[test]
    fn test_fallthrough_to_later_layer() {
        let lookup = LayeredLookup::from_layers([
            layer("nodes/ci-01.toml", &[]),
            layer("common.toml", &[("ssh.port", AttrValue::Int(22))]),
        ]);
        assert_eq!(lookup.get("ssh.port"), Some(AttrValue::Int(22)));
    }

    #[test]
    fn test_get_or_default() {
        let lookup = LayeredLookup::from_layers([layer("common.toml", &[])]);
        assert_eq!(lookup.get("missing"), None);
        assert_eq!(
            lookup.get_or("missing", AttrValue::from("fallback")),
            AttrValue::from("fallback")
        );
    }

    #[test]
    fn test_flatten_nested_tables() {
        let table: toml::Table = r#"
            [jenkins_master]
            admin_user = "ops"
            heap_mb = 2048
            plugins = ["git", "ssh-agent"]
        "#
        .parse()
        .unwrap();
        let flat = flatten(&table);
        assert_eq!(
            flat.get("jenkins_master.admin_user"),
            Some(&AttrValue::from("ops"))
        );
        assert_eq!(flat.get("jenkins_master.heap_mb"), Some(&AttrValue::Int(2048)));
        assert_eq!(
            flat.get("jenkins_master.plugins"),
            Some(&AttrValue::List(vec![
                AttrValue::from("git"),
                AttrValue::from("ssh-agent"),
            ]))
        );
    }

    #[test]
    fn test_for_node_layer_order() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path();
        std::fs::create_dir_all(data.join("nodes")).unwrap();
        std::fs::create_dir_all(data.join("groups/ci")).unwrap();
        std::fs::write(data.join("nodes/ci-01.toml"), "key = \"node\"\n").unwrap();
        std::fs::write(data.join("groups/ci/prod.toml"), "key = \"stage\"\nother = 1\n")
            .unwrap();
        std::fs::write(data.join("common.toml"), "key = \"common\"\nbase = true\n").unwrap();

        let node = Node {
            name: "ci-01".to_string(),
            group: "ci".to_string(),
            stage: "prod".to_string(),
            facts: Facts::new(),
        };
        let lookup = LayeredLookup::for_node(data, &node).unwrap();

        assert_eq!(lookup.get("key"), Some(AttrValue::from("node")));
        assert_eq!(lookup.get("other"), Some(AttrValue::Int(1)));
        assert_eq!(lookup.get("base"), Some(AttrValue::Bool(true)));
        // groups/ci.toml is missing and treated as empty
        assert_eq!(lookup.layer_names().count(), 4);
    }
}
