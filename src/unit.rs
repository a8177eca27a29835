//! Configuration units - parameterized, composable desired-state declarations
//!
//! A unit declares a typed parameter set and a list of resource templates.
//! Every parameter names exactly one source: a constant, a pure derivation
//! from a fact, or an external lookup. The fixed precedence (constant,
//! then computed, then looked up) is therefore structural - a unit with a
//! hardcoded parameter cannot consult the lookup service for it.

use crate::facts::jvm_heap_mb;
use catalog::{AttrValue, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named configuration unit ("profile")
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitDef {
    /// Private units may never be listed by a role and may be included
    /// at most once
    #[serde(default)]
    pub private: bool,

    /// Declared parameters, each with exactly one source
    #[serde(default)]
    pub params: BTreeMap<String, ParamSource>,

    /// Units this unit includes (recursive evaluation, must form a DAG)
    #[serde(default)]
    pub include: Vec<IncludeRef>,

    /// Tags whose published resource templates this unit collects during
    /// final assembly
    #[serde(default)]
    pub collect: Vec<String>,

    /// Resource templates this unit produces
    #[serde(default)]
    pub resources: Vec<ResourceTemplate>,
}

/// Where a parameter value comes from
///
/// Variants are listed in precedence order; serde's untagged matching
/// tries them the same way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamSource {
    /// Hardcoded constant
    Constant { value: AttrValue },
    /// Pure function of a single fact
    FromFact {
        from_fact: String,
        #[serde(default)]
        derive: Option<Derivation>,
    },
    /// External lookup with an optional caller-supplied default
    Lookup { lookup: LookupSpec },
}

/// Lookup key and default for a lookup-sourced parameter
///
/// The key defaults to `<unit>.<parameter>` when not given explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupSpec {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub default: Option<AttrValue>,
}

/// Named pure derivations applicable to a fact value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Derivation {
    /// JVM heap sizing from total memory in MB (compute, don't look up)
    JvmHeap,
}

impl Derivation {
    /// Apply the derivation to a fact value
    pub fn apply(self, value: &AttrValue) -> Result<AttrValue, String> {
        match self {
            Self::JvmHeap => {
                let total = value
                    .as_int()
                    .ok_or_else(|| format!("jvm_heap expects an integer MB value, got '{value}'"))?;
                Ok(AttrValue::Int(jvm_heap_mb(total)))
            }
        }
    }
}

/// Reference to an included unit, optionally with parameter overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncludeRef {
    /// Bare include: the unit resolves all parameters itself
    Name(String),
    /// Include with explicit overrides for declared parameters
    WithParams {
        unit: String,
        #[serde(default)]
        params: BTreeMap<String, AttrValue>,
    },
}

impl IncludeRef {
    /// Name of the included unit
    pub fn unit(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::WithParams { unit, .. } => unit,
        }
    }

    /// Parameter overrides carried by the include
    pub fn overrides(&self) -> Option<&BTreeMap<String, AttrValue>> {
        match self {
            Self::Name(_) => None,
            Self::WithParams { params, .. } => Some(params),
        }
    }
}

/// A resource declaration inside a unit
///
/// `name` and string attribute values may reference declared parameters
/// as `${param}`. Templates carrying `publish` tags are registered with
/// the tag registry instead of being emitted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceTemplate {
    pub kind: ResourceKind,
    pub name: String,
    #[serde(default)]
    pub publish: Vec<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, AttrValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_def_from_toml() {
        let unit: UnitDef = toml::from_str(
            r#"
            include = ["java", { unit = "ssh", params = { port = 2222 } }]
            collect = ["backup"]

            [params.heap_mb]
            from_fact = "memory_mb"
            derive = "jvm_heap"

            [params.admin_user]
            lookup = { default = "admin" }

            [params.home]
            value = "/var/lib/jenkins"

            [[resources]]
            kind = "service"
            name = "jenkins"
            attrs = { ensure = "running", heap = "${heap_mb}" }
            "#,
        )
        .unwrap();

        assert_eq!(
            unit.params["heap_mb"],
            ParamSource::FromFact {
                from_fact: "memory_mb".to_string(),
                derive: Some(Derivation::JvmHeap),
            }
        );
        assert_eq!(
            unit.params["admin_user"],
            ParamSource::Lookup {
                lookup: LookupSpec {
                    key: None,
                    default: Some(AttrValue::from("admin")),
                },
            }
        );
        assert_eq!(
            unit.params["home"],
            ParamSource::Constant {
                value: AttrValue::from("/var/lib/jenkins"),
            }
        );
        assert_eq!(unit.include[0], IncludeRef::Name("java".to_string()));
        assert_eq!(unit.include[1].unit(), "ssh");
        assert_eq!(
            unit.include[1].overrides().unwrap()["port"],
            AttrValue::Int(2222)
        );
        assert_eq!(unit.resources[0].kind, ResourceKind::Service);
    }

    #[test]
    fn test_jvm_heap_derivation() {
        let heap = Derivation::JvmHeap
            .apply(&AttrValue::Int(16384))
            .unwrap();
        assert_eq!(heap, AttrValue::Int(12288));
    }

    #[test]
    fn test_jvm_heap_rejects_non_integer() {
        let err = Derivation::JvmHeap
            .apply(&AttrValue::from("lots"))
            .unwrap_err();
        assert!(err.contains("integer"));
    }
}
