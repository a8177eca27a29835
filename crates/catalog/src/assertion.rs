//! Resource assertions - single desired-state facts about managed items

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of managed item an assertion describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// An installable package
    Package,
    /// A file on disk
    File,
    /// A system service
    Service,
    /// A local user account
    User,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Package => "package",
            Self::File => "file",
            Self::Service => "service",
            Self::User => "user",
        };
        f.write_str(s)
    }
}

/// Typed attribute value
///
/// Deserializes untagged, so TOML/JSON scalars and arrays map directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<AttrValue>),
}

impl AttrValue {
    /// Get the value as an integer, if it is one
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the value as a string slice, if it is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
            Self::List(items) => {
                let rendered: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// A single desired-state assertion: (kind, identifier, attributes)
///
/// The identifier is unique within its kind for a node's full assertion
/// set; attributes use an ordered map so serialized catalogs are stable
/// across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAssertion {
    /// What kind of item this asserts about
    pub kind: ResourceKind,
    /// Identifier within the kind (package name, file path, ...)
    pub id: String,
    /// Desired attributes (ensure, owner, mode, ...)
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrValue>,
}

impl ResourceAssertion {
    /// Create an assertion with no attributes
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_attr(mut self, key: impl Into<String>, value: AttrValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Catalog-wide key: "kind/id"
    pub fn key(&self) -> String {
        format!("{}/{}", self.kind, self.id)
    }

    /// Find the first attribute on which two assertions disagree
    ///
    /// Returns `None` when the attribute maps are identical. Considers an
    /// attribute present on one side only as a disagreement.
    pub fn first_conflict<'a>(&'a self, other: &'a Self) -> Option<&'a str> {
        for key in self.attributes.keys().chain(other.attributes.keys()) {
            if self.attributes.get(key) != other.attributes.get(key) {
                return Some(key);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_includes_kind() {
        let a = ResourceAssertion::new(ResourceKind::File, "/etc/motd");
        assert_eq!(a.key(), "file//etc/motd");
        let b = ResourceAssertion::new(ResourceKind::Service, "jenkins");
        assert_eq!(b.key(), "service/jenkins");
    }

    #[test]
    fn test_first_conflict_none_when_identical() {
        let a = ResourceAssertion::new(ResourceKind::Package, "git")
            .with_attr("ensure", AttrValue::from("installed"));
        let b = a.clone();
        assert_eq!(a.first_conflict(&b), None);
    }

    #[test]
    fn test_first_conflict_detects_differing_value() {
        let a = ResourceAssertion::new(ResourceKind::Service, "sshd")
            .with_attr("ensure", AttrValue::from("running"));
        let b = ResourceAssertion::new(ResourceKind::Service, "sshd")
            .with_attr("ensure", AttrValue::from("stopped"));
        assert_eq!(a.first_conflict(&b), Some("ensure"));
    }

    #[test]
    fn test_first_conflict_detects_missing_attribute() {
        let a = ResourceAssertion::new(ResourceKind::User, "jenkins")
            .with_attr("home", AttrValue::from("/var/lib/jenkins"));
        let b = ResourceAssertion::new(ResourceKind::User, "jenkins");
        assert_eq!(a.first_conflict(&b), Some("home"));
    }

    #[test]
    fn test_attr_value_display() {
        assert_eq!(AttrValue::from(12288i64).to_string(), "12288");
        assert_eq!(AttrValue::from(true).to_string(), "true");
        assert_eq!(
            AttrValue::List(vec![AttrValue::from("a"), AttrValue::from("b")]).to_string(),
            "[a, b]"
        );
    }
}
