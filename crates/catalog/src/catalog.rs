//! Catalog - the collected assertion set for one node

use crate::assertion::{ResourceAssertion, ResourceKind};
use crate::error::CatalogError;
use serde::Serialize;
use std::collections::HashMap;

/// The full desired-state assertion set for a node
///
/// Insertion order is preserved so evaluation output is stable. The
/// catalog enforces the identifier-uniqueness invariant: inserting an
/// assertion whose (kind, id) key already exists is a silent merge when
/// the attributes are identical and a [`CatalogError::DuplicateResource`]
/// when they conflict.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    assertions: Vec<ResourceAssertion>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an assertion, enforcing identifier uniqueness
    pub fn insert(&mut self, assertion: ResourceAssertion) -> Result<(), CatalogError> {
        let key = assertion.key();
        if let Some(&pos) = self.index.get(&key) {
            let existing = &self.assertions[pos];
            return match existing.first_conflict(&assertion) {
                None => Ok(()), // identical duplicate, merge silently
                Some(attribute) => Err(CatalogError::DuplicateResource {
                    key,
                    attribute: attribute.to_string(),
                }),
            };
        }
        self.index.insert(key, self.assertions.len());
        self.assertions.push(assertion);
        Ok(())
    }

    /// Iterate assertions in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &ResourceAssertion> {
        self.assertions.iter()
    }

    /// Assertions as a slice, in insertion order
    pub fn assertions(&self) -> &[ResourceAssertion] {
        &self.assertions
    }

    /// Look up an assertion by its "kind/id" key
    pub fn get(&self, key: &str) -> Option<&ResourceAssertion> {
        self.index.get(key).map(|&pos| &self.assertions[pos])
    }

    /// Assertions of one kind, in insertion order
    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceAssertion> {
        self.assertions.iter().filter(move |a| a.kind == kind)
    }

    /// Number of assertions
    pub fn len(&self) -> usize {
        self.assertions.len()
    }

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a ResourceAssertion;
    type IntoIter = std::slice::Iter<'a, ResourceAssertion>;

    fn into_iter(self) -> Self::IntoIter {
        self.assertions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::AttrValue;

    fn pkg(name: &str, ensure: &str) -> ResourceAssertion {
        ResourceAssertion::new(ResourceKind::Package, name)
            .with_attr("ensure", AttrValue::from(ensure))
    }

    #[test]
    fn test_insert_preserves_order() {
        let mut c = Catalog::new();
        c.insert(pkg("openjdk-17", "installed")).unwrap();
        c.insert(pkg("jenkins", "installed")).unwrap();
        let ids: Vec<&str> = c.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["openjdk-17", "jenkins"]);
    }

    #[test]
    fn test_identical_duplicate_merges_silently() {
        let mut c = Catalog::new();
        c.insert(pkg("git", "installed")).unwrap();
        c.insert(pkg("git", "installed")).unwrap();
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_conflicting_duplicate_is_fatal() {
        let mut c = Catalog::new();
        c.insert(pkg("git", "installed")).unwrap();
        let err = c.insert(pkg("git", "absent")).unwrap_err();
        assert_eq!(
            err,
            CatalogError::DuplicateResource {
                key: "package/git".to_string(),
                attribute: "ensure".to_string(),
            }
        );
        // First assertion survives untouched
        assert_eq!(c.len(), 1);
        assert_eq!(
            c.get("package/git").unwrap().attributes["ensure"],
            AttrValue::from("installed")
        );
    }

    #[test]
    fn test_same_id_different_kind_is_not_a_duplicate() {
        let mut c = Catalog::new();
        c.insert(ResourceAssertion::new(ResourceKind::Package, "jenkins"))
            .unwrap();
        c.insert(ResourceAssertion::new(ResourceKind::Service, "jenkins"))
            .unwrap();
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn test_of_kind_filters() {
        let mut c = Catalog::new();
        c.insert(pkg("git", "installed")).unwrap();
        c.insert(ResourceAssertion::new(ResourceKind::Service, "sshd"))
            .unwrap();
        assert_eq!(c.of_kind(ResourceKind::Package).count(), 1);
        assert_eq!(c.of_kind(ResourceKind::User).count(), 0);
    }
}
