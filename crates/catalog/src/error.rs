//! Error types for catalog construction

use thiserror::Error;

/// Errors raised while building a catalog
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Two assertions share a (kind, identifier) key but disagree on at
    /// least one attribute. Identical duplicates merge silently instead.
    #[error("duplicate resource '{key}' with conflicting attribute '{attribute}'")]
    DuplicateResource { key: String, attribute: String },
}
