//! Evaluation error taxonomy
//!
//! Every error here is fatal to the affected node's run: compilation
//! either produces a consistent catalog or aborts before anything is
//! handed to the reconciliation engine. Each variant names the offending
//! node, role, unit, or resource for diagnosis.

use thiserror::Error;

/// Errors raised while compiling a node's catalog
#[derive(Error, Debug)]
pub enum EvalError {
    /// No classifier rule matched the node
    #[error("no classifier rule matches node '{node}'")]
    UnclassifiedNode { node: String },

    /// A classifier rule carries a pattern that is not a valid regex
    #[error("invalid classifier pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Role inclusion is cyclic
    #[error("role inclusion cycle at '{role}' ({path})")]
    CyclicBundle { role: String, path: String },

    /// A role or role include references a role that is not defined
    #[error("unknown role '{role}' referenced by '{referrer}'")]
    UnknownRole { role: String, referrer: String },

    /// Unit inclusion is cyclic
    #[error("unit inclusion cycle at '{unit}' ({path})")]
    CyclicUnit { unit: String, path: String },

    /// A role or unit references a unit that is not defined
    #[error("unknown unit '{unit}' referenced by '{referrer}'")]
    UnknownUnit { unit: String, referrer: String },

    /// The same unit was included twice with different effective parameters
    #[error("unit '{unit}' included twice with conflicting parameter '{parameter}'")]
    ConflictingInclusion { unit: String, parameter: String },

    /// A private unit was included a second time
    #[error("private unit '{unit}' included again by '{referrer}'")]
    PrivateReinclusion { unit: String, referrer: String },

    /// An include passes a parameter the unit does not declare
    #[error("unit '{unit}' has no parameter '{parameter}'")]
    UnknownParameter { unit: String, parameter: String },

    /// A fact-derived parameter references a fact the node does not have
    #[error("unit '{unit}' parameter '{parameter}' needs fact '{fact}', which the node lacks")]
    MissingFact {
        unit: String,
        parameter: String,
        fact: String,
    },

    /// A lookup-sourced parameter resolved nowhere and has no default
    #[error("unit '{unit}' parameter '{parameter}' found no value for lookup key '{key}'")]
    MissingLookup {
        unit: String,
        parameter: String,
        key: String,
    },

    /// A derivation was applied to a fact value of the wrong shape
    #[error("unit '{unit}' parameter '{parameter}': {message}")]
    Derivation {
        unit: String,
        parameter: String,
        message: String,
    },

    /// Two assertions collided on the same identifier
    #[error(transparent)]
    DuplicateResource(#[from] catalog::CatalogError),
}
