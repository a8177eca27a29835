//! # Catalog
//!
//! Resource-assertion catalogs for declarative configuration management.
//!
//! This crate provides the core model for declaring desired system state,
//! collecting it into a consistent catalog, and handing it to a
//! reconciliation engine.
//!
//! ## Core Concepts
//!
//! - **ResourceAssertion**: one desired-state fact about one managed item
//!   (a package, file, service, or user)
//! - **Catalog**: the full assertion set for a node, with duplicate
//!   detection on insert
//! - **AssertionDiff**: desired state compared against what an engine
//!   observes on the system
//! - **ReconciliationEngine**: the seam to whatever actually mutates the
//!   system; this crate ships only a plan-only stub
//!
//! ## Example
//!
//! ```
//! use catalog::{
//!     apply, AttrValue, ApplyOptions, Catalog, PlanOnlyEngine,
//!     ResourceAssertion, ResourceKind, SilentObserver,
//! };
//!
//! let mut catalog = Catalog::new();
//! catalog.insert(
//!     ResourceAssertion::new(ResourceKind::Package, "openjdk-17")
//!         .with_attr("ensure", AttrValue::from("installed")),
//! )?;
//!
//! let engine = PlanOnlyEngine::new();
//! let summary = apply(
//!     &catalog,
//!     &engine,
//!     &ApplyOptions::default(),
//!     &mut SilentObserver,
//! )?;
//! assert_eq!(summary.created, 1);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Engine Trait
//!
//! [`ReconciliationEngine`] keeps this crate free of any dependency on
//! package managers, file writers, or service managers. Implementations
//! report observed state via `current` and converge single assertions via
//! `ensure`; the shipped [`PlanOnlyEngine`] records what it is asked to
//! ensure and never touches the system.

pub mod apply;
pub mod assertion;
pub mod catalog;
pub mod diff;
pub mod error;

// Re-export main types at crate root
pub use apply::{
    apply, ApplyObserver, ApplyOptions, ApplyOutcome, ApplySummary, PlanOnlyEngine,
    ReconciliationEngine, SilentObserver,
};
pub use assertion::{AttrValue, ResourceAssertion, ResourceKind};
pub use catalog::Catalog;
pub use diff::{compute_diffs, group_by_kind, AssertionDiff, DiffSummary, ObservedState};
pub use error::CatalogError;
