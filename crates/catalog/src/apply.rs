//! Apply layer - feed a catalog to a reconciliation engine
//!
//! The engine that actually diffs and mutates system state (package
//! managers, file writers, service managers) lives outside this crate;
//! [`ReconciliationEngine`] is the seam. Application is sequential and
//! run-to-completion: one node's catalog is applied on a single thread
//! with no suspension points.

use crate::assertion::ResourceAssertion;
use crate::catalog::Catalog;
use crate::diff::ObservedState;
use anyhow::Result;
use serde::Serialize;
use std::sync::Mutex;

/// Seam to the external engine that converges actual system state
pub trait ReconciliationEngine: Send + Sync {
    /// Observe the current state of the item an assertion describes
    fn current(&self, assertion: &ResourceAssertion) -> Result<ObservedState>;

    /// Converge the item to the asserted state
    fn ensure(&self, assertion: &ResourceAssertion) -> Result<ApplyOutcome>;
}

/// Outcome of ensuring a single assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ApplyOutcome {
    /// Already in the desired state
    NoChange,
    /// Item was created
    Created,
    /// Item existed and was changed
    Modified,
    /// Ensure was skipped
    Skipped { reason: String },
    /// Ensure failed
    Failed { error: String },
}

impl ApplyOutcome {
    /// Check if the outcome represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the outcome represents a change
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Modified)
    }
}

/// Summary of an apply run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ApplySummary {
    pub created: usize,
    pub modified: usize,
    pub no_change: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ApplySummary {
    /// Total number of assertions processed
    pub fn total(&self) -> usize {
        self.created + self.modified + self.no_change + self.skipped + self.failed
    }

    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.modified
    }

    /// Check if the run was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Add an outcome to the summary
    pub fn add_outcome(&mut self, outcome: &ApplyOutcome) {
        match outcome {
            ApplyOutcome::NoChange => self.no_change += 1,
            ApplyOutcome::Created => self.created += 1,
            ApplyOutcome::Modified => self.modified += 1,
            ApplyOutcome::Skipped { .. } => self.skipped += 1,
            ApplyOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Options for an apply run
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Don't converge anything, only report what would change
    pub dry_run: bool,
}

/// Observer receiving per-assertion apply progress
pub trait ApplyObserver {
    /// Called before ensuring a single assertion
    fn on_assertion_start(&mut self, assertion: &ResourceAssertion);

    /// Called after a single assertion has been processed
    fn on_assertion_done(&mut self, assertion: &ResourceAssertion, outcome: &ApplyOutcome);
}

/// Observer that reports nothing
pub struct SilentObserver;

impl ApplyObserver for SilentObserver {
    fn on_assertion_start(&mut self, _assertion: &ResourceAssertion) {}
    fn on_assertion_done(&mut self, _assertion: &ResourceAssertion, _outcome: &ApplyOutcome) {}
}

/// Apply a catalog through the given engine
///
/// Assertions are processed in catalog order. A failed ensure is recorded
/// in the summary and does not abort the remaining assertions; errors from
/// state observation do abort, since without an observation the engine
/// cannot be trusted to converge safely.
pub fn apply(
    catalog: &Catalog,
    engine: &dyn ReconciliationEngine,
    opts: &ApplyOptions,
    observer: &mut dyn ApplyObserver,
) -> Result<ApplySummary> {
    let mut summary = ApplySummary::default();

    for assertion in catalog {
        observer.on_assertion_start(assertion);

        let observed = engine.current(assertion)?;
        let outcome = if observed.satisfies(&assertion.attributes) {
            ApplyOutcome::NoChange
        } else if opts.dry_run {
            ApplyOutcome::Skipped {
                reason: "dry run".to_string(),
            }
        } else {
            match engine.ensure(assertion) {
                Ok(outcome) => outcome,
                Err(e) => ApplyOutcome::Failed {
                    error: e.to_string(),
                },
            }
        };

        summary.add_outcome(&outcome);
        observer.on_assertion_done(assertion, &outcome);
    }

    Ok(summary)
}

/// Plan-only engine: observes nothing as present, records every ensure
///
/// Stands in for a real reconciliation engine in tests and dry planning.
/// Everything is reported absent, so every assertion appears as a pending
/// creation; `ensure` records the catalog key and claims success.
#[derive(Debug, Default)]
pub struct PlanOnlyEngine {
    ensured: Mutex<Vec<String>>,
}

impl PlanOnlyEngine {
    /// Create a fresh engine with an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog keys of every assertion this engine was asked to ensure
    pub fn ensured(&self) -> Vec<String> {
        self.ensured.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl ReconciliationEngine for PlanOnlyEngine {
    fn current(&self, _assertion: &ResourceAssertion) -> Result<ObservedState> {
        Ok(ObservedState::Absent)
    }

    fn ensure(&self, assertion: &ResourceAssertion) -> Result<ApplyOutcome> {
        if let Ok(mut ensured) = self.ensured.lock() {
            ensured.push(assertion.key());
        }
        Ok(ApplyOutcome::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::{AttrValue, ResourceKind};
    use std::collections::BTreeMap;

    /// Engine that fails to ensure anything
    struct BrokenEngine;

    impl ReconciliationEngine for BrokenEngine {
        fn current(&self, _assertion: &ResourceAssertion) -> Result<ObservedState> {
            Ok(ObservedState::Absent)
        }

        fn ensure(&self, assertion: &ResourceAssertion) -> Result<ApplyOutcome> {
            anyhow::bail!("cannot converge {}", assertion.key())
        }
    }

    /// Engine that considers everything already converged
    struct SatisfiedEngine;

    impl ReconciliationEngine for SatisfiedEngine {
        fn current(&self, assertion: &ResourceAssertion) -> Result<ObservedState> {
            Ok(ObservedState::Present {
                attributes: assertion.attributes.clone(),
            })
        }

        fn ensure(&self, _assertion: &ResourceAssertion) -> Result<ApplyOutcome> {
            Ok(ApplyOutcome::Modified)
        }
    }

    fn sample_catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .insert(
                ResourceAssertion::new(ResourceKind::Package, "jenkins")
                    .with_attr("ensure", AttrValue::from("installed")),
            )
            .unwrap();
        catalog
            .insert(
                ResourceAssertion::new(ResourceKind::Service, "jenkins")
                    .with_attr("ensure", AttrValue::from("running")),
            )
            .unwrap();
        catalog
    }

    #[test]
    fn test_apply_empty_catalog() {
        let engine = PlanOnlyEngine::new();
        let summary = apply(
            &Catalog::new(),
            &engine,
            &ApplyOptions::default(),
            &mut SilentObserver,
        )
        .unwrap();
        assert_eq!(summary.total(), 0);
        assert!(summary.is_success());
    }

    #[test]
    fn test_apply_records_creations_in_order() {
        let engine = PlanOnlyEngine::new();
        let summary = apply(
            &sample_catalog(),
            &engine,
            &ApplyOptions::default(),
            &mut SilentObserver,
        )
        .unwrap();
        assert_eq!(summary.created, 2);
        assert_eq!(
            engine.ensured(),
            vec!["package/jenkins".to_string(), "service/jenkins".to_string()]
        );
    }

    #[test]
    fn test_dry_run_ensures_nothing() {
        let engine = PlanOnlyEngine::new();
        let opts = ApplyOptions { dry_run: true };
        let summary = apply(&sample_catalog(), &engine, &opts, &mut SilentObserver).unwrap();
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.total_changes(), 0);
        assert!(engine.ensured().is_empty());
    }

    #[test]
    fn test_satisfied_state_is_no_change() {
        let summary = apply(
            &sample_catalog(),
            &SatisfiedEngine,
            &ApplyOptions::default(),
            &mut SilentObserver,
        )
        .unwrap();
        assert_eq!(summary.no_change, 2);
        assert_eq!(summary.total_changes(), 0);
    }

    #[test]
    fn test_ensure_failure_does_not_abort_run() {
        let summary = apply(
            &sample_catalog(),
            &BrokenEngine,
            &ApplyOptions::default(),
            &mut SilentObserver,
        )
        .unwrap();
        assert_eq!(summary.failed, 2);
        assert!(!summary.is_success());
        assert_eq!(summary.total(), 2);
    }

    #[test]
    fn test_observer_sees_every_assertion() {
        struct Counting(Vec<String>);
        impl ApplyObserver for Counting {
            fn on_assertion_start(&mut self, _assertion: &ResourceAssertion) {}
            fn on_assertion_done(
                &mut self,
                assertion: &ResourceAssertion,
                _outcome: &ApplyOutcome,
            ) {
                self.0.push(assertion.key());
            }
        }

        let engine = PlanOnlyEngine::new();
        let mut observer = Counting(Vec::new());
        apply(
            &sample_catalog(),
            &engine,
            &ApplyOptions::default(),
            &mut observer,
        )
        .unwrap();
        assert_eq!(observer.0.len(), 2);
    }
}
