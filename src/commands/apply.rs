//! `converge apply` - compile a node and converge it
//!
//! The shipped engine is plan-only: it reports everything as absent and
//! records what it would create, so apply shows the full convergence flow
//! without mutating the system.

use super::compile_node;
use crate::schema::SiteConfig;
use crate::{ui, Context};
use anyhow::Result;
use catalog::{
    apply, compute_diffs, ApplyObserver, ApplyOptions, ApplyOutcome, ApplySummary, DiffSummary,
    PlanOnlyEngine, ResourceAssertion,
};
use colored::Colorize;

pub fn run(ctx: &Context, config: &SiteConfig, node: &str, dry_run: bool, yes: bool) -> Result<()> {
    let compiled = compile_node(config, node)?;
    let engine = PlanOnlyEngine::new();

    let diffs = compute_diffs(&engine, &compiled.catalog)?;
    if diffs.is_empty() {
        ui::success(&format!("node '{node}' is already converged"));
        return Ok(());
    }

    let summary = DiffSummary::from_diffs(&diffs);
    let role = compiled.role.as_deref().unwrap_or("?");
    ui::header(&format!("{node} (role {role})"));
    for diff in &diffs {
        let marker = if diff.is_addition() { "+" } else { "~" };
        println!("  {} {}", marker.green().bold(), diff.key);
        if ctx.verbose > 0 {
            for (key, value) in &diff.desired {
                ui::dim(&format!("{key} = {value}"));
            }
        }
    }
    println!();
    ui::info(&format!(
        "{} to create, {} to modify",
        summary.additions, summary.modifications
    ));

    if !dry_run && !yes {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt("Apply changes?")
            .default(false)
            .interact()?;
        if !confirmed {
            ui::warn("aborted");
            return Ok(());
        }
    }

    let mut observer = PrintObserver { quiet: ctx.quiet };
    let opts = ApplyOptions { dry_run };
    let summary = apply(&compiled.catalog, &engine, &opts, &mut observer)?;
    print_summary(&summary);

    if summary.is_success() {
        Ok(())
    } else {
        anyhow::bail!("{} assertion(s) failed to converge", summary.failed)
    }
}

struct PrintObserver {
    quiet: bool,
}

impl ApplyObserver for PrintObserver {
    fn on_assertion_start(&mut self, _assertion: &ResourceAssertion) {}

    fn on_assertion_done(&mut self, assertion: &ResourceAssertion, outcome: &ApplyOutcome) {
        if self.quiet {
            return;
        }
        let line = match outcome {
            ApplyOutcome::NoChange => format!("{} {}", "·".dimmed(), assertion.key().dimmed()),
            ApplyOutcome::Created => format!("{} {}", "+".green(), assertion.key()),
            ApplyOutcome::Modified => format!("{} {}", "~".yellow(), assertion.key()),
            ApplyOutcome::Skipped { reason } => {
                format!("{} {} ({reason})", "-".dimmed(), assertion.key().dimmed())
            }
            ApplyOutcome::Failed { error } => {
                format!("{} {} ({error})", "✗".red(), assertion.key().red())
            }
        };
        println!("  {line}");
    }
}

fn print_summary(summary: &ApplySummary) {
    println!();
    ui::info(&format!(
        "{} created, {} modified, {} unchanged, {} skipped, {} failed",
        summary.created, summary.modified, summary.no_change, summary.skipped, summary.failed
    ));
}
