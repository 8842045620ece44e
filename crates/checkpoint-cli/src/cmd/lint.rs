use crate::output::print_json;
use anyhow::Context;
use checkpoint_core::{
    config::Config,
    cycle,
    entry::lint_warnings,
    history::load_history_from_root,
    writer::now_timestamp,
    CheckpointError,
};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct LintReport {
    draft_present: bool,
    valid: bool,
    issues: Vec<String>,
    warnings: Vec<String>,
    entries: usize,
    skipped_changelog: usize,
    skipped_context: usize,
}

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let history = load_history_from_root(root, usize::MAX).context("failed to read changelog")?;

    let mut report = LintReport {
        draft_present: true,
        valid: true,
        issues: Vec::new(),
        warnings: config.validate().into_iter().map(|w| w.message).collect(),
        entries: history.entries.len(),
        skipped_changelog: history.skipped_changelog,
        skipped_context: history.skipped_context,
    };

    match cycle::check_draft(root, &now_timestamp()) {
        Ok(entry) => report
            .warnings
            .extend(lint_warnings(&entry, config.summary_max_len)),
        Err(CheckpointError::NotFound(_)) => report.draft_present = false,
        Err(CheckpointError::Validation(errors)) => {
            report.valid = false;
            report.issues = errors.issues().iter().map(ToString::to_string).collect();
        }
        Err(e) => {
            report.valid = false;
            report.issues.push(e.to_string());
        }
    }

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }

    if !report.valid {
        anyhow::bail!("draft has {} problem(s)", report.issues.len());
    }
    Ok(())
}

fn print_report(report: &LintReport) {
    if !report.draft_present {
        println!("No checkpoint in progress.");
    } else if report.valid {
        println!("Draft OK.");
    } else {
        println!("Draft has problems:");
        for issue in &report.issues {
            println!("  - {issue}");
        }
    }
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
    print!("Changelog: {} checkpoint(s)", report.entries);
    let skipped = report.skipped_changelog + report.skipped_context;
    if skipped > 0 {
        print!(
            ", {skipped} unreadable document(s) skipped ({} changelog, {} context)",
            report.skipped_changelog, report.skipped_context
        );
    }
    println!();
}
