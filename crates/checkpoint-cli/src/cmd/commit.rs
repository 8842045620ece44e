use crate::output::print_json;
use anyhow::Context;
use checkpoint_core::{
    cycle::{self, CommitOutcome},
    history::short_hash,
    vcs::GitCli,
    writer::{now_timestamp, ChangelogWriter},
};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let vcs = GitCli::new(root).context("git is required to commit a checkpoint")?;
    let writer = ChangelogWriter::for_root(root);
    let outcome = cycle::commit(root, &writer, &vcs, &now_timestamp())
        .context("checkpoint commit failed")?;
    report(&outcome, json)
}

pub fn backfill(root: &Path, hash: &str, json: bool) -> anyhow::Result<()> {
    let writer = ChangelogWriter::for_root(root);
    let outcome = cycle::backfill(root, &writer, hash).context("backfill failed")?;
    report(&outcome, json)
}

fn report(outcome: &CommitOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(outcome);
    }
    if outcome.resumed {
        println!("Resumed checkpoint appended by an earlier run.");
    }
    println!(
        "Committed {}  {}",
        short_hash(&outcome.commit_hash),
        outcome.message
    );
    let extra = outcome.entry.changes.len().saturating_sub(1);
    if extra > 0 {
        println!("  (+{extra} more change(s) recorded in the changelog)");
    }
    if !outcome.entry.next_steps.is_empty() {
        println!("  {} next step(s) recorded", outcome.entry.next_steps.len());
    }
    Ok(())
}
