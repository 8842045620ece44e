use crate::output::print_json;
use anyhow::Context;
use checkpoint_core::{
    history::{
        load_history_from_root, rank_next_steps, render_decisions, render_failed,
        render_next_steps, render_patterns, short_hash,
    },
    paths,
    session::{self, SessionState},
    status::CommitStatus,
    store::DocumentStore,
};
use std::path::Path;

pub fn run(root: &Path, limit: Option<usize>, json: bool) -> anyhow::Result<()> {
    let limit = super::history_limit(root, limit)?;
    let changelog = DocumentStore::open(paths::changelog_path(root));
    let state = session::detect(root, &changelog).context("failed to inspect session")?;
    let status = CommitStatus::load(root).context("failed to read status file")?;
    let history = load_history_from_root(root, limit).context("failed to read changelog")?;

    if json {
        return print_json(&serde_json::json!({
            "session": state,
            "last_commit": status,
            "next_steps": rank_next_steps(&history.next_steps),
            "patterns": history.patterns,
            "decisions": history.decisions,
            "failed_approaches": history.failed_approaches,
        }));
    }

    match &state {
        SessionState::Idle => println!("Session: idle. Run `checkpoint check` to start a checkpoint."),
        SessionState::DraftPrepared => println!(
            "Session: draft in progress ({}). Finish with `checkpoint commit` or `checkpoint abort`.",
            paths::INPUT_FILE
        ),
        SessionState::AwaitingBackfill { entry } => println!(
            "Session: checkpoint {} was appended but never committed.\n  \
             Run `checkpoint commit` to retry, or `checkpoint backfill <hash>` if the commit exists.",
            entry.timestamp
        ),
    }
    if let Some(status) = status {
        println!(
            "Last commit: {}  {}  ({})",
            short_hash(&status.last_commit_hash),
            status.last_commit_message,
            status.last_commit_timestamp
        );
    }
    println!();
    print!("{}", render_next_steps(&history));
    if !history.is_empty() {
        println!();
        print!("{}", render_patterns(&history));
        println!();
        print!("{}", render_decisions(&history));
        println!();
        print!("{}", render_failed(&history));
    }
    Ok(())
}
