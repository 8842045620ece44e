use crate::output::print_json;
use anyhow::Context;
use checkpoint_core::{cycle, paths, vcs::GitCli, writer::now_timestamp};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let vcs = GitCli::new(root).context("git is required to start a checkpoint")?;
    let draft = cycle::start_draft(root, &vcs, &now_timestamp())
        .context("failed to start checkpoint")?;

    if json {
        print_json(&serde_json::json!({
            "draft": draft,
            "diff": paths::diff_path(root),
        }))?;
    } else {
        println!("Draft written to {}", draft.display());
        println!("  Diff: {}", paths::diff_path(root).display());
        println!("  Fill in the draft, then run: checkpoint commit");
    }
    Ok(())
}
