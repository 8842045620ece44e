use crate::output::{print_json, print_table};
use anyhow::Context;
use checkpoint_core::{
    config::Config,
    history::{load_history_from_root, short_hash},
    search::CheckpointIndex,
};
use std::path::Path;

pub fn run(root: &Path, query: &str, limit: Option<usize>, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let history = load_history_from_root(root, usize::MAX).context("failed to read changelog")?;
    let index = CheckpointIndex::build(&history.entries).context("failed to build search index")?;
    let results = index
        .search(query, limit.unwrap_or(config.search_limit))
        .context("search failed")?;

    if json {
        return print_json(&results);
    }

    if results.is_empty() {
        println!("No checkpoints match '{query}'.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = results
        .iter()
        .map(|r| {
            vec![
                short_hash(&r.commit_hash).to_string(),
                r.timestamp.clone(),
                r.change_type.clone(),
                r.summary.clone(),
                format!("{:.2}", r.score),
            ]
        })
        .collect();
    print_table(&["HASH", "TIMESTAMP", "TYPE", "SUMMARY", "SCORE"], rows);
    Ok(())
}
