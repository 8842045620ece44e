pub mod abort;
pub mod check;
pub mod commit;
pub mod explain;
pub mod lint;
pub mod search;
pub mod start;

use checkpoint_core::config::Config;
use std::path::Path;

/// Config for `root`, with the `--limit` override applied.
pub(crate) fn history_limit(root: &Path, limit: Option<usize>) -> anyhow::Result<usize> {
    use anyhow::Context;
    let config = Config::load(root).context("failed to load config")?;
    Ok(limit.unwrap_or(config.history_limit))
}
