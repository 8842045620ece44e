use checkpoint_core::paths::CHANGELOG_FILE;
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `CHECKPOINT_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for the changelog file
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    if let Some(dir) = find_upward(&cwd, |d| d.join(CHANGELOG_FILE).is_file()) {
        return dir;
    }
    if let Some(dir) = find_upward(&cwd, |d| d.join(".git").exists()) {
        return dir;
    }
    cwd
}

fn find_upward(start: &Path, found: impl Fn(&Path) -> bool) -> Option<PathBuf> {
    start.ancestors().find(|d| found(d)).map(Path::to_path_buf)
}
