use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// File constants
// ---------------------------------------------------------------------------

pub const CHANGELOG_FILE: &str = ".checkpoint-changelog.yaml";
pub const CONTEXT_FILE: &str = ".checkpoint-context.yml";
pub const INPUT_FILE: &str = ".checkpoint-input";
pub const DIFF_FILE: &str = ".checkpoint-diff";
pub const STATUS_FILE: &str = ".checkpoint-status.yaml";
pub const CONFIG_FILE: &str = ".checkpoint-config.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn changelog_path(root: &Path) -> PathBuf {
    root.join(CHANGELOG_FILE)
}

pub fn context_path(root: &Path) -> PathBuf {
    root.join(CONTEXT_FILE)
}

pub fn input_path(root: &Path) -> PathBuf {
    root.join(INPUT_FILE)
}

pub fn diff_path(root: &Path) -> PathBuf {
    root.join(DIFF_FILE)
}

pub fn status_path(root: &Path) -> PathBuf {
    root.join(STATUS_FILE)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            changelog_path(root),
            PathBuf::from("/tmp/proj/.checkpoint-changelog.yaml")
        );
        assert_eq!(
            context_path(root),
            PathBuf::from("/tmp/proj/.checkpoint-context.yml")
        );
        assert_eq!(input_path(root), PathBuf::from("/tmp/proj/.checkpoint-input"));
    }
}
