use crate::error::{CheckpointError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// The three version-control operations a checkpoint cycle needs.
pub trait VersionControl {
    /// Short working-tree status.
    fn status(&self) -> Result<String>;
    /// Diff of everything that the next commit would contain.
    fn diff(&self) -> Result<String>;
    /// Stage all changes, commit with `message`, and return the new commit id.
    fn stage_and_commit(&self, message: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// GitCli
// ---------------------------------------------------------------------------

/// [`VersionControl`] backed by the `git` binary on PATH.
#[derive(Debug, Clone)]
pub struct GitCli {
    root: PathBuf,
    git: PathBuf,
}

impl GitCli {
    pub fn new(root: &Path) -> Result<Self> {
        let git = which::which("git").map_err(|_| CheckpointError::Vcs {
            command: "git".to_string(),
            message: "git not found on PATH".to_string(),
        })?;
        Ok(Self {
            root: root.to_path_buf(),
            git,
        })
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.git)
            .args(args)
            .current_dir(&self.root)
            .output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Err(CheckpointError::Vcs {
                command: format!("git {}", args.join(" ")),
                message: if stderr.is_empty() { stdout } else { stderr },
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn has_head(&self) -> bool {
        self.run(&["rev-parse", "--verify", "--quiet", "HEAD"]).is_ok()
    }
}

impl VersionControl for GitCli {
    fn status(&self) -> Result<String> {
        self.run(&["status", "--short"])
    }

    fn diff(&self) -> Result<String> {
        if self.has_head() {
            self.run(&["diff", "HEAD"])
        } else {
            // Fresh repository: nothing to diff against yet.
            self.run(&["diff"])
        }
    }

    fn stage_and_commit(&self, message: &str) -> Result<String> {
        self.run(&["add", "-A"])?;
        self.run(&["commit", "-m", message])?;
        Ok(self.run(&["rev-parse", "HEAD"])?.trim().to_string())
    }
}
