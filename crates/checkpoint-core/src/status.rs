//! Last-commit record in `.checkpoint-status.yaml`. Overwritten on every
//! finalized checkpoint; informational only.

use crate::error::Result;
use crate::{io, paths};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitStatus {
    #[serde(default)]
    pub last_commit_hash: String,
    #[serde(default)]
    pub last_commit_timestamp: String,
    #[serde(default)]
    pub last_commit_message: String,
}

impl CommitStatus {
    /// `None` when no checkpoint has been finalized yet.
    pub fn load(root: &Path) -> Result<Option<Self>> {
        let Some(data) = io::read_optional(&paths::status_path(root))? else {
            return Ok(None);
        };
        if data.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_yaml::from_str(&data)?))
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        io::atomic_write(&paths::status_path(root), data.as_bytes())
    }
}
