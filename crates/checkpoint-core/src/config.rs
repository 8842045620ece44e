use crate::error::Result;
use crate::paths;
use serde::Deserialize;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Optional per-project settings read from `.checkpoint-config.yaml`.
/// Every field has a default, so a missing file is the same as an empty one.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    /// How many checkpoints read commands scan by default.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Summaries longer than this draw a lint warning.
    #[serde(default = "default_summary_max_len")]
    pub summary_max_len: usize,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

fn default_version() -> u32 {
    1
}

fn default_history_limit() -> usize {
    10
}

fn default_summary_max_len() -> usize {
    80
}

fn default_search_limit() -> usize {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            history_limit: default_history_limit(),
            summary_max_len: default_summary_max_len(),
            search_limit: default_search_limit(),
        }
    }
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        let Some(data) = crate::io::read_optional(&path)? else {
            return Ok(Self::default());
        };
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&data)?)
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        for (field, value) in [
            ("history_limit", self.history_limit),
            ("summary_max_len", self.summary_max_len),
            ("search_limit", self.search_limit),
        ] {
            if value == 0 {
                warnings.push(ConfigWarning {
                    field: field.to_string(),
                    message: format!("{field} is 0; read commands will show nothing"),
                });
            }
        }
        warnings
    }
}
