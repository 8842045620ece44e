use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("draft is invalid: {0}")]
    Validation(ValidationErrors),

    #[error("checkpoint already in progress: finish it with 'checkpoint commit' or discard it with 'checkpoint abort'")]
    AlreadyInProgress,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid commit hash '{0}': expected 4-64 hex characters")]
    InvalidHash(String),

    #[error("`{command}` failed: {message}")]
    Vcs { command: String, message: String },

    #[error("search error: {0}")]
    Search(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, CheckpointError>;

// ---------------------------------------------------------------------------
// Validation issues
// ---------------------------------------------------------------------------

/// One problem found in a draft. Missing fields and out-of-enum values are
/// kept apart so callers can tell "fill this in" from "pick a valid value".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    Missing {
        field: String,
    },
    InvalidValue {
        field: String,
        value: String,
        allowed: &'static [&'static str],
    },
}

impl ValidationIssue {
    pub fn field(&self) -> &str {
        match self {
            ValidationIssue::Missing { field } | ValidationIssue::InvalidValue { field, .. } => {
                field
            }
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::Missing { field } => write!(f, "missing required field '{field}'"),
            ValidationIssue::InvalidValue {
                field,
                value,
                allowed,
            } => write!(
                f,
                "invalid value '{value}' for '{field}' (expected one of: {})",
                allowed.join(", ")
            ),
        }
    }
}

/// Every issue found in a draft, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationIssue>);

impl ValidationErrors {
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_and_invalid_render_differently() {
        let missing = ValidationIssue::Missing {
            field: "changes[0].change_type".to_string(),
        };
        let invalid = ValidationIssue::InvalidValue {
            field: "changes[0].change_type".to_string(),
            value: "enhancement".to_string(),
            allowed: &["feature", "fix"],
        };
        assert!(missing.to_string().starts_with("missing required field"));
        assert!(invalid.to_string().contains("invalid value 'enhancement'"));
        assert_eq!(missing.field(), invalid.field());
    }

    #[test]
    fn validation_errors_list_every_issue() {
        let err = CheckpointError::Validation(ValidationErrors(vec![
            ValidationIssue::Missing {
                field: "changes[0].summary".to_string(),
            },
            ValidationIssue::Missing {
                field: "changes[0].change_type".to_string(),
            },
        ]));
        let msg = err.to_string();
        assert!(msg.contains("changes[0].summary"));
        assert!(msg.contains("changes[0].change_type"));
    }
}
