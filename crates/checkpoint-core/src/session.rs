//! Single-checkpoint-in-flight guard.
//!
//! The draft file (`.checkpoint-input`) is the in-progress marker. The check
//! is cooperative: two invocations racing on [`assert_not_in_progress`] can
//! both pass before either writes a draft.

use crate::entry::{decode_changelog_entry, ChangelogEntry};
use crate::error::{CheckpointError, Result};
use crate::store::{DocumentStore, StoreBackend};
use crate::writer::finalize;
use crate::{io, paths};
use serde::Serialize;
use std::path::Path;

pub fn is_in_progress(root: &Path) -> bool {
    paths::input_path(root).exists()
}

pub fn assert_not_in_progress(root: &Path) -> Result<()> {
    if is_in_progress(root) {
        return Err(CheckpointError::AlreadyInProgress);
    }
    Ok(())
}

/// Remove the draft and the scratch diff. Missing files are fine.
pub fn clear(root: &Path) -> Result<()> {
    io::remove_if_exists(&paths::input_path(root))?;
    io::remove_if_exists(&paths::diff_path(root))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Where the current checkpoint cycle stands, as observed on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// No draft on disk.
    Idle,
    /// A draft exists and has not been appended yet.
    DraftPrepared,
    /// A draft exists and its entry is already the changelog tail with no
    /// commit hash: an earlier run stopped between append and backfill.
    AwaitingBackfill { entry: ChangelogEntry },
}

pub fn detect<B: StoreBackend>(root: &Path, changelog: &DocumentStore<B>) -> Result<SessionState> {
    let Some(draft_text) = io::read_optional(&paths::input_path(root))? else {
        return Ok(SessionState::Idle);
    };
    let Some(tail) = changelog
        .last_document()?
        .as_deref()
        .and_then(decode_changelog_entry)
    else {
        return Ok(SessionState::DraftPrepared);
    };
    if !tail.commit_hash.trim().is_empty() {
        return Ok(SessionState::DraftPrepared);
    }

    let Ok(draft) = serde_yaml::from_str::<ChangelogEntry>(&draft_text) else {
        return Ok(SessionState::DraftPrepared);
    };
    let appended = if draft.timestamp.trim().is_empty() {
        // The timestamp was filled in at append time: only an identical
        // entry counts as this draft.
        finalize(&draft_text, &tail.timestamp).is_ok_and(|e| {
            e == ChangelogEntry {
                commit_hash: String::new(),
                ..tail.clone()
            }
        })
    } else {
        draft.timestamp.trim() == tail.timestamp.trim()
    };

    if appended {
        tracing::warn!(timestamp = %tail.timestamp, "found appended checkpoint without a commit hash");
        return Ok(SessionState::AwaitingBackfill { entry: tail });
    }
    Ok(SessionState::DraftPrepared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use tempfile::TempDir;

    const DRAFT: &str = "timestamp: \"2025-05-01T09:00:00Z\"\nchanges:\n  - summary: Add cache\n    change_type: feature\n";

    #[test]
    fn in_progress_follows_draft_file() {
        let dir = TempDir::new().unwrap();
        assert!(!is_in_progress(dir.path()));
        assert!(assert_not_in_progress(dir.path()).is_ok());

        std::fs::write(paths::input_path(dir.path()), DRAFT).unwrap();
        assert!(is_in_progress(dir.path()));
        assert!(matches!(
            assert_not_in_progress(dir.path()),
            Err(CheckpointError::AlreadyInProgress)
        ));
    }

    #[test]
    fn clear_removes_draft_and_diff() {
        let dir = TempDir::new().unwrap();
        std::fs::write(paths::input_path(dir.path()), DRAFT).unwrap();
        std::fs::write(paths::diff_path(dir.path()), "diff").unwrap();
        clear(dir.path()).unwrap();
        assert!(!paths::input_path(dir.path()).exists());
        assert!(!paths::diff_path(dir.path()).exists());
        clear(dir.path()).unwrap();
    }

    #[test]
    fn detect_idle_and_prepared() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(MemoryBackend::new());
        assert_eq!(detect(dir.path(), &store).unwrap(), SessionState::Idle);

        std::fs::write(paths::input_path(dir.path()), DRAFT).unwrap();
        assert_eq!(detect(dir.path(), &store).unwrap(), SessionState::DraftPrepared);
    }

    #[test]
    fn detect_appended_without_hash() {
        let dir = TempDir::new().unwrap();
        std::fs::write(paths::input_path(dir.path()), DRAFT).unwrap();
        let store = DocumentStore::new(MemoryBackend::with_content(format!(
            "---\n{DRAFT}commit_hash: \"\"\n"
        )));
        match detect(dir.path(), &store).unwrap() {
            SessionState::AwaitingBackfill { entry } => {
                assert_eq!(entry.changes[0].summary, "Add cache");
            }
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn detect_needs_matching_timestamp() {
        let dir = TempDir::new().unwrap();
        let later = DRAFT.replace("2025-05-01T09:00:00Z", "2025-06-01T09:00:00Z");
        std::fs::write(paths::input_path(dir.path()), later).unwrap();
        let store = DocumentStore::new(MemoryBackend::with_content(format!(
            "---\n{DRAFT}commit_hash: \"\"\n"
        )));
        assert_eq!(detect(dir.path(), &store).unwrap(), SessionState::DraftPrepared);
    }

    #[test]
    fn detect_blank_timestamp_draft_needs_identical_entry() {
        let dir = TempDir::new().unwrap();
        let tail = format!("---\n{DRAFT}commit_hash: \"\"\n");
        let blank = DRAFT.replace("\"2025-05-01T09:00:00Z\"", "\"\"");
        std::fs::write(paths::input_path(dir.path()), &blank).unwrap();
        let store = DocumentStore::new(MemoryBackend::with_content(tail.clone()));
        assert!(matches!(
            detect(dir.path(), &store).unwrap(),
            SessionState::AwaitingBackfill { .. }
        ));

        let extended = format!("{blank}next_steps:\n  - summary: New step\n");
        std::fs::write(paths::input_path(dir.path()), extended).unwrap();
        let store = DocumentStore::new(MemoryBackend::with_content(tail));
        assert_eq!(detect(dir.path(), &store).unwrap(), SessionState::DraftPrepared);
    }

    #[test]
    fn detect_ignores_tail_that_already_has_hash() {
        let dir = TempDir::new().unwrap();
        std::fs::write(paths::input_path(dir.path()), DRAFT).unwrap();
        let store = DocumentStore::new(MemoryBackend::with_content(format!(
            "---\n{DRAFT}commit_hash: abc12345\n"
        )));
        assert_eq!(detect(dir.path(), &store).unwrap(), SessionState::DraftPrepared);
    }
}
