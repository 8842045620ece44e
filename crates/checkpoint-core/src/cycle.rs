//! One checkpoint cycle:
//!
//! ```text
//! Idle -> DraftPrepared -> Validated -> Appended -> Finalized
//! ```
//!
//! Appending, committing, backfilling, and clearing the draft are separate
//! filesystem steps. A crash after the append leaves the draft on disk and
//! an entry with an empty `commit_hash` at the changelog tail;
//! [`session::detect`] reports that as `AwaitingBackfill` and [`commit`]
//! resumes from there instead of appending twice.

use crate::entry::{render_commit_message, ChangelogEntry};
use crate::error::{CheckpointError, Result};
use crate::session::{self, SessionState};
use crate::status::CommitStatus;
use crate::store::StoreBackend;
use crate::vcs::VersionControl;
use crate::writer::{finalize, prepare_draft, validate_commit_hash, ChangelogWriter};
use crate::{io, paths};
use serde::Serialize;
use std::path::{Path, PathBuf};

const RECOVERY_HINT: &str = "the checkpoint entry is already in the changelog; once the commit exists run 'checkpoint backfill <hash>', or 'checkpoint abort' to drop the draft";

/// Start a cycle: snapshot status and diff, write the draft.
pub fn start_draft(root: &Path, vcs: &dyn VersionControl, now: &str) -> Result<PathBuf> {
    session::assert_not_in_progress(root)?;
    let status = vcs.status()?;
    let diff = vcs.diff()?;

    io::atomic_write(&paths::diff_path(root), diff.as_bytes())?;
    let draft = prepare_draft(&status, paths::DIFF_FILE, now);
    let input = paths::input_path(root);
    io::atomic_write(&input, draft.as_bytes())?;

    io::ensure_gitignore_entry(root, paths::INPUT_FILE)?;
    io::ensure_gitignore_entry(root, paths::DIFF_FILE)?;
    tracing::info!(path = %input.display(), "draft prepared");
    Ok(input)
}

/// Decode and validate the current draft without touching anything.
pub fn check_draft(root: &Path, now: &str) -> Result<ChangelogEntry> {
    let Some(draft) = io::read_optional(&paths::input_path(root))? else {
        return Err(no_draft());
    };
    finalize(&draft, now)
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitOutcome {
    pub entry: ChangelogEntry,
    pub commit_hash: String,
    pub message: String,
    /// True when an earlier run had already appended the entry.
    pub resumed: bool,
}

/// Finish the cycle: append, commit, backfill, record status, clear draft.
pub fn commit<B: StoreBackend>(
    root: &Path,
    writer: &ChangelogWriter<B>,
    vcs: &dyn VersionControl,
    now: &str,
) -> Result<CommitOutcome> {
    let (entry, resumed) = match session::detect(root, writer.changelog())? {
        SessionState::Idle => return Err(no_draft()),
        SessionState::DraftPrepared => {
            let draft = std::fs::read_to_string(paths::input_path(root))?;
            let entry = finalize(&draft, now)?;
            writer.append(&entry)?;
            (entry, false)
        }
        SessionState::AwaitingBackfill { entry } => {
            tracing::warn!("resuming checkpoint that was appended but never committed");
            (entry, true)
        }
    };

    let message = render_commit_message(&entry);
    let hash = vcs.stage_and_commit(&message).map_err(with_recovery_hint)?;
    finalize_commit(root, writer, entry, &hash, message, resumed)
}

/// Manual recovery: record `hash` for an appended entry and close the cycle.
pub fn backfill<B: StoreBackend>(
    root: &Path,
    writer: &ChangelogWriter<B>,
    hash: &str,
) -> Result<CommitOutcome> {
    validate_commit_hash(hash)?;
    let entry = match session::detect(root, writer.changelog())? {
        SessionState::AwaitingBackfill { entry } => entry,
        _ => {
            return Err(CheckpointError::NotFound(
                "no appended checkpoint is waiting for a commit hash".to_string(),
            ))
        }
    };
    let message = render_commit_message(&entry);
    finalize_commit(root, writer, entry, hash, message, true)
}

/// Drop the draft and scratch diff. The stores are not touched.
pub fn abort(root: &Path) -> Result<bool> {
    let was = session::is_in_progress(root);
    session::clear(root)?;
    Ok(was)
}

fn finalize_commit<B: StoreBackend>(
    root: &Path,
    writer: &ChangelogWriter<B>,
    mut entry: ChangelogEntry,
    hash: &str,
    message: String,
    resumed: bool,
) -> Result<CommitOutcome> {
    writer.backfill_commit_hash(hash)?;
    entry.commit_hash = hash.to_string();
    CommitStatus {
        last_commit_hash: hash.to_string(),
        last_commit_timestamp: entry.timestamp.clone(),
        last_commit_message: message.clone(),
    }
    .save(root)?;
    session::clear(root)?;
    tracing::info!(hash, "checkpoint finalized");
    Ok(CommitOutcome {
        entry,
        commit_hash: hash.to_string(),
        message,
        resumed,
    })
}

fn no_draft() -> CheckpointError {
    CheckpointError::NotFound("no checkpoint in progress; run 'checkpoint check' first".to_string())
}

fn with_recovery_hint(err: CheckpointError) -> CheckpointError {
    match err {
        CheckpointError::Vcs { command, message } => CheckpointError::Vcs {
            command,
            message: format!("{message} ({RECOVERY_HINT})"),
        },
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::decode_changelog_entry;
    use crate::store::DocumentStore;
    use std::cell::RefCell;
    use tempfile::TempDir;

    const NOW: &str = "2025-07-01T08:00:00Z";

    #[derive(Default)]
    struct FakeVcs {
        fail_commit: bool,
        messages: RefCell<Vec<String>>,
    }

    impl VersionControl for FakeVcs {
        fn status(&self) -> Result<String> {
            Ok(" M src/lib.rs\n".to_string())
        }

        fn diff(&self) -> Result<String> {
            Ok("diff --git a/src/lib.rs b/src/lib.rs\n".to_string())
        }

        fn stage_and_commit(&self, message: &str) -> Result<String> {
            if self.fail_commit {
                return Err(CheckpointError::Vcs {
                    command: "git commit".into(),
                    message: "simulated failure".into(),
                });
            }
            self.messages.borrow_mut().push(message.to_string());
            Ok("0badc0ffee0ddf00d".to_string())
        }
    }

    fn fill_draft(root: &Path) {
        let path = paths::input_path(root);
        let draft = std::fs::read_to_string(&path).unwrap();
        let filled = draft
            .replacen("  - summary: \"\"", "  - summary: \"Add store\"", 1)
            .replacen("change_type: \"\"", "change_type: \"feature\"", 1);
        std::fs::write(&path, filled).unwrap();
    }

    fn changelog_entries(root: &Path) -> Vec<ChangelogEntry> {
        DocumentStore::open(paths::changelog_path(root))
            .documents()
            .unwrap()
            .iter()
            .filter_map(|d| decode_changelog_entry(d))
            .collect()
    }

    #[test]
    fn full_cycle() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let vcs = FakeVcs::default();
        let writer = ChangelogWriter::for_root(root);

        start_draft(root, &vcs, NOW).unwrap();
        assert!(session::is_in_progress(root));
        assert!(paths::diff_path(root).exists());
        let gitignore = std::fs::read_to_string(root.join(".gitignore")).unwrap();
        assert!(gitignore.lines().any(|l| l == paths::INPUT_FILE));

        fill_draft(root);
        let outcome = commit(root, &writer, &vcs, NOW).unwrap();
        assert!(!outcome.resumed);
        assert_eq!(outcome.message, "feature: Add store");
        assert_eq!(vcs.messages.borrow().as_slice(), ["feature: Add store"]);

        let entries = changelog_entries(root);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].commit_hash, "0badc0ffee0ddf00d");
        assert_eq!(entries[0].timestamp, NOW);

        let status = CommitStatus::load(root).unwrap().unwrap();
        assert_eq!(status.last_commit_hash, "0badc0ffee0ddf00d");
        assert!(!session::is_in_progress(root));
        assert!(!paths::diff_path(root).exists());
    }

    #[test]
    fn second_start_is_rejected() {
        let dir = TempDir::new().unwrap();
        let vcs = FakeVcs::default();
        start_draft(dir.path(), &vcs, NOW).unwrap();
        let before = std::fs::read_to_string(paths::input_path(dir.path())).unwrap();
        assert!(matches!(
            start_draft(dir.path(), &vcs, "2030-01-01T00:00:00Z"),
            Err(CheckpointError::AlreadyInProgress)
        ));
        let after = std::fs::read_to_string(paths::input_path(dir.path())).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn invalid_draft_leaves_store_untouched() {
        let dir = TempDir::new().unwrap();
        let vcs = FakeVcs::default();
        let writer = ChangelogWriter::for_root(dir.path());
        start_draft(dir.path(), &vcs, NOW).unwrap();

        let err = commit(dir.path(), &writer, &vcs, NOW).unwrap_err();
        assert!(matches!(err, CheckpointError::Validation(_)));
        assert!(!paths::changelog_path(dir.path()).exists());
        assert!(session::is_in_progress(dir.path()));
        assert!(vcs.messages.borrow().is_empty());
    }

    #[test]
    fn commit_without_draft_is_not_found() {
        let dir = TempDir::new().unwrap();
        let writer = ChangelogWriter::for_root(dir.path());
        assert!(matches!(
            commit(dir.path(), &writer, &FakeVcs::default(), NOW),
            Err(CheckpointError::NotFound(_))
        ));
    }

    #[test]
    fn crash_between_append_and_backfill_is_detected_and_resumed() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let writer = ChangelogWriter::for_root(root);
        start_draft(root, &FakeVcs::default(), NOW).unwrap();
        fill_draft(root);

        let failing = FakeVcs {
            fail_commit: true,
            ..FakeVcs::default()
        };
        let err = commit(root, &writer, &failing, NOW).unwrap_err();
        assert!(err.to_string().contains("checkpoint backfill"));

        // Entry is durable with an empty hash; the draft is still the marker.
        let entries = changelog_entries(root);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].commit_hash, "");
        assert!(paths::input_path(root).exists());
        assert!(matches!(
            session::detect(root, writer.changelog()).unwrap(),
            SessionState::AwaitingBackfill { .. }
        ));

        let vcs = FakeVcs::default();
        let outcome = commit(root, &writer, &vcs, NOW).unwrap();
        assert!(outcome.resumed);
        let entries = changelog_entries(root);
        assert_eq!(entries.len(), 1, "resume must not append a second entry");
        assert_eq!(entries[0].commit_hash, "0badc0ffee0ddf00d");
        assert!(!session::is_in_progress(root));
    }

    #[test]
    fn retry_after_abort_appends_a_new_entry() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let writer = ChangelogWriter::for_root(root);
        let failing = FakeVcs {
            fail_commit: true,
            ..FakeVcs::default()
        };
        start_draft(root, &failing, NOW).unwrap();
        fill_draft(root);
        commit(root, &writer, &failing, NOW).unwrap_err();
        assert!(abort(root).unwrap());

        let later = "2025-07-02T08:00:00Z";
        let vcs = FakeVcs::default();
        start_draft(root, &vcs, later).unwrap();
        fill_draft(root);
        let path = paths::input_path(root);
        let draft = std::fs::read_to_string(&path)
            .unwrap()
            .replacen("  - summary: \"\"", "  - summary: \"Add retention\"", 1);
        std::fs::write(&path, draft).unwrap();
        assert_eq!(
            session::detect(root, writer.changelog()).unwrap(),
            SessionState::DraftPrepared
        );

        let outcome = commit(root, &writer, &vcs, later).unwrap();
        assert!(!outcome.resumed);
        let entries = changelog_entries(root);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].commit_hash, "");
        assert_eq!(entries[1].timestamp, later);
        assert_eq!(entries[1].commit_hash, "0badc0ffee0ddf00d");
        assert_eq!(entries[1].next_steps[0].summary, "Add retention");
    }

    #[test]
    fn manual_backfill_closes_the_cycle() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let writer = ChangelogWriter::for_root(root);
        start_draft(root, &FakeVcs::default(), NOW).unwrap();
        fill_draft(root);
        let failing = FakeVcs {
            fail_commit: true,
            ..FakeVcs::default()
        };
        commit(root, &writer, &failing, NOW).unwrap_err();

        let outcome = backfill(root, &writer, "abcdef12").unwrap();
        assert_eq!(outcome.commit_hash, "abcdef12");
        assert_eq!(changelog_entries(root)[0].commit_hash, "abcdef12");
        assert!(!session::is_in_progress(root));
    }

    #[test]
    fn backfill_without_pending_entry_is_not_found() {
        let dir = TempDir::new().unwrap();
        let writer = ChangelogWriter::for_root(dir.path());
        assert!(matches!(
            backfill(dir.path(), &writer, "abcdef12"),
            Err(CheckpointError::NotFound(_))
        ));
    }

    #[test]
    fn abort_clears_draft_only() {
        let dir = TempDir::new().unwrap();
        start_draft(dir.path(), &FakeVcs::default(), NOW).unwrap();
        assert!(abort(dir.path()).unwrap());
        assert!(!session::is_in_progress(dir.path()));
        assert!(!abort(dir.path()).unwrap());
    }

    #[test]
    fn check_draft_reports_without_side_effects() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(check_draft(dir.path(), NOW), Err(CheckpointError::NotFound(_))));
        start_draft(dir.path(), &FakeVcs::default(), NOW).unwrap();
        assert!(matches!(check_draft(dir.path(), NOW), Err(CheckpointError::Validation(_))));
        fill_draft(dir.path());
        assert_eq!(check_draft(dir.path(), NOW).unwrap().changes[0].summary, "Add store");
        assert!(session::is_in_progress(dir.path()));
    }
}
