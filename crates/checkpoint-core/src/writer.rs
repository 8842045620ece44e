//! Changelog Writer: draft template, finalize, append, hash backfill.

use crate::entry::{
    decode_changelog_entry, decode_context_entry, is_meta_document, validate_draft,
    ChangelogEntry, ContextEntry, MetaDocument,
};
use crate::error::{CheckpointError, Result, ValidationErrors};
use crate::store::{DocumentStore, FileBackend, StoreBackend};
use crate::paths;
use chrono::{SecondsFormat, Utc};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Current time as an RFC 3339 UTC timestamp, second precision.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

// ---------------------------------------------------------------------------
// Draft template
// ---------------------------------------------------------------------------

/// Fill-in-the-blanks draft embedding the working-tree status and pointing at
/// the diff artifact. Pure: writing it is the caller's job.
pub fn prepare_draft(status: &str, diff_file: &str, timestamp: &str) -> String {
    let mut out = String::new();
    out.push_str("# Checkpoint draft. Fill in the fields below, then run `checkpoint commit`.\n");
    out.push_str("# `checkpoint lint` checks the draft; `checkpoint abort` discards it.\n");
    out.push_str("#\n");
    out.push_str("# change_type: feature | fix | refactor | docs | perf | other\n");
    out.push_str("# priority:    high | med | low\n");
    out.push_str("# Keep each summary under 80 characters. Delete unused list items.\n");
    out.push_str("#\n");
    out.push_str(&format!("# Full diff: {diff_file}\n"));
    out.push_str("#\n");
    out.push_str("# git status:\n");
    let lines: Vec<&str> = status.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        out.push_str("#   (clean)\n");
    }
    for line in lines {
        out.push_str(&format!("#   {line}\n"));
    }
    out.push_str(&format!(
        r#"schema_version: "{schema}"
timestamp: "{timestamp}"
commit_hash: ""
changes:
  - summary: ""
    details: ""
    change_type: ""
    scope: ""
next_steps:
  - summary: ""
    details: ""
    priority: ""
    scope: ""
context:
  problem_statement: ""
  key_insights: []
  decisions_made: []
  established_patterns: []
  failed_approaches: []
  conversation_context: []
"#,
        schema = crate::entry::SCHEMA_VERSION,
    ));
    out
}

// ---------------------------------------------------------------------------
// Finalize
// ---------------------------------------------------------------------------

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Drop template leftovers: blank next steps, empty optional strings, an
/// empty context block.
fn normalize(entry: &mut ChangelogEntry) {
    for change in &mut entry.changes {
        change.summary = change.summary.trim().to_string();
        change.change_type = change.change_type.trim().to_ascii_lowercase();
        change.details = non_blank(change.details.take());
        change.scope = non_blank(change.scope.take());
    }
    entry.next_steps.retain(|s| {
        !s.summary.trim().is_empty()
            || !s.priority.trim().is_empty()
            || s.details.as_deref().is_some_and(|d| !d.trim().is_empty())
    });
    for step in &mut entry.next_steps {
        step.summary = step.summary.trim().to_string();
        step.priority = step.priority.trim().to_string();
        step.details = non_blank(step.details.take());
        step.scope = non_blank(step.scope.take());
    }
    if entry.context.as_ref().is_some_and(|c| c.is_empty()) {
        entry.context = None;
    }
}

/// Decode and validate a draft. Every problem is reported at once; the
/// returned entry has a timestamp and an empty commit hash.
pub fn finalize(draft: &str, now: &str) -> Result<ChangelogEntry> {
    let mut entry: ChangelogEntry = serde_yaml::from_str(draft)?;
    if entry.timestamp.trim().is_empty() {
        entry.timestamp = now.to_string();
    }
    let issues = validate_draft(&entry);
    if !issues.is_empty() {
        return Err(CheckpointError::Validation(ValidationErrors(issues)));
    }
    entry.commit_hash.clear();
    normalize(&mut entry);
    Ok(entry)
}

// ---------------------------------------------------------------------------
// Hash validation
// ---------------------------------------------------------------------------

static HASH_RE: OnceLock<Regex> = OnceLock::new();

fn hash_re() -> &'static Regex {
    HASH_RE.get_or_init(|| Regex::new(r"^[0-9a-fA-F]{4,64}$").unwrap())
}

pub fn validate_commit_hash(hash: &str) -> Result<()> {
    if !hash_re().is_match(hash) {
        return Err(CheckpointError::InvalidHash(hash.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ChangelogWriter
// ---------------------------------------------------------------------------

/// Sole writer of the changelog and context stores.
#[derive(Debug)]
pub struct ChangelogWriter<B> {
    changelog: DocumentStore<B>,
    context: DocumentStore<B>,
}

impl ChangelogWriter<FileBackend> {
    pub fn for_root(root: &Path) -> Self {
        Self::new(
            DocumentStore::open(paths::changelog_path(root)),
            DocumentStore::open(paths::context_path(root)),
        )
    }
}

impl<B: StoreBackend> ChangelogWriter<B> {
    pub fn new(changelog: DocumentStore<B>, context: DocumentStore<B>) -> Self {
        Self { changelog, context }
    }

    pub fn changelog(&self) -> &DocumentStore<B> {
        &self.changelog
    }

    pub fn context(&self) -> &DocumentStore<B> {
        &self.context
    }

    /// Append the entry, plus its context as a separate document when it
    /// has one. An empty changelog gets its meta document first.
    pub fn append(&self, entry: &ChangelogEntry) -> Result<()> {
        if self.changelog.is_empty()? {
            let meta = serde_yaml::to_string(&MetaDocument::new(entry.timestamp.clone()))?;
            self.changelog.append_document(&meta)?;
        }
        self.changelog.append_document(&entry.to_yaml()?)?;

        if let Some(ctx) = entry.context.as_ref().filter(|c| !c.is_empty()) {
            let doc = ContextEntry::from_entry(entry, ctx.clone());
            self.context.append_document(&doc.to_yaml()?)?;
        }
        tracing::debug!(timestamp = %entry.timestamp, "appended checkpoint");
        Ok(())
    }

    /// Record `hash` on the changelog tail, and on the context tail when it
    /// belongs to the same checkpoint. Refuses to touch a tail that is not a
    /// checkpoint entry.
    pub fn backfill_commit_hash(&self, hash: &str) -> Result<()> {
        validate_commit_hash(hash)?;
        let tail = self.changelog.last_document()?;
        if self.changelog.is_empty()? || tail.as_deref().is_some_and(is_meta_document) {
            return Err(CheckpointError::NotFound(
                "changelog has no entries to backfill".to_string(),
            ));
        }
        let Some(entry) = tail.as_deref().and_then(decode_changelog_entry) else {
            return Err(CheckpointError::NotFound(
                "last changelog document is not a checkpoint entry".to_string(),
            ));
        };
        self.changelog
            .backfill_last_document_field("commit_hash", hash)?;

        let ctx_tail = self
            .context
            .last_document()?
            .as_deref()
            .and_then(decode_context_entry);
        if let Some(ctx) = ctx_tail {
            if ctx.timestamp == entry.timestamp && ctx.commit_hash.trim().is_empty() {
                self.context
                    .backfill_last_document_field("commit_hash", hash)?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
