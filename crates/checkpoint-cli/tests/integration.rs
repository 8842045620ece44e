#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn checkpoint(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("checkpoint").unwrap();
    cmd.current_dir(dir.path())
        .env("CHECKPOINT_ROOT", dir.path())
        .env("GIT_AUTHOR_NAME", "Test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com");
    cmd
}

fn has_git() -> bool {
    which::which("git").is_ok()
}

fn git(dir: &Path, args: &[&str]) {
    let status = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .status()
        .unwrap();
    assert!(status.success(), "git {args:?} failed");
}

fn init_repo(dir: &TempDir) {
    git(dir.path(), &["init", "-q"]);
    std::fs::write(dir.path().join("README.md"), "# demo\n").unwrap();
}

const FILLED_DRAFT: &str = r#"schema_version: "1"
timestamp: ""
commit_hash: ""
changes:
  - summary: Add response cache
    change_type: feature
    scope: api
next_steps:
  - summary: Add cache eviction metrics
    priority: high
  - summary: Document cache settings
    priority: low
context:
  problem_statement: Repeated lookups were slow
  decisions_made:
    - decision: Use an LRU cache
      rationale: bounded memory
  established_patterns:
    - pattern: Wrap storage behind a trait
      rationale: easy to fake in tests
  failed_approaches:
    - approach: TTL-only expiry
      why_failed: unbounded growth
"#;

const SEEDED_CHANGELOG: &str = r#"---
document: meta
schema_version: "1"
created_at: "2025-01-01T00:00:00Z"
tool: checkpoint
---
schema_version: "1"
timestamp: "2025-01-02T10:00:00Z"
commit_hash: "abcdef1234567890"
changes:
  - summary: Introduce tokenizer
    change_type: feature
next_steps:
  - summary: Handle unicode identifiers
    priority: med
"#;

// ---------------------------------------------------------------------------
// Empty project
// ---------------------------------------------------------------------------

#[test]
fn start_on_empty_project_reports_no_checkpoints() {
    let dir = TempDir::new().unwrap();
    checkpoint(&dir)
        .arg("start")
        .assert()
        .success()
        .stdout(predicate::str::contains("No checkpoints yet."))
        .stdout(predicate::str::contains("idle"));
}

#[test]
fn explain_rejects_unknown_section() {
    let dir = TempDir::new().unwrap();
    checkpoint(&dir)
        .args(["explain", "tools"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown section 'tools'"));
}

#[test]
fn abort_without_draft_is_a_noop() {
    let dir = TempDir::new().unwrap();
    checkpoint(&dir)
        .arg("abort")
        .assert()
        .success()
        .stdout(predicate::str::contains("No checkpoint in progress."));
}

#[test]
fn commit_without_draft_fails() {
    if !has_git() {
        return;
    }
    let dir = TempDir::new().unwrap();
    init_repo(&dir);
    checkpoint(&dir)
        .arg("commit")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no checkpoint in progress").or(
            predicate::str::contains("not found"),
        ));
}

#[test]
fn backfill_rejects_bad_hash() {
    let dir = TempDir::new().unwrap();
    checkpoint(&dir)
        .args(["backfill", "not-a-hash"])
        .assert()
        .failure();
}

// ---------------------------------------------------------------------------
// Existing changelog
// ---------------------------------------------------------------------------

#[test]
fn explain_sections_read_seeded_changelog() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".checkpoint-changelog.yaml"), SEEDED_CHANGELOG).unwrap();

    checkpoint(&dir)
        .args(["explain", "history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Introduce tokenizer"))
        .stdout(predicate::str::contains("abcdef12"));

    checkpoint(&dir)
        .args(["explain", "next-steps"])
        .assert()
        .success()
        .stdout(predicate::str::contains("### Medium"))
        .stdout(predicate::str::contains("Handle unicode identifiers"));
}

#[test]
fn explain_json_has_requested_section_only() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".checkpoint-changelog.yaml"), SEEDED_CHANGELOG).unwrap();

    let out = checkpoint(&dir)
        .args(["--json", "explain", "next-steps"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let steps = value["next-steps"].as_array().unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0]["summary"], "Handle unicode identifiers");
    assert!(value.get("history").is_none());
}

#[test]
fn search_finds_seeded_entry() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(".checkpoint-changelog.yaml"), SEEDED_CHANGELOG).unwrap();

    checkpoint(&dir)
        .args(["search", "tokenizer"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Introduce tokenizer"));

    checkpoint(&dir)
        .args(["search", "nonexistentword"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No checkpoints match"));
}

#[test]
fn lint_skips_unreadable_documents() {
    let dir = TempDir::new().unwrap();
    let content = format!("{SEEDED_CHANGELOG}---\n: : not yaml [\n");
    std::fs::write(dir.path().join(".checkpoint-changelog.yaml"), content).unwrap();

    checkpoint(&dir)
        .arg("lint")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 checkpoint(s)"))
        .stdout(predicate::str::contains("unreadable document(s) skipped"));
}

// ---------------------------------------------------------------------------
// Full cycle (requires git)
// ---------------------------------------------------------------------------

#[test]
fn check_twice_is_rejected_until_abort() {
    if !has_git() {
        return;
    }
    let dir = TempDir::new().unwrap();
    init_repo(&dir);

    checkpoint(&dir).arg("check").assert().success();
    assert!(dir.path().join(".checkpoint-input").exists());
    assert!(dir.path().join(".checkpoint-diff").exists());

    checkpoint(&dir)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("in progress"));

    checkpoint(&dir)
        .arg("abort")
        .assert()
        .success()
        .stdout(predicate::str::contains("Discarded"));
    assert!(!dir.path().join(".checkpoint-input").exists());
    assert!(!dir.path().join(".checkpoint-changelog.yaml").exists());

    checkpoint(&dir).arg("check").assert().success();
}

#[test]
fn lint_fails_on_blank_template() {
    if !has_git() {
        return;
    }
    let dir = TempDir::new().unwrap();
    init_repo(&dir);
    checkpoint(&dir).arg("check").assert().success();

    checkpoint(&dir)
        .arg("lint")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Draft has problems"))
        .stdout(predicate::str::contains("summary"));

    // A failed commit leaves the draft and changelog alone.
    checkpoint(&dir).arg("commit").assert().failure();
    assert!(dir.path().join(".checkpoint-input").exists());
    assert!(!dir.path().join(".checkpoint-changelog.yaml").exists());
}

#[test]
fn full_cycle_commits_and_surfaces_next_steps() {
    if !has_git() {
        return;
    }
    let dir = TempDir::new().unwrap();
    init_repo(&dir);

    checkpoint(&dir).arg("check").assert().success();
    std::fs::write(dir.path().join(".checkpoint-input"), FILLED_DRAFT).unwrap();

    checkpoint(&dir)
        .arg("lint")
        .assert()
        .success()
        .stdout(predicate::str::contains("Draft OK."));

    checkpoint(&dir)
        .arg("commit")
        .assert()
        .success()
        .stdout(predicate::str::contains("feature(api): Add response cache"));

    assert!(!dir.path().join(".checkpoint-input").exists());
    assert!(!dir.path().join(".checkpoint-diff").exists());

    let changelog =
        std::fs::read_to_string(dir.path().join(".checkpoint-changelog.yaml")).unwrap();
    assert!(changelog.starts_with("---\n"));
    assert!(changelog.contains("document: meta"));
    assert!(changelog.contains("Add response cache"));
    assert!(!changelog.contains("commit_hash: ''"));

    let status = std::fs::read_to_string(dir.path().join(".checkpoint-status.yaml")).unwrap();
    assert!(status.contains("last_commit_hash"));

    let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
    assert!(gitignore.contains(".checkpoint-input"));

    checkpoint(&dir)
        .arg("start")
        .assert()
        .success()
        .stdout(predicate::str::contains("### High"))
        .stdout(predicate::str::contains("Add cache eviction metrics"))
        .stdout(predicate::str::contains("Wrap storage behind a trait"))
        .stdout(predicate::str::contains("Use an LRU cache"))
        .stdout(predicate::str::contains("TTL-only expiry"));
}
