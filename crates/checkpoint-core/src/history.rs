//! History Aggregator: newest-first scans over the changelog and context
//! stores, plus the text renderings the CLI prints.
//!
//! Next steps are kept as-is (a step repeated across checkpoints is history,
//! not noise). Patterns, decisions, and failed approaches are deduplicated by
//! exact content, first seen wins; decisions are also capped.

use crate::entry::{
    decode_changelog_entry, decode_context_entry, extract_decision, extract_failed,
    extract_pattern, extract_text, is_meta_document, ChangelogEntry, NextStep, Priority,
};
use crate::error::Result;
use crate::paths;
use crate::store::{DocumentStore, StoreBackend};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

/// Most recent decisions shown.
pub const DECISION_CAP: usize = 5;

// ---------------------------------------------------------------------------
// Projections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextStepWithSource {
    #[serde(flatten)]
    pub step: NextStep,
    pub timestamp: String,
    pub commit_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternWithSource {
    pub pattern: String,
    pub rationale: String,
    pub timestamp: String,
    pub commit_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionWithSource {
    pub decision: String,
    pub rationale: String,
    pub timestamp: String,
    pub commit_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedWithSource {
    pub approach: String,
    pub why_failed: String,
    pub timestamp: String,
    pub commit_hash: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryData {
    /// Valid checkpoints, newest first.
    pub entries: Vec<ChangelogEntry>,
    pub next_steps: Vec<NextStepWithSource>,
    pub patterns: Vec<PatternWithSource>,
    pub decisions: Vec<DecisionWithSource>,
    pub failed_approaches: Vec<FailedWithSource>,
    pub insights: Vec<String>,
    /// Documents that did not decode, per store.
    pub skipped_changelog: usize,
    pub skipped_context: usize,
}

impl HistoryData {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Scan up to `limit` checkpoints and `limit` context documents, newest first.
/// Missing stores are empty, never an error.
pub fn load_history<B: StoreBackend>(
    changelog: &DocumentStore<B>,
    context: &DocumentStore<B>,
    limit: usize,
) -> Result<HistoryData> {
    let mut data = HistoryData::default();
    scan_changelog(changelog, limit, &mut data)?;
    scan_context(context, limit, &mut data)?;
    tracing::debug!(
        entries = data.entries.len(),
        skipped = data.skipped_changelog + data.skipped_context,
        "loaded history"
    );
    Ok(data)
}

pub fn load_history_from_root(root: &Path, limit: usize) -> Result<HistoryData> {
    load_history(
        &DocumentStore::open(paths::changelog_path(root)),
        &DocumentStore::open(paths::context_path(root)),
        limit,
    )
}

fn scan_changelog<B: StoreBackend>(
    store: &DocumentStore<B>,
    limit: usize,
    data: &mut HistoryData,
) -> Result<()> {
    let docs = store.document_texts()?;
    for (idx, text) in docs.iter().enumerate().rev() {
        if data.entries.len() >= limit {
            break;
        }
        if idx == 0 && text.as_deref().is_some_and(is_meta_document) {
            continue;
        }
        let Some(entry) = text.as_deref().and_then(decode_changelog_entry) else {
            tracing::warn!(document = idx, "skipping changelog document that did not decode");
            data.skipped_changelog += 1;
            continue;
        };
        for step in &entry.next_steps {
            if step.summary.trim().is_empty() {
                continue;
            }
            data.next_steps.push(NextStepWithSource {
                step: step.clone(),
                timestamp: entry.timestamp.clone(),
                commit_hash: entry.commit_hash.clone(),
            });
        }
        data.entries.push(entry);
    }
    Ok(())
}

fn scan_context<B: StoreBackend>(
    store: &DocumentStore<B>,
    limit: usize,
    data: &mut HistoryData,
) -> Result<()> {
    let mut seen_patterns = HashSet::new();
    let mut seen_decisions = HashSet::new();
    let mut seen_failed = HashSet::new();
    let mut seen_insights = HashSet::new();
    let mut scanned = 0;

    for (idx, text) in store.document_texts()?.iter().enumerate().rev() {
        if scanned >= limit {
            break;
        }
        let Some(doc) = text.as_deref().and_then(decode_context_entry) else {
            tracing::warn!(document = idx, "skipping context document that did not decode");
            data.skipped_context += 1;
            continue;
        };
        scanned += 1;
        let ctx = &doc.context;

        for item in &ctx.established_patterns {
            let (pattern, rationale) = extract_pattern(item);
            if pattern.trim().is_empty() || !seen_patterns.insert(pattern.clone()) {
                continue;
            }
            data.patterns.push(PatternWithSource {
                pattern,
                rationale,
                timestamp: doc.timestamp.clone(),
                commit_hash: doc.commit_hash.clone(),
            });
        }

        for item in &ctx.decisions_made {
            if data.decisions.len() >= DECISION_CAP {
                break;
            }
            let (decision, rationale) = extract_decision(item);
            if decision.trim().is_empty() || !seen_decisions.insert(decision.clone()) {
                continue;
            }
            data.decisions.push(DecisionWithSource {
                decision,
                rationale,
                timestamp: doc.timestamp.clone(),
                commit_hash: doc.commit_hash.clone(),
            });
        }

        for item in &ctx.failed_approaches {
            let (approach, why_failed) = extract_failed(item);
            if approach.trim().is_empty() || !seen_failed.insert(approach.clone()) {
                continue;
            }
            data.failed_approaches.push(FailedWithSource {
                approach,
                why_failed,
                timestamp: doc.timestamp.clone(),
                commit_hash: doc.commit_hash.clone(),
            });
        }

        for item in &ctx.key_insights {
            let insight = extract_text(item);
            if insight.trim().is_empty() || !seen_insights.insert(insight.clone()) {
                continue;
            }
            data.insights.push(insight);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Ranking and grouping
// ---------------------------------------------------------------------------

/// Highest priority first. The sort is stable: equal ranks keep their
/// encounter order.
pub fn rank_next_steps(steps: &[NextStepWithSource]) -> Vec<NextStepWithSource> {
    let mut ranked = steps.to_vec();
    ranked.sort_by(|a, b| b.step.priority().rank().cmp(&a.step.priority().rank()));
    ranked
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriorityGroups {
    pub high: Vec<NextStepWithSource>,
    pub medium: Vec<NextStepWithSource>,
    pub low: Vec<NextStepWithSource>,
    /// Unrecognized and unset priorities.
    pub other: Vec<NextStepWithSource>,
}

pub fn group_by_priority(steps: &[NextStepWithSource]) -> PriorityGroups {
    let mut groups = PriorityGroups::default();
    for s in steps {
        let bucket = match s.step.priority() {
            Priority::High => &mut groups.high,
            Priority::Medium => &mut groups.medium,
            Priority::Low => &mut groups.low,
            Priority::Other(_) | Priority::Unset => &mut groups.other,
        };
        bucket.push(s.clone());
    }
    groups
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub const NO_CHECKPOINTS: &str = "No checkpoints yet.";

/// Display form of a commit hash: first 8 characters.
pub fn short_hash(hash: &str) -> &str {
    match hash.char_indices().nth(8) {
        Some((i, _)) => &hash[..i],
        None => hash,
    }
}

fn hash_label(hash: &str) -> String {
    if hash.trim().is_empty() {
        "uncommitted".to_string()
    } else {
        short_hash(hash).to_string()
    }
}

pub fn render_recent_checkpoints(data: &HistoryData) -> String {
    let mut out = String::from("## Recent checkpoints\n\n");
    if data.entries.is_empty() {
        out.push_str(NO_CHECKPOINTS);
        out.push('\n');
        return out;
    }
    for entry in &data.entries {
        out.push_str(&format!(
            "- {} [{}]\n",
            entry.timestamp,
            hash_label(&entry.commit_hash)
        ));
        for change in &entry.changes {
            match change.scope.as_deref() {
                Some(scope) => out.push_str(&format!(
                    "    {} ({}): {}\n",
                    change.change_type, scope, change.summary
                )),
                None => out.push_str(&format!("    {}: {}\n", change.change_type, change.summary)),
            }
        }
    }
    out
}

fn push_steps(out: &mut String, title: &str, steps: &[NextStepWithSource]) {
    if steps.is_empty() {
        return;
    }
    out.push_str(&format!("### {title}\n"));
    for s in steps {
        match s.step.scope.as_deref() {
            Some(scope) => out.push_str(&format!("- [{scope}] {}", s.step.summary)),
            None => out.push_str(&format!("- {}", s.step.summary)),
        }
        out.push_str(&format!("  ({})\n", hash_label(&s.commit_hash)));
        if let Some(details) = s.step.details.as_deref() {
            out.push_str(&format!("    {details}\n"));
        }
    }
    out.push('\n');
}

pub fn render_next_steps(data: &HistoryData) -> String {
    let mut out = String::from("## Next steps\n\n");
    if data.entries.is_empty() {
        out.push_str(NO_CHECKPOINTS);
        out.push('\n');
        return out;
    }
    if data.next_steps.is_empty() {
        out.push_str("No outstanding next steps.\n");
        return out;
    }
    let groups = group_by_priority(&data.next_steps);
    push_steps(&mut out, "High", &groups.high);
    push_steps(&mut out, "Medium", &groups.medium);
    push_steps(&mut out, "Low", &groups.low);
    push_steps(&mut out, "Other", &groups.other);
    out
}

fn render_pairs(title: &str, empty: &str, pairs: Vec<(&str, &str, &str)>) -> String {
    let mut out = format!("## {title}\n\n");
    if pairs.is_empty() {
        out.push_str(empty);
        out.push('\n');
        return out;
    }
    for (primary, secondary, hash) in pairs {
        out.push_str(&format!("- {primary}  ({})\n", hash_label(hash)));
        if !secondary.trim().is_empty() {
            out.push_str(&format!("    {secondary}\n"));
        }
    }
    out
}

pub fn render_patterns(data: &HistoryData) -> String {
    render_pairs(
        "Established patterns",
        "No patterns recorded.",
        data.patterns
            .iter()
            .map(|p| (p.pattern.as_str(), p.rationale.as_str(), p.commit_hash.as_str()))
            .collect(),
    )
}

pub fn render_decisions(data: &HistoryData) -> String {
    render_pairs(
        "Recent decisions",
        "No decisions recorded.",
        data.decisions
            .iter()
            .map(|d| (d.decision.as_str(), d.rationale.as_str(), d.commit_hash.as_str()))
            .collect(),
    )
}

pub fn render_failed(data: &HistoryData) -> String {
    render_pairs(
        "Failed approaches",
        "No failed approaches recorded.",
        data.failed_approaches
            .iter()
            .map(|f| (f.approach.as_str(), f.why_failed.as_str(), f.commit_hash.as_str()))
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
