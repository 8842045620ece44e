use crate::error::{CheckpointError, Result, ValidationErrors, ValidationIssue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub const SCHEMA_VERSION: &str = "1";

// ---------------------------------------------------------------------------
// Lenient field decoding
// ---------------------------------------------------------------------------

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

fn scalar_text(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Accept any scalar (or null) where a string is expected. Older documents
/// wrote `schema_version: 1` and empty hashes as bare `commit_hash:`.
fn lenient_string<'de, D>(de: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(de)?;
    Ok(scalar_text(&value))
}

fn lenient_opt_string<'de, D>(de: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(de)?;
    Ok(match value {
        serde_yaml::Value::Null => None,
        other => Some(scalar_text(&other)),
    })
}

/// A list field that also accepts null or a single bare item.
fn one_or_many<'de, D>(de: D) -> std::result::Result<Vec<ContextItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(de)?;
    let items = match value {
        serde_yaml::Value::Null => Vec::new(),
        serde_yaml::Value::Sequence(seq) => seq.into_iter().map(ContextItem::from_value).collect(),
        other => vec![ContextItem::from_value(other)],
    };
    Ok(items)
}

/// A list of records that also accepts null, a single item, or bare strings
/// (taken as the record's summary). Items of any other shape are dropped.
fn lenient_records<'de, D, T>(de: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + From<String>,
{
    let value = serde_yaml::Value::deserialize(de)?;
    let items = match value {
        serde_yaml::Value::Null => Vec::new(),
        serde_yaml::Value::Sequence(seq) => seq,
        other => vec![other],
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            serde_yaml::Value::String(s) => Some(T::from(s)),
            map @ serde_yaml::Value::Mapping(_) => serde_yaml::from_value(map).ok(),
            _ => None,
        })
        .collect())
}

/// A context block; plain text stands in for the problem statement and any
/// other shape is dropped.
fn lenient_context<'de, D>(de: D) -> std::result::Result<Option<EntryContext>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_yaml::Value::deserialize(de)?;
    Ok(match value {
        map @ serde_yaml::Value::Mapping(_) => serde_yaml::from_value(map).ok(),
        serde_yaml::Value::String(s) => Some(EntryContext {
            problem_statement: s,
            ..EntryContext::default()
        }),
        _ => None,
    })
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

// ---------------------------------------------------------------------------
// ChangeType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Feature,
    Fix,
    Refactor,
    Docs,
    Perf,
    Other,
}

impl ChangeType {
    pub const NAMES: &'static [&'static str] =
        &["feature", "fix", "refactor", "docs", "perf", "other"];

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Feature => "feature",
            ChangeType::Fix => "fix",
            ChangeType::Refactor => "refactor",
            ChangeType::Docs => "docs",
            ChangeType::Perf => "perf",
            ChangeType::Other => "other",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChangeType {
    type Err = CheckpointError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "feature" => Ok(ChangeType::Feature),
            "fix" => Ok(ChangeType::Fix),
            "refactor" => Ok(ChangeType::Refactor),
            "docs" => Ok(ChangeType::Docs),
            "perf" => Ok(ChangeType::Perf),
            "other" => Ok(ChangeType::Other),
            _ => Err(CheckpointError::Validation(ValidationErrors(vec![
                ValidationIssue::InvalidValue {
                    field: "change_type".to_string(),
                    value: s.to_string(),
                    allowed: ChangeType::NAMES,
                },
            ]))),
        }
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Priority {
    High,
    Medium,
    Low,
    Other(String),
    Unset,
}

impl Priority {
    /// Case-insensitive; "med" and "medium" are the same bucket.
    pub fn parse(s: &str) -> Self {
        let norm = s.trim().to_ascii_lowercase();
        match norm.as_str() {
            "" => Priority::Unset,
            "high" => Priority::High,
            "med" | "medium" => Priority::Medium,
            "low" => Priority::Low,
            _ => Priority::Other(s.trim().to_string()),
        }
    }

    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
            Priority::Other(_) | Priority::Unset => 0,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => f.write_str("high"),
            Priority::Medium => f.write_str("med"),
            Priority::Low => f.write_str("low"),
            Priority::Other(s) => f.write_str(s),
            Priority::Unset => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// ContextItem
// ---------------------------------------------------------------------------

/// One element of a context list. Authors write either a bare string or a
/// small map (`pattern`/`rationale`, `decision`/`rationale`, ...); anything
/// else is kept as `Unknown` and extracts to nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextItem {
    Text(String),
    Structured(serde_yaml::Mapping),
    Unknown(serde_yaml::Value),
}

impl ContextItem {
    pub fn from_value(value: serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::String(s) => ContextItem::Text(s),
            serde_yaml::Value::Mapping(m) => ContextItem::Structured(m),
            other => ContextItem::Unknown(other),
        }
    }

    fn field(&self, keys: &[&str]) -> String {
        let ContextItem::Structured(map) = self else {
            return String::new();
        };
        keys.iter()
            .filter_map(|k| map.get(*k))
            .map(scalar_text)
            .find(|s| !is_blank(s))
            .unwrap_or_default()
    }
}

/// `(pattern, rationale)`
pub fn extract_pattern(item: &ContextItem) -> (String, String) {
    match item {
        ContextItem::Text(s) => (s.clone(), String::new()),
        ContextItem::Structured(_) => (item.field(&["pattern"]), item.field(&["rationale"])),
        ContextItem::Unknown(_) => (String::new(), String::new()),
    }
}

/// `(decision, rationale)`; `description` stands in for a missing `decision`.
pub fn extract_decision(item: &ContextItem) -> (String, String) {
    match item {
        ContextItem::Text(s) => (s.clone(), String::new()),
        ContextItem::Structured(_) => (
            item.field(&["decision", "description"]),
            item.field(&["rationale"]),
        ),
        ContextItem::Unknown(_) => (String::new(), String::new()),
    }
}

/// `(approach, why_failed)`
pub fn extract_failed(item: &ContextItem) -> (String, String) {
    match item {
        ContextItem::Text(s) => (s.clone(), String::new()),
        ContextItem::Structured(_) => (
            item.field(&["approach"]),
            item.field(&["why_failed", "reason"]),
        ),
        ContextItem::Unknown(_) => (String::new(), String::new()),
    }
}

/// Plain text of an insight or conversation note.
pub fn extract_text(item: &ContextItem) -> String {
    match item {
        ContextItem::Text(s) => s.clone(),
        ContextItem::Structured(_) => item.field(&["insight", "description", "summary"]),
        ContextItem::Unknown(_) => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Entry types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Change {
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: String,
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub details: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub change_type: String,
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub scope: Option<String>,
}

impl From<String> for Change {
    fn from(summary: String) -> Self {
        Self {
            summary,
            ..Self::default()
        }
    }
}

impl Change {
    pub fn kind(&self) -> Option<ChangeType> {
        self.change_type.parse().ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NextStep {
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: String,
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub details: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub priority: String,
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub scope: Option<String>,
}

impl From<String> for NextStep {
    fn from(summary: String) -> Self {
        Self {
            summary,
            ..Self::default()
        }
    }
}

impl NextStep {
    pub fn priority(&self) -> Priority {
        Priority::parse(&self.priority)
    }
}

/// Free-form reasoning attached to a checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryContext {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "String::is_empty"
    )]
    pub problem_statement: String,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub key_insights: Vec<ContextItem>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub decisions_made: Vec<ContextItem>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub established_patterns: Vec<ContextItem>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub failed_approaches: Vec<ContextItem>,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub conversation_context: Vec<ContextItem>,
}

impl EntryContext {
    /// True when nothing worth recording was written. Template items left
    /// blank do not count.
    pub fn is_empty(&self) -> bool {
        let blank = |items: &[ContextItem]| {
            items.iter().all(|i| match i {
                ContextItem::Text(s) => is_blank(s),
                ContextItem::Structured(m) => m.values().all(|v| is_blank(&scalar_text(v))),
                ContextItem::Unknown(_) => true,
            })
        };
        is_blank(&self.problem_statement)
            && blank(&self.key_insights)
            && blank(&self.decisions_made)
            && blank(&self.established_patterns)
            && blank(&self.failed_approaches)
            && blank(&self.conversation_context)
    }
}

/// One checkpoint document in the changelog store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangelogEntry {
    #[serde(default = "default_schema_version", deserialize_with = "lenient_string")]
    pub schema_version: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub commit_hash: String,
    #[serde(default, deserialize_with = "lenient_records")]
    pub changes: Vec<Change>,
    #[serde(default, deserialize_with = "lenient_records")]
    pub next_steps: Vec<NextStep>,
    #[serde(
        default,
        deserialize_with = "lenient_context",
        skip_serializing_if = "Option::is_none"
    )]
    pub context: Option<EntryContext>,
}

impl Default for ChangelogEntry {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            timestamp: String::new(),
            commit_hash: String::new(),
            changes: Vec::new(),
            next_steps: Vec::new(),
            context: None,
        }
    }
}

impl ChangelogEntry {
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// One document in the context store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    #[serde(default = "default_schema_version", deserialize_with = "lenient_string")]
    pub schema_version: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub commit_hash: String,
    #[serde(flatten)]
    pub context: EntryContext,
}

impl ContextEntry {
    pub fn from_entry(entry: &ChangelogEntry, context: EntryContext) -> Self {
        Self {
            schema_version: entry.schema_version.clone(),
            timestamp: entry.timestamp.clone(),
            commit_hash: entry.commit_hash.clone(),
            context,
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Store-level metadata written as the first changelog document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaDocument {
    pub document: String,
    #[serde(default = "default_schema_version", deserialize_with = "lenient_string")]
    pub schema_version: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub created_at: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tool: String,
}

impl MetaDocument {
    pub const KIND: &'static str = "meta";

    pub fn new(created_at: impl Into<String>) -> Self {
        Self {
            document: Self::KIND.to_string(),
            schema_version: default_schema_version(),
            created_at: created_at.into(),
            tool: "checkpoint".to_string(),
        }
    }
}

pub fn is_meta_document(text: &str) -> bool {
    serde_yaml::from_str::<MetaDocument>(text)
        .map(|m| m.document == MetaDocument::KIND)
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// `None` when the text does not decode or carries no timestamp.
pub fn decode_changelog_entry(text: &str) -> Option<ChangelogEntry> {
    match serde_yaml::from_str::<ChangelogEntry>(text) {
        Ok(entry) if !is_blank(&entry.timestamp) => Some(entry),
        Ok(_) => {
            tracing::debug!("changelog document has no timestamp");
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "changelog document did not decode");
            None
        }
    }
}

/// Same contract as [`decode_changelog_entry`].
pub fn decode_context_entry(text: &str) -> Option<ContextEntry> {
    match serde_yaml::from_str::<ContextEntry>(text) {
        Ok(entry) if !is_blank(&entry.timestamp) => Some(entry),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "context document did not decode");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Every problem that blocks a draft from becoming a checkpoint.
/// A missing timestamp is not reported; the writer fills it in.
pub fn validate_draft(entry: &ChangelogEntry) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if entry.changes.is_empty() {
        issues.push(ValidationIssue::Missing {
            field: "changes".to_string(),
        });
        return issues;
    }
    for (i, change) in entry.changes.iter().enumerate() {
        if is_blank(&change.summary) {
            issues.push(ValidationIssue::Missing {
                field: format!("changes[{i}].summary"),
            });
        }
        if is_blank(&change.change_type) {
            issues.push(ValidationIssue::Missing {
                field: format!("changes[{i}].change_type"),
            });
        } else if change.kind().is_none() {
            issues.push(ValidationIssue::InvalidValue {
                field: format!("changes[{i}].change_type"),
                value: change.change_type.clone(),
                allowed: ChangeType::NAMES,
            });
        }
    }
    issues
}

/// Style problems that do not block a commit.
pub fn lint_warnings(entry: &ChangelogEntry, summary_max_len: usize) -> Vec<String> {
    let mut warnings = Vec::new();
    for (i, change) in entry.changes.iter().enumerate() {
        let len = change.summary.trim().chars().count();
        if len > summary_max_len {
            warnings.push(format!(
                "changes[{i}].summary is {len} characters (keep it under {summary_max_len})"
            ));
        }
    }
    for (i, step) in entry.next_steps.iter().enumerate() {
        if is_blank(&step.summary) {
            warnings.push(format!("next_steps[{i}].summary is empty"));
        }
        if let Priority::Other(p) = step.priority() {
            warnings.push(format!(
                "next_steps[{i}].priority '{p}' is not one of high, med, low"
            ));
        }
    }
    warnings
}

// ---------------------------------------------------------------------------
// Commit message
// ---------------------------------------------------------------------------

/// One-line commit title from the first change: `type(scope): summary`.
pub fn render_commit_message(entry: &ChangelogEntry) -> String {
    let Some(first) = entry.changes.first() else {
        return "checkpoint".to_string();
    };
    let kind = first
        .kind()
        .map(|k| k.as_str().to_string())
        .unwrap_or_else(|| first.change_type.trim().to_string());
    let summary = first.summary.trim();
    match first.scope.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(scope) => format!("{kind}({scope}): {summary}"),
        None => format!("{kind}: {summary}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
