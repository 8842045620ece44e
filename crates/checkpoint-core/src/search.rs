use crate::{
    entry::ChangelogEntry,
    error::{CheckpointError, Result},
};
use tantivy::{
    collector::TopDocs,
    query::QueryParser,
    schema::{Field, Schema, Value, STORED, STRING, TEXT},
    Index, IndexWriter, ReloadPolicy, TantivyDocument,
};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchResult {
    pub timestamp: String,
    pub commit_hash: String,
    pub change_type: String,
    pub summary: String,
    pub score: f32,
}

// ---------------------------------------------------------------------------
// CheckpointIndex
// ---------------------------------------------------------------------------

struct Fields {
    timestamp: Field,
    commit_hash: Field,
    change_type: Field,
    scope: Field,
    summary: Field,
    body: Field,
}

pub struct CheckpointIndex {
    index: Index,
    reader: tantivy::IndexReader,
    fields: Fields,
}

fn search_err(e: impl std::fmt::Display) -> CheckpointError {
    CheckpointError::Search(e.to_string())
}

impl CheckpointIndex {
    /// Build an ephemeral in-RAM index, one document per checkpoint.
    ///
    /// Indexed fields:
    /// - `timestamp`: STRING, stored
    /// - `commit_hash`: STRING, stored (`commit_hash:abc123`)
    /// - `change_type`: STRING, stored (`change_type:fix`)
    /// - `scope`: STRING (`scope:parser`)
    /// - `summary`: TEXT, stored; every change summary
    /// - `body`: TEXT; details, next steps, problem statement
    pub fn build(entries: &[ChangelogEntry]) -> Result<Self> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);

        // The changelog of a single project stays small; 15 MB is plenty.
        let mut writer: IndexWriter = index.writer(15_000_000).map_err(search_err)?;

        for entry in entries {
            let mut doc = TantivyDocument::default();
            doc.add_text(fields.timestamp, &entry.timestamp);
            doc.add_text(fields.commit_hash, &entry.commit_hash);
            for change in &entry.changes {
                doc.add_text(fields.change_type, &change.change_type);
                doc.add_text(fields.summary, &change.summary);
                if let Some(scope) = &change.scope {
                    doc.add_text(fields.scope, scope);
                }
            }

            let mut body_parts: Vec<&str> = entry
                .changes
                .iter()
                .filter_map(|c| c.details.as_deref())
                .collect();
            for step in &entry.next_steps {
                body_parts.push(&step.summary);
                if let Some(details) = &step.details {
                    body_parts.push(details);
                }
            }
            if let Some(ctx) = &entry.context {
                body_parts.push(&ctx.problem_statement);
            }
            body_parts.retain(|s| !s.trim().is_empty());
            doc.add_text(fields.body, body_parts.join(" "));

            writer.add_document(doc).map_err(search_err)?;
        }

        writer.commit().map_err(search_err)?;

        // Manual reload: the index is only read after the single commit above
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e: tantivy::TantivyError| search_err(e))?;

        Ok(Self {
            index,
            reader,
            fields,
        })
    }

    /// BM25 full-text search. Returns up to `limit` results sorted by score descending.
    ///
    /// Supported query syntax:
    /// - Bare terms: `cache eviction`      (AND by default)
    /// - Phrase:     `"exact phrase"`
    /// - Boolean:    `cache OR lru`, `cache NOT redis`
    /// - Field scope: `change_type:fix`, `scope:parser`
    /// - Prefix:     `evict*`
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let searcher = self.reader.searcher();

        let default_fields = vec![self.fields.summary, self.fields.body];
        let mut parser = QueryParser::for_index(&self.index, default_fields);
        parser.set_conjunction_by_default();

        let query = match parser.parse_query(query_str) {
            Ok(q) => q,
            Err(_) => return Ok(vec![]),
        };

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit.max(1)))
            .map_err(search_err)?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_addr).map_err(search_err)?;
            let first = |field: Field| {
                doc.get_first(field)
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string()
            };
            results.push(SearchResult {
                timestamp: first(self.fields.timestamp),
                commit_hash: first(self.fields.commit_hash),
                change_type: first(self.fields.change_type),
                summary: first(self.fields.summary),
                score,
            });
        }
        Ok(results)
    }
}

fn build_schema() -> (Schema, Fields) {
    let mut builder = Schema::builder();
    let timestamp = builder.add_text_field("timestamp", STRING | STORED);
    let commit_hash = builder.add_text_field("commit_hash", STRING | STORED);
    let change_type = builder.add_text_field("change_type", STRING | STORED);
    let scope = builder.add_text_field("scope", STRING);
    let summary = builder.add_text_field("summary", TEXT | STORED);
    let body = builder.add_text_field("body", TEXT);
    let schema = builder.build();
    (
        schema,
        Fields {
            timestamp,
            commit_hash,
            change_type,
            scope,
            summary,
            body,
        },
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
