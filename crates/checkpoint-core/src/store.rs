//! Append-only multi-document store.
//!
//! A store is a UTF-8 text file holding YAML documents separated by lines
//! consisting of `---`. Each document is parsed on its own, so one malformed
//! document never takes its neighbours down with it. New documents are only
//! ever appended; the single in-place mutation is a field patch on the final
//! document, which leaves every earlier byte untouched.

use crate::error::{CheckpointError, Result};
use std::cell::RefCell;
use std::ops::Range;
use std::path::{Path, PathBuf};

pub const DELIMITER: &str = "---";

// ---------------------------------------------------------------------------
// Splitting
// ---------------------------------------------------------------------------

fn leading_ws(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_whitespace()).count()
}

fn trailing_ws(bytes: &[u8]) -> usize {
    bytes.iter().rev().take_while(|b| b.is_ascii_whitespace()).count()
}

fn is_delimiter(line: &[u8]) -> bool {
    &line[..line.len() - trailing_ws(line)] == DELIMITER.as_bytes()
}

/// Byte ranges of every non-empty document in `content`, whitespace-trimmed.
///
/// Works on raw bytes: a document that is not valid UTF-8 still gets a span
/// and is rejected later, on its own.
pub fn document_spans(content: &[u8]) -> Vec<Range<usize>> {
    let mut raw = Vec::new();
    let mut seg_start = 0;
    let mut offset = 0;
    for line in content.split_inclusive(|b| *b == b'\n') {
        if is_delimiter(line) {
            raw.push(seg_start..offset);
            seg_start = offset + line.len();
        }
        offset += line.len();
    }
    raw.push(seg_start..content.len());

    raw.into_iter()
        .filter_map(|r| {
            let piece = &content[r.clone()];
            let lead = leading_ws(piece);
            if lead == piece.len() {
                return None;
            }
            let trail = trailing_ws(piece);
            Some(r.start + lead..r.end - trail)
        })
        .collect()
}

/// Split store text into its documents. Never fails; leading, trailing, and
/// repeated delimiters as well as blank lines simply produce no document.
pub fn split(content: &str) -> Vec<&str> {
    document_spans(content.as_bytes())
        .into_iter()
        .map(|r| &content[r])
        .collect()
}

/// Frame a rendered YAML body as one appendable document.
pub fn frame(body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 5);
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(body.trim_end());
    out.push('\n');
    out
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// Raw byte access to wherever a store lives.
pub trait StoreBackend {
    /// Full store bytes, or `None` if the store does not exist yet.
    fn read(&self) -> Result<Option<Vec<u8>>>;
    /// Append `text` verbatim, creating the store if needed.
    fn append(&self, text: &str) -> Result<()>;
    /// Replace the whole store with `bytes`.
    fn replace(&self, bytes: &[u8]) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StoreBackend for FileBackend {
    fn read(&self) -> Result<Option<Vec<u8>>> {
        crate::io::read_optional_bytes(&self.path)
    }

    fn append(&self, text: &str) -> Result<()> {
        crate::io::append_text(&self.path, text)
    }

    fn replace(&self, bytes: &[u8]) -> Result<()> {
        crate::io::atomic_write(&self.path, bytes)
    }
}

/// In-memory store used by tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    buf: RefCell<Option<Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(content: impl Into<Vec<u8>>) -> Self {
        Self {
            buf: RefCell::new(Some(content.into())),
        }
    }

    /// Current contents, with invalid UTF-8 replaced.
    pub fn contents(&self) -> Option<String> {
        self.buf
            .borrow()
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

impl StoreBackend for MemoryBackend {
    fn read(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.buf.borrow().clone())
    }

    fn append(&self, text: &str) -> Result<()> {
        self.buf
            .borrow_mut()
            .get_or_insert_with(Vec::new)
            .extend_from_slice(text.as_bytes());
        Ok(())
    }

    fn replace(&self, bytes: &[u8]) -> Result<()> {
        *self.buf.borrow_mut() = Some(bytes.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct DocumentStore<B> {
    backend: B,
}

impl DocumentStore<FileBackend> {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(FileBackend::new(path))
    }
}

impl<B: StoreBackend> DocumentStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Every document in file order, `None` for one whose bytes are not
    /// UTF-8. A missing store has no documents.
    pub fn document_texts(&self) -> Result<Vec<Option<String>>> {
        let content = self.backend.read()?.unwrap_or_default();
        Ok(document_spans(&content)
            .into_iter()
            .map(|r| String::from_utf8(content[r].to_vec()).ok())
            .collect())
    }

    /// Every readable document in file order.
    pub fn documents(&self) -> Result<Vec<String>> {
        Ok(self.document_texts()?.into_iter().flatten().collect())
    }

    pub fn is_empty(&self) -> Result<bool> {
        let content = self.backend.read()?.unwrap_or_default();
        Ok(document_spans(&content).is_empty())
    }

    /// Append one rendered YAML body as a new document.
    pub fn append_document(&self, body: &str) -> Result<()> {
        let existing = self.backend.read()?.unwrap_or_default();
        let mut chunk = String::new();
        if !existing.is_empty() && !existing.ends_with(b"\n") {
            chunk.push('\n');
        }
        chunk.push_str(&frame(body));
        self.backend.append(&chunk)
    }

    /// Text of the final document. `None` when the store is empty or the
    /// final document is not UTF-8.
    pub fn last_document(&self) -> Result<Option<String>> {
        let content = self.backend.read()?.unwrap_or_default();
        Ok(document_spans(&content)
            .pop()
            .and_then(|r| String::from_utf8(content[r].to_vec()).ok()))
    }

    /// Set a top-level field on the final document.
    ///
    /// Only the tail segment is re-rendered; bytes before it are written back
    /// exactly as read.
    pub fn backfill_last_document_field(&self, field: &str, value: &str) -> Result<()> {
        let content = self.backend.read()?.unwrap_or_default();
        let Some(span) = document_spans(&content).pop() else {
            return Err(CheckpointError::NotFound("store has no documents".to_string()));
        };
        let Ok(tail) = std::str::from_utf8(&content[span.clone()]) else {
            return Err(CheckpointError::NotFound(
                "last document is not valid UTF-8".to_string(),
            ));
        };

        let mut doc: serde_yaml::Value = serde_yaml::from_str(tail)?;
        let Some(map) = doc.as_mapping_mut() else {
            return Err(CheckpointError::NotFound(
                "last document is not a key-value document".to_string(),
            ));
        };
        map.insert(
            serde_yaml::Value::String(field.to_string()),
            serde_yaml::Value::String(value.to_string()),
        );
        let body = serde_yaml::to_string(&doc)?;

        let mut updated = Vec::with_capacity(content.len() + value.len());
        updated.extend_from_slice(&content[..span.start]);
        updated.extend_from_slice(body.trim_end().as_bytes());
        updated.push(b'\n');
        self.backend.replace(&updated)?;
        tracing::debug!(field, "backfilled last document");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
