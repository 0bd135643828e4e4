//! Core data models used throughout ragdesk.
//!
//! These types represent the documents, segments, chunks, answers and
//! history entries that flow through the ingestion and question-answering
//! pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RagError, Result};

/// The owner scope isolating one user's documents, vectors and history.
///
/// Produced only by an [`IdentityVerifier`](crate::identity::IdentityVerifier)
/// (or explicitly by trusted callers such as the CLI).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Wrap a tenant identifier. Blank identifiers are rejected.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(RagError::Unauthorized("tenant id must not be empty".into()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Document formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Pdf,
    Text,
}

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

const TEXT_EXTENSIONS: &[&str] = &["txt", "text", "md", "markdown"];

impl ContentType {
    /// Parse a MIME type, ignoring parameters such as `; charset=utf-8`.
    pub fn from_mime(mime: &str) -> Result<Self> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            MIME_PDF => Ok(ContentType::Pdf),
            MIME_TEXT | MIME_MARKDOWN => Ok(ContentType::Text),
            _ => Err(RagError::UnsupportedFormat(mime.to_string())),
        }
    }

    /// Resolve the content type of an upload.
    ///
    /// A recognised declared MIME type wins. Otherwise (no declaration, or a
    /// generic `application/octet-stream`) the filename extension decides.
    pub fn detect(filename: &str, declared: Option<&str>) -> Result<Self> {
        if let Some(mime) = declared {
            let generic = mime.trim().is_empty()
                || mime.trim().eq_ignore_ascii_case("application/octet-stream");
            if !generic {
                return Self::from_mime(mime);
            }
        }

        let ext = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if ext == "pdf" {
            Ok(ContentType::Pdf)
        } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            Ok(ContentType::Text)
        } else {
            Err(RagError::UnsupportedFormat(format!(
                "cannot infer a supported format from '{}'",
                filename
            )))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Pdf => "pdf",
            ContentType::Text => "text",
        }
    }

    pub fn parse_stored(value: &str) -> Result<Self> {
        match value {
            "pdf" => Ok(ContentType::Pdf),
            "text" => Ok(ContentType::Text),
            other => Err(RagError::storage(format!("unknown stored content type '{}'", other))),
        }
    }
}

/// A raw uploaded artifact. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub tenant_id: TenantId,
    pub filename: String,
    pub content_type: ContentType,
    pub byte_len: usize,
    /// SHA-256 of the raw bytes, hex encoded.
    pub digest: String,
    pub chunk_count: usize,
    pub created_at: i64,
}

/// One logical unit extracted from a document: a PDF page or a whole text file.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSegment {
    pub document_id: String,
    pub sequence: usize,
    pub text: String,
    /// 1-based page number for PDF segments.
    pub page: Option<u32>,
}

/// A bounded slice of concatenated segment text; the unit of embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub tenant_id: TenantId,
    pub position: usize,
    /// Offset of the first character within the concatenated document text.
    pub char_offset: usize,
    /// Page of the segment the chunk starts in.
    pub page: Option<u32>,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// A chunk returned by [`VectorIndex::query`](crate::index::VectorIndex::query).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub score: f32,
}

/// Result of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReceipt {
    pub document_id: String,
    pub chunk_count: usize,
}

/// A generated answer plus the grounding used to produce it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// Ids of the chunks placed in the prompt, in retrieval order.
    pub chunk_ids: Vec<String>,
    /// Similarity of each grounding chunk, parallel to `chunk_ids`.
    pub scores: Vec<f32>,
    /// False when no chunk was available and the model answered without context.
    pub grounded: bool,
}

/// A recorded question/answer pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub tenant_id: TenantId,
    pub question: String,
    pub answer: String,
    pub chunk_ids: Vec<String>,
    pub created_at: i64,
}
