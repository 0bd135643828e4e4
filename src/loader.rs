//! Document loading: raw upload bytes to [`TextSegment`]s.
//!
//! PDFs produce one segment per page (1-based page numbers). Plain text
//! produces a single segment. Parsing is CPU-bound and `pdf-extract` may
//! panic on malformed input, so PDFs are parsed on a blocking thread and a
//! panic becomes [`RagError::CorruptDocument`].

use ragdesk_core::models::{ContentType, TextSegment};
use ragdesk_core::{RagError, Result};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Extract the segments of one document.
pub async fn load(document_id: &str, bytes: Vec<u8>, content_type: ContentType) -> Result<Vec<TextSegment>> {
    let pages = match content_type {
        ContentType::Text => vec![(None, decode_text(&bytes)?)],
        ContentType::Pdf => {
            let pages = tokio::task::spawn_blocking(move || extract_pdf_pages(&bytes))
                .await
                .map_err(|e| RagError::CorruptDocument(format!("PDF parser crashed: {}", e)))??;
            pages
                .into_iter()
                .enumerate()
                .map(|(i, text)| (Some(i as u32 + 1), text))
                .collect()
        }
    };

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(sequence, (page, text))| TextSegment {
            document_id: document_id.to_string(),
            sequence,
            text,
            page,
        })
        .collect())
}

fn decode_text(bytes: &[u8]) -> Result<String> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    String::from_utf8(bytes.to_vec())
        .map_err(|e| RagError::CorruptDocument(format!("text is not valid UTF-8: {}", e)))
}

fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>> {
    pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| RagError::CorruptDocument(format!("PDF extraction failed: {}", e)))
}

/// Reduce an uploaded filename to a safe basename.
///
/// Directory components are dropped, characters outside `[A-Za-z0-9._-]`
/// become `_`, and leading dots are removed. A name that ends up empty is
/// rejected.
pub fn sanitize_filename(name: &str) -> Result<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        return Err(RagError::InvalidRequest(format!(
            "filename '{}' has no usable characters",
            name
        )));
    }
    Ok(cleaned)
}
