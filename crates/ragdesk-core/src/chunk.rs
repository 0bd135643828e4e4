//! Sliding-window text chunker.
//!
//! Concatenates a document's [`TextSegment`]s in order and cuts the result
//! into windows of `chunk_size` characters, advancing `chunk_size - overlap`
//! characters per step, so consecutive chunks share exactly `overlap`
//! characters. The final window may be shorter and is always emitted.
//!
//! Lengths are counted in `char`s, never bytes, so a window can never split
//! a multi-byte UTF-8 sequence.
//!
//! Chunk ids are content-addressed: SHA-256 over tenant, document digest,
//! position and text. Re-chunking identical bytes for the same tenant with
//! the same parameters therefore yields identical ids, which is what makes
//! re-ingestion idempotent at the vector index.
//!
//! # Example
//!
//! ```rust
//! use ragdesk_core::chunk::split;
//! use ragdesk_core::models::{TenantId, TextSegment};
//!
//! let tenant = TenantId::new("alice").unwrap();
//! let seg = TextSegment {
//!     document_id: "doc-1".into(),
//!     sequence: 0,
//!     text: "x".repeat(700),
//!     page: None,
//! };
//! let chunks = split(&tenant, "doc-1", "digest", &[seg], 300, 50).unwrap();
//! let lens: Vec<usize> = chunks.iter().map(|c| c.text.chars().count()).collect();
//! assert_eq!(lens, vec![300, 300, 200]);
//! ```

use sha2::{Digest, Sha256};

use crate::error::{RagError, Result};
use crate::models::{Chunk, TenantId, TextSegment};

/// Validate chunking parameters: `0 < overlap < chunk_size`.
pub fn validate_params(chunk_size: usize, overlap: usize) -> Result<()> {
    if chunk_size == 0 || overlap == 0 || overlap >= chunk_size {
        return Err(RagError::InvalidChunkParams {
            chunk_size,
            overlap,
        });
    }
    Ok(())
}

/// Split a document's segments into overlapping chunks.
///
/// # Guarantees
///
/// - Every chunk holds at most `chunk_size` characters.
/// - Consecutive chunks share exactly `overlap` characters.
/// - Text of at most `chunk_size` characters yields exactly one chunk
///   (empty text yields one empty chunk).
/// - Positions are contiguous: `0, 1, …, N-1`.
pub fn split(
    tenant: &TenantId,
    document_id: &str,
    document_digest: &str,
    segments: &[TextSegment],
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    validate_params(chunk_size, overlap)?;

    let mut chars: Vec<char> = Vec::new();
    // (start offset, page) for each segment, in concatenation order.
    let mut boundaries: Vec<(usize, Option<u32>)> = Vec::with_capacity(segments.len());
    for seg in segments {
        boundaries.push((chars.len(), seg.page));
        chars.extend(seg.text.chars());
    }

    let total = chars.len();
    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let end = (start + chunk_size).min(total);
        let text: String = chars[start..end].iter().collect();
        let page = page_at(&boundaries, start);
        chunks.push(make_chunk(
            tenant,
            document_id,
            document_digest,
            chunks.len(),
            start,
            page,
            text,
        ));
        if end >= total {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

/// Page of the last segment starting at or before `offset`.
fn page_at(boundaries: &[(usize, Option<u32>)], offset: usize) -> Option<u32> {
    boundaries
        .iter()
        .take_while(|(start, _)| *start <= offset)
        .last()
        .and_then(|(_, page)| *page)
}

fn make_chunk(
    tenant: &TenantId,
    document_id: &str,
    document_digest: &str,
    position: usize,
    char_offset: usize,
    page: Option<u32>,
    text: String,
) -> Chunk {
    let hash = format!("{:x}", Sha256::digest(text.as_bytes()));

    let mut hasher = Sha256::new();
    hasher.update(tenant.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(document_digest.as_bytes());
    hasher.update([0u8]);
    hasher.update((position as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    let id = format!("{:x}", hasher.finalize());

    Chunk {
        id,
        document_id: document_id.to_string(),
        tenant_id: tenant.clone(),
        position,
        char_offset,
        page,
        text,
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantId {
        TenantId::new("tenant-a").unwrap()
    }

    fn segment(seq: usize, text: &str, page: Option<u32>) -> TextSegment {
        TextSegment {
            document_id: "doc1".into(),
            sequence: seq,
            text: text.into(),
            page,
        }
    }

    fn split_text(text: &str, size: usize, overlap: usize) -> Vec<Chunk> {
        split(&tenant(), "doc1", "d1", &[segment(0, text, None)], size, overlap).unwrap()
    }

    #[test]
    fn test_example_700_chars() {
        let text: String = (0..700).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = split_text(&text, 300, 50);
        let offsets: Vec<(usize, usize)> = chunks
            .iter()
            .map(|c| (c.char_offset, c.char_offset + c.text.chars().count()))
            .collect();
        assert_eq!(offsets, vec![(0, 300), (250, 550), (500, 700)]);
        assert_eq!(chunks[2].text.len(), 200);
        assert_eq!(chunks[1].text, text[250..550]);
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split_text("Hello, world!", 300, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");

        let exact = "y".repeat(300);
        assert_eq!(split_text(&exact, 300, 50).len(), 1);
    }

    #[test]
    fn test_empty_text_single_chunk() {
        let chunks = split_text("", 300, 50);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.is_empty());
    }

    #[test]
    fn test_overlap_is_exact() {
        let text: String = (0..1234).map(|i| char::from(b'0' + (i % 10) as u8)).collect();
        for (size, overlap) in [(300, 50), (500, 30), (17, 5), (2, 1)] {
            let chunks = split_text(&text, size, overlap);
            for pair in chunks.windows(2) {
                let a: Vec<char> = pair[0].text.chars().collect();
                let b: Vec<char> = pair[1].text.chars().collect();
                assert_eq!(a.len(), size);
                assert_eq!(&a[size - overlap..], &b[..overlap.min(b.len())]);
                assert_eq!(pair[1].char_offset - pair[0].char_offset, size - overlap);
            }
            for c in &chunks {
                assert!(c.text.chars().count() <= size);
            }
            let last = chunks.last().unwrap();
            assert_eq!(last.char_offset + last.text.chars().count(), text.len());
        }
    }

    #[test]
    fn test_positions_contiguous() {
        let text = "z".repeat(5000);
        let chunks = split_text(&text, 300, 30);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.position, i, "position mismatch at {}", i);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma delta. ".repeat(80);
        let c1 = split_text(&text, 120, 20);
        let c2 = split_text(&text, 120, 20);
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_ids_scoped_by_tenant() {
        let seg = [segment(0, "same text", None)];
        let a = split(&TenantId::new("a").unwrap(), "doc1", "d", &seg, 100, 10).unwrap();
        let b = split(&TenantId::new("b").unwrap(), "doc1", "d", &seg, 100, 10).unwrap();
        assert_ne!(a[0].id, b[0].id);
        assert_eq!(a[0].hash, b[0].hash);
    }

    #[test]
    fn test_ids_ignore_document_id() {
        let seg = [segment(0, "same text", None)];
        let a = split(&tenant(), "doc-first", "digest", &seg, 100, 10).unwrap();
        let b = split(&tenant(), "doc-second", "digest", &seg, 100, 10).unwrap();
        assert_eq!(a[0].id, b[0].id);
        assert_ne!(a[0].document_id, b[0].document_id);
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────────────────┐\n│ Hello wörld      │\n└──────────────────┘";
        let chunks = split_text(text, 7, 2);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 7);
        }
    }

    #[test]
    fn test_pages_follow_segments() {
        let segs = [
            segment(0, &"a".repeat(100), Some(1)),
            segment(1, &"b".repeat(100), Some(2)),
            segment(2, &"c".repeat(100), Some(3)),
        ];
        let chunks = split(&tenant(), "doc1", "d", &segs, 80, 10).unwrap();
        assert_eq!(chunks[0].page, Some(1));
        let on_page_two = chunks
            .iter()
            .find(|c| c.char_offset >= 100 && c.char_offset < 200)
            .unwrap();
        assert_eq!(on_page_two.page, Some(2));
        assert_eq!(chunks.last().unwrap().page, Some(3));
        let joined: String = segs.iter().map(|s| s.text.as_str()).collect();
        assert!(chunks[1].text.starts_with(&joined[70..80]));
    }

    #[test]
    fn test_invalid_params() {
        let segs = [segment(0, "text", None)];
        for (size, overlap) in [(0, 0), (10, 10), (10, 20), (10, 0)] {
            let err = split(&tenant(), "doc1", "d", &segs, size, overlap).unwrap_err();
            assert!(matches!(err, RagError::InvalidChunkParams { .. }));
        }
    }
}
