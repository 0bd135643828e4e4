//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait defines the tenant-scoped storage and
//! nearest-neighbour operations needed by ingestion and question answering,
//! enabling pluggable backends (SQLite in the app crate, in-memory here).
//!
//! # Contract
//!
//! | Method | Guarantee |
//! |--------|-----------|
//! | [`write`](VectorIndex::write) | All-or-nothing per batch; existing chunk ids are never overwritten |
//! | [`query`](VectorIndex::query) | Only the caller's tenant; score desc, chunk id asc |
//! | [`delete_document`](VectorIndex::delete_document) | Explicit removal before re-ingest |
//! | [`clear_fault`](VectorIndex::clear_fault) | Re-enables writes after a dimension fault |
//!
//! A dimension mismatch (on write or query) latches the index into a
//! faulted state: every later `write` fails with
//! [`RagError::EmbeddingDimensionMismatch`] until `clear_fault` is called.
//! Queries keep working so tenants can still read what is stored.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;
use std::cmp::Ordering;

use crate::error::{RagError, Result};
use crate::models::{Chunk, ScoredChunk, TenantId};

/// Similarity metric an index ranks by. Persisted with the index so a
/// store built for one metric is never silently read with another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Cosine,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
        }
    }
}

/// Outcome of a [`VectorIndex::write`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    /// Records appended by this call.
    pub inserted: usize,
    /// Chunks whose id was already present and were left untouched.
    pub skipped: usize,
}

/// Tenant-scoped nearest-neighbour store of `(vector, chunk)` records.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn metric(&self) -> Metric {
        Metric::Cosine
    }

    /// Dimensionality shared by every record, once known.
    async fn dims(&self) -> Result<Option<usize>>;

    /// Append one record per chunk. `embeddings[i]` belongs to `chunks[i]`.
    async fn write(
        &self,
        tenant: &TenantId,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<WriteStats>;

    /// Up to `k` of the tenant's records nearest to `query_vec`.
    ///
    /// Fails with [`RagError::EmptyIndex`] when the tenant has no records.
    async fn query(&self, tenant: &TenantId, query_vec: &[f32], k: usize)
        -> Result<Vec<ScoredChunk>>;

    /// Remove every record of one document. Returns the number removed.
    async fn delete_document(&self, tenant: &TenantId, document_id: &str) -> Result<usize>;

    /// Number of records held for the tenant.
    async fn count(&self, tenant: &TenantId) -> Result<usize>;

    /// Leave the faulted state entered after a dimension mismatch.
    async fn clear_fault(&self) -> Result<()>;
}

/// Check a write batch before anything is persisted.
///
/// Returns the dimensionality of the batch. `expected` is the index's
/// fixed dimensionality, if it has one.
pub fn validate_batch(
    expected: Option<usize>,
    tenant: &TenantId,
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
) -> Result<usize> {
    if chunks.len() != embeddings.len() {
        return Err(RagError::InvalidRequest(format!(
            "{} chunks but {} embeddings",
            chunks.len(),
            embeddings.len()
        )));
    }
    if let Some(foreign) = chunks.iter().find(|c| &c.tenant_id != tenant) {
        return Err(RagError::InvalidRequest(format!(
            "chunk {} belongs to a different tenant",
            foreign.id
        )));
    }

    let dims = match (expected, embeddings.first()) {
        (Some(d), _) => d,
        (None, Some(first)) => first.len(),
        (None, None) => return Ok(0),
    };
    if dims == 0 {
        return Err(RagError::EmbeddingDimensionMismatch {
            expected: 1,
            actual: 0,
        });
    }
    if let Some(bad) = embeddings.iter().find(|e| e.len() != dims) {
        return Err(RagError::EmbeddingDimensionMismatch {
            expected: dims,
            actual: bad.len(),
        });
    }
    Ok(dims)
}

/// Order candidates by descending score, ties by ascending chunk id, and
/// keep the first `k`.
pub fn rank(mut candidates: Vec<ScoredChunk>, k: usize) -> Vec<ScoredChunk> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk.id.cmp(&b.chunk.id))
    });
    candidates.truncate(k);
    candidates
}
