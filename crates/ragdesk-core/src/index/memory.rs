//! In-memory [`VectorIndex`] implementation for tests and embedding in
//! other processes.
//!
//! One `RwLock` guards the whole state so a batch becomes visible
//! atomically. Search is brute-force cosine similarity over the
//! tenant's records.

use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{RagError, Result};
use crate::models::{Chunk, ScoredChunk, TenantId};

use super::{rank, validate_batch, VectorIndex, WriteStats};

struct StoredRecord {
    chunk: Chunk,
    vector: Vec<f32>,
}

#[derive(Default)]
struct State {
    dims: Option<usize>,
    fault: Option<(usize, usize)>,
    ids: HashSet<String>,
    records: Vec<StoredRecord>,
}

/// In-memory vector index.
pub struct InMemoryIndex {
    state: RwLock<State>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    /// An index whose dimensionality is fixed up front.
    pub fn with_dims(dims: usize) -> Self {
        Self {
            state: RwLock::new(State {
                dims: Some(dims),
                ..State::default()
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| RagError::storage("in-memory index lock poisoned"))
    }

    fn write_lock(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| RagError::storage("in-memory index lock poisoned"))
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn dims(&self) -> Result<Option<usize>> {
        Ok(self.read()?.dims)
    }

    async fn write(
        &self,
        tenant: &TenantId,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<WriteStats> {
        let mut state = self.write_lock()?;

        if let Some((expected, actual)) = state.fault {
            return Err(RagError::EmbeddingDimensionMismatch { expected, actual });
        }

        let dims = match validate_batch(state.dims, tenant, chunks, embeddings) {
            Ok(d) => d,
            Err(err) => {
                if let RagError::EmbeddingDimensionMismatch { expected, actual } = err {
                    state.fault = Some((expected, actual));
                }
                return Err(err);
            }
        };
        if chunks.is_empty() {
            return Ok(WriteStats::default());
        }

        let mut stats = WriteStats::default();
        for (chunk, vector) in chunks.iter().zip(embeddings.iter()) {
            if !state.ids.insert(chunk.id.clone()) {
                stats.skipped += 1;
                continue;
            }
            state.records.push(StoredRecord {
                chunk: chunk.clone(),
                vector: vector.clone(),
            });
            stats.inserted += 1;
        }
        state.dims = Some(dims);
        Ok(stats)
    }

    async fn query(
        &self,
        tenant: &TenantId,
        query_vec: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        // Check and latch under a single guard: std's RwLock is not reentrant.
        let mut state = self.write_lock()?;
        if let Some(expected) = state.dims {
            if query_vec.len() != expected {
                state.fault = Some((expected, query_vec.len()));
                return Err(RagError::EmbeddingDimensionMismatch {
                    expected,
                    actual: query_vec.len(),
                });
            }
        }

        let candidates: Vec<ScoredChunk> = state
            .records
            .iter()
            .filter(|r| &r.chunk.tenant_id == tenant)
            .map(|r| ScoredChunk {
                chunk: r.chunk.clone(),
                score: cosine_similarity(query_vec, &r.vector),
            })
            .collect();

        if candidates.is_empty() {
            return Err(RagError::EmptyIndex);
        }
        Ok(rank(candidates, k))
    }

    async fn delete_document(&self, tenant: &TenantId, document_id: &str) -> Result<usize> {
        let mut state = self.write_lock()?;
        let before = state.records.len();
        let mut removed_ids = Vec::new();
        state.records.retain(|r| {
            let hit = &r.chunk.tenant_id == tenant && r.chunk.document_id == document_id;
            if hit {
                removed_ids.push(r.chunk.id.clone());
            }
            !hit
        });
        for id in &removed_ids {
            state.ids.remove(id);
        }
        Ok(before - state.records.len())
    }

    async fn count(&self, tenant: &TenantId) -> Result<usize> {
        Ok(self
            .read()?
            .records
            .iter()
            .filter(|r| &r.chunk.tenant_id == tenant)
            .count())
    }

    async fn clear_fault(&self) -> Result<()> {
        self.write_lock()?.fault = None;
        Ok(())
    }
}
