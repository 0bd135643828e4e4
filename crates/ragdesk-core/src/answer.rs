//! Retrieval-augmented question answering.
//!
//! # Algorithm
//!
//! 1. Reject blank questions with [`RagError::EmptyQuestion`].
//! 2. Embed the question with the same [`Embedder`] used at ingestion.
//! 3. Fetch the tenant's `top_k` nearest chunks. An empty index is not an
//!    error here: it yields zero chunks.
//! 4. Build the prompt (see [`build_prompt`]) and call the [`Generator`].
//! 5. Return the generated text with the grounding chunk ids in retrieval
//!    order. With zero chunks the answer is marked ungrounded.
//!
//! Nothing here retries. A [`RagError::ProviderTimeout`] from either
//! provider reaches the caller unchanged.

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::generation::{build_prompt, Generator};
use crate::index::VectorIndex;
use crate::models::{Answer, ScoredChunk, TenantId};

/// Default number of chunks placed in the prompt.
pub const DEFAULT_TOP_K: usize = 4;

/// Retrieve the tenant's most relevant chunks for `question`.
pub async fn retrieve(
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    tenant: &TenantId,
    question: &str,
    top_k: usize,
) -> Result<Vec<ScoredChunk>> {
    let question = question.trim();
    if question.is_empty() {
        return Err(RagError::EmptyQuestion);
    }

    let mut vectors = embedder.embed(&[question.to_string()]).await?;
    if vectors.len() != 1 {
        return Err(RagError::provider(
            embedder.model_name(),
            format!("expected 1 embedding, got {}", vectors.len()),
        ));
    }
    let query_vec = vectors.remove(0);

    match index.query(tenant, &query_vec, top_k).await {
        Ok(hits) => Ok(hits),
        Err(RagError::EmptyIndex) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Answer `question` for `tenant` from that tenant's documents only.
pub async fn answer(
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    generator: &dyn Generator,
    tenant: &TenantId,
    question: &str,
    top_k: usize,
) -> Result<Answer> {
    let context = retrieve(index, embedder, tenant, question, top_k).await?;
    let prompt = build_prompt(question, &context);
    let text = generator.generate(&prompt).await?;

    Ok(Answer {
        text,
        grounded: !context.is_empty(),
        chunk_ids: context.iter().map(|c| c.chunk.id.clone()).collect(),
        scores: context.iter().map(|c| c.score).collect(),
    })
}
