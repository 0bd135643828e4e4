//! Generation provider trait and grounded-prompt construction.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::ScoredChunk;

/// Produces text from a prompt (an LLM behind an API).
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<String>;
}

const GROUNDED_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

const UNGROUNDED_PREAMBLE: &str = "No context was found in the user's uploaded documents. \
Say so explicitly, then answer the question from general knowledge only if you can do so reliably; \
otherwise say that you don't know.";

/// Build the prompt sent to the generator.
///
/// Retrieved chunk texts are placed in retrieval order, separated by blank
/// lines. With no chunks the prompt says explicitly that the context is
/// empty so the model does not pretend to quote the user's documents.
pub fn build_prompt(question: &str, context: &[ScoredChunk]) -> String {
    let question = question.trim();
    if context.is_empty() {
        return format!(
            "{}\n\nContext: (empty)\n\nQuestion: {}\nHelpful Answer:",
            UNGROUNDED_PREAMBLE, question
        );
    }

    let joined = context
        .iter()
        .map(|c| c.chunk.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{}\n\n{}\n\nQuestion: {}\nHelpful Answer:",
        GROUNDED_PREAMBLE, joined, question
    )
}
