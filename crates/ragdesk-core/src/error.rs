//! Error taxonomy shared by every stage of the pipeline.
//!
//! Each variant maps to a stable snake_case [`kind`](RagError::kind) that the
//! HTTP layer and CLI report verbatim. Only [`RagError::ProviderTimeout`] is
//! retriable; nothing inside the core retries it.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RagError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("document could not be parsed: {0}")]
    CorruptDocument(String),

    #[error("invalid chunk parameters: chunk_size={chunk_size}, overlap={overlap} (need 0 < overlap < chunk_size)")]
    InvalidChunkParams { chunk_size: usize, overlap: usize },

    #[error("the vector index holds no records for this tenant")]
    EmptyIndex,

    #[error("embedding dimension mismatch: index expects {expected}, got {actual}")]
    EmbeddingDimensionMismatch { expected: usize, actual: usize },

    #[error("{provider} did not answer within {timeout_secs}s")]
    ProviderTimeout { provider: String, timeout_secs: u64 },

    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("{provider} failed: {message}")]
    Provider { provider: String, message: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl RagError {
    /// Stable machine-readable code for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::UnsupportedFormat(_) => "unsupported_format",
            RagError::CorruptDocument(_) => "corrupt_document",
            RagError::InvalidChunkParams { .. } => "invalid_chunk_params",
            RagError::EmptyIndex => "empty_index",
            RagError::EmbeddingDimensionMismatch { .. } => "embedding_dimension_mismatch",
            RagError::ProviderTimeout { .. } => "provider_timeout",
            RagError::EmptyQuestion => "empty_question",
            RagError::Unauthorized(_) => "unauthorized",
            RagError::Provider { .. } => "provider_error",
            RagError::Storage(_) => "storage_error",
            RagError::PayloadTooLarge { .. } => "payload_too_large",
            RagError::InvalidRequest(_) => "bad_request",
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retriable(&self) -> bool {
        matches!(self, RagError::ProviderTimeout { .. })
    }

    /// Shorthand for a [`RagError::Provider`] failure.
    pub fn provider(provider: impl Into<String>, message: impl ToString) -> Self {
        RagError::Provider {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    /// Shorthand for a [`RagError::Storage`] failure.
    pub fn storage(message: impl ToString) -> Self {
        RagError::Storage(message.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeouts_are_retriable() {
        let timeout = RagError::ProviderTimeout {
            provider: "ollama".into(),
            timeout_secs: 30,
        };
        assert!(timeout.is_retriable());
        assert!(!RagError::EmptyIndex.is_retriable());
        assert!(!RagError::provider("ollama", "boom").is_retriable());
        assert!(!RagError::EmbeddingDimensionMismatch {
            expected: 3,
            actual: 4
        }
        .is_retriable());
    }

    #[test]
    fn kinds_are_stable_codes() {
        assert_eq!(RagError::EmptyQuestion.kind(), "empty_question");
        assert_eq!(
            RagError::Unauthorized("missing token".into()).kind(),
            "unauthorized"
        );
        assert_eq!(
            RagError::InvalidChunkParams {
                chunk_size: 10,
                overlap: 10
            }
            .kind(),
            "invalid_chunk_params"
        );
    }

    #[test]
    fn display_includes_dimensions() {
        let err = RagError::EmbeddingDimensionMismatch {
            expected: 384,
            actual: 768,
        };
        assert_eq!(
            err.to_string(),
            "embedding dimension mismatch: index expects 384, got 768"
        );
    }
}
