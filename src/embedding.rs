//! HTTP embedding providers.
//!
//! - **[`OllamaEmbedder`]**: `POST {url}/api/embed` on a local Ollama instance
//!   (default `http://localhost:11434`).
//! - **[`OpenAiEmbedder`]**: `POST {url}/embeddings` on the OpenAI API.
//!   Requires `OPENAI_API_KEY`.
//!
//! Both go through [`provider::post_json`](crate::provider::post_json), so
//! every call is bounded by `embedding.timeout_secs` and transient HTTP
//! failures are retried up to `embedding.max_retries` times.
//!
//! Use [`create_embedder`] to build the provider named in the config.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use ragdesk_core::embedding::Embedder;
use ragdesk_core::RagError;

use crate::config::EmbeddingConfig;
use crate::provider::{http_client, post_json, Endpoint};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Instantiate the embedding provider selected by `config.provider`.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Ollama ============

/// Embedding provider backed by a local Ollama instance.
pub struct OllamaEmbedder {
    model: String,
    dims: Option<usize>,
    client: reqwest::Client,
    endpoint: Endpoint,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let base = config.url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            client: http_client(timeout)?,
            endpoint: Endpoint {
                provider: "ollama",
                url: format!("{}/api/embed", base.trim_end_matches('/')),
                bearer: None,
                max_retries: config.max_retries,
                timeout,
            },
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> Option<usize> {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> ragdesk_core::Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = post_json(&self.client, &self.endpoint, &body).await?;
        let vectors = parse_ollama_response(&json)?;
        check_count("ollama", texts.len(), vectors)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> ragdesk_core::Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| RagError::provider("ollama", "invalid response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|embedding| {
            let values = embedding
                .as_array()
                .ok_or_else(|| RagError::provider("ollama", "invalid response: embedding is not an array"))?;
            parse_vector("ollama", values)
        })
        .collect()
}

// ============ OpenAI ============

/// Embedding provider backed by the OpenAI embeddings API.
pub struct OpenAiEmbedder {
    model: String,
    dims: Option<usize>,
    client: reqwest::Client,
    endpoint: Endpoint,
}

impl OpenAiEmbedder {
    /// Fails if `OPENAI_API_KEY` is not set.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(key) => key,
            Err(_) => bail!("OPENAI_API_KEY environment variable not set"),
        };
        let timeout = Duration::from_secs(config.timeout_secs);
        let base = config.url.as_deref().unwrap_or(DEFAULT_OPENAI_URL);
        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            client: http_client(timeout)?,
            endpoint: Endpoint {
                provider: "openai",
                url: format!("{}/embeddings", base.trim_end_matches('/')),
                bearer: Some(api_key),
                max_retries: config.max_retries,
                timeout,
            },
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> Option<usize> {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> ragdesk_core::Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = post_json(&self.client, &self.endpoint, &body).await?;
        let vectors = parse_openai_response(&json)?;
        check_count("openai", texts.len(), vectors)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> ragdesk_core::Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| RagError::provider("openai", "invalid response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| RagError::provider("openai", "invalid response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, parse_vector("openai", embedding)?));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

fn parse_vector(provider: &str, values: &[serde_json::Value]) -> ragdesk_core::Result<Vec<f32>> {
    values
        .iter()
        .map(|v| {
            v.as_f64().map(|x| x as f32).ok_or_else(|| {
                RagError::provider(provider, format!("invalid response: non-numeric embedding value {}", v))
            })
        })
        .collect()
}

fn check_count(
    provider: &str,
    expected: usize,
    vectors: Vec<Vec<f32>>,
) -> ragdesk_core::Result<Vec<Vec<f32>>> {
    if vectors.len() != expected {
        return Err(RagError::provider(
            provider,
            format!("returned {} embeddings for {} inputs", vectors.len(), expected),
        ));
    }
    Ok(vectors)
}
