//! HTTP generation providers.
//!
//! - **[`OllamaGenerator`]**: `POST {url}/api/generate` with `stream: false`.
//! - **[`OpenAiGenerator`]**: `POST {url}/chat/completions` with the prompt
//!   as a single user message. Requires `OPENAI_API_KEY`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use ragdesk_core::generation::Generator;
use ragdesk_core::RagError;

use crate::config::GenerationConfig;
use crate::provider::{http_client, post_json, Endpoint};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Instantiate the generation provider selected by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        "openai" => Ok(Arc::new(OpenAiGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

pub struct OllamaGenerator {
    model: String,
    client: reqwest::Client,
    endpoint: Endpoint,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let base = config.url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
        Ok(Self {
            model: config.model.clone(),
            client: http_client(timeout)?,
            endpoint: Endpoint {
                provider: "ollama",
                url: format!("{}/api/generate", base.trim_end_matches('/')),
                bearer: None,
                max_retries: config.max_retries,
                timeout,
            },
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> ragdesk_core::Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        let json = post_json(&self.client, &self.endpoint, &body).await?;
        json.get("response")
            .and_then(|r| r.as_str())
            .map(|s| s.trim().to_string())
            .ok_or_else(|| RagError::provider("ollama", "invalid response: missing 'response'"))
    }
}

pub struct OpenAiGenerator {
    model: String,
    client: reqwest::Client,
    endpoint: Endpoint,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(key) => key,
            Err(_) => bail!("OPENAI_API_KEY environment variable not set"),
        };
        let timeout = Duration::from_secs(config.timeout_secs);
        let base = config.url.as_deref().unwrap_or(DEFAULT_OPENAI_URL);
        Ok(Self {
            model: config.model.clone(),
            client: http_client(timeout)?,
            endpoint: Endpoint {
                provider: "openai",
                url: format!("{}/chat/completions", base.trim_end_matches('/')),
                bearer: Some(api_key),
                max_retries: config.max_retries,
                timeout,
            },
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> ragdesk_core::Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });
        let json = post_json(&self.client, &self.endpoint, &body).await?;
        parse_chat_completion(&json)
    }
}

fn parse_chat_completion(json: &serde_json::Value) -> ragdesk_core::Result<String> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| RagError::provider("openai", "invalid response: missing choices[0].message.content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chat_completion() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": " Ownership. "}}]
        });
        assert_eq!(parse_chat_completion(&json).unwrap(), "Ownership.");
        assert!(parse_chat_completion(&serde_json::json!({"choices": []})).is_err());
    }
}
