//! Configuration parsing and validation.
//!
//! ragdesk is configured via a TOML file (default: `config/ragdesk.toml`).
//! Only `[db]` is required; every other section falls back to defaults that
//! match a local Ollama deployment.
//!
//! # Example
//!
//! ```toml
//! [db]
//! path = "./data/ragdesk.sqlite"
//!
//! [chunking]
//! chunk_size = 500
//! overlap = 50
//!
//! [retrieval]
//! top_k = 4
//!
//! [embedding]
//! provider = "ollama"        # "ollama" | "openai"
//! model = "mistral"
//! url = "http://localhost:11434"
//!
//! [generation]
//! provider = "ollama"
//! model = "mistral"
//!
//! [auth]
//! mode = "jwt"               # "jwt" | "static"
//! jwt_secret_env = "RAGDESK_JWT_SECRET"
//!
//! [uploads]
//! dir = "./data/uploads"
//! max_bytes = 20971520
//!
//! [server]
//! bind = "127.0.0.1:5000"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ragdesk_core::answer::DEFAULT_TOP_K;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Sliding-window parameters, measured in characters.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Expected vector size. When unset, the first write to an empty index
    /// fixes it.
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}
fn default_model() -> String {
    "mistral".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_generation_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_auth_mode")]
    pub mode: String,
    /// Name of the environment variable holding the HS256 secret.
    #[serde(default = "default_jwt_secret_env")]
    pub jwt_secret_env: String,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    /// Bearer token → tenant id, used when `mode = "static"`.
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: default_auth_mode(),
            jwt_secret_env: default_jwt_secret_env(),
            issuer: None,
            audience: None,
            tokens: HashMap::new(),
        }
    }
}

fn default_auth_mode() -> String {
    "jwt".to_string()
}
fn default_jwt_secret_env() -> String {
    "RAGDESK_JWT_SECRET".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct UploadsConfig {
    /// Raw uploads are archived here as `<dir>/<document_id>` when set.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_bytes: default_max_bytes(),
        }
    }
}

fn default_max_bytes() -> usize {
    20 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a configuration document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    ragdesk_core::chunk::validate_params(config.chunking.chunk_size, config.chunking.overlap)
        .map_err(|e| anyhow::anyhow!("chunking: {}", e))?;

    // Validate retrieval
    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }

    // Validate providers
    for (section, provider) in [
        ("embedding", &config.embedding.provider),
        ("generation", &config.generation.provider),
    ] {
        match provider.as_str() {
            "ollama" | "openai" => {}
            other => bail!(
                "Unknown {} provider: '{}'. Must be ollama or openai.",
                section,
                other
            ),
        }
    }
    if config.embedding.model.trim().is_empty() {
        bail!("embedding.model must not be empty");
    }
    if config.generation.model.trim().is_empty() {
        bail!("generation.model must not be empty");
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be >= 1");
    }
    if config.embedding.timeout_secs == 0 || config.generation.timeout_secs == 0 {
        bail!("provider timeout_secs must be >= 1");
    }

    // Validate auth
    match config.auth.mode.as_str() {
        "jwt" => {}
        "static" => {
            if config.auth.tokens.is_empty() {
                bail!("auth.tokens must not be empty when auth.mode is 'static'");
            }
        }
        other => bail!("Unknown auth mode: '{}'. Must be jwt or static.", other),
    }

    if config.uploads.max_bytes == 0 {
        bail!("uploads.max_bytes must be > 0");
    }

    Ok(config)
}
