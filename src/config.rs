//! TOML configuration.
//!
//! Every section is optional and falls back to defaults, except that the
//! embedding section must name a `model` and `dims` (the deployment's
//! fixed embedding dimension). [`load_config`] validates the whole file
//! before any client is constructed.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use ragline_core::chunk::validate_params;
use ragline_core::prompt::DEFAULT_NOT_FOUND_MESSAGE;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> i64 {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    #[serde(default = "default_not_found_message")]
    pub not_found_message: String,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            not_found_message: default_not_found_message(),
        }
    }
}

fn default_not_found_message() -> String {
    DEFAULT_NOT_FOUND_MESSAGE.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Fixed embedding dimension for this deployment.
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (self-hosted gateways, test servers).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embed_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_embed_retries(),
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    /// The configured dimension; `0` when unset (rejected by validation).
    pub fn dims(&self) -> usize {
        self.dims.unwrap_or(0)
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embed_retries() -> u32 {
    3
}
fn default_embed_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Defaults per provider when unset (see [`GenerationConfig::model_name`]).
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_generate_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generate_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            temperature: default_temperature(),
            url: None,
            max_retries: default_generate_retries(),
            timeout_secs: default_generate_timeout_secs(),
        }
    }
}

impl GenerationConfig {
    pub fn model_name(&self) -> String {
        if let Some(m) = &self.model {
            return m.clone();
        }
        match self.provider.as_str() {
            "openai" => "gpt-4o-mini",
            "ollama" => "llama3.2",
            _ => "gemini-flash-latest",
        }
        .to_string()
    }
}

fn default_temperature() -> f32 {
    0.3
}
fn default_generate_retries() -> u32 {
    2
}
fn default_generate_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    /// SQLite database path (`backend = "sqlite"`).
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
    /// Pinecone index host (`backend = "pinecone"`).
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub namespace: String,
    #[serde(default = "default_index_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_index_path(),
            host: None,
            namespace: String::new(),
            timeout_secs: default_index_timeout_secs(),
        }
    }
}

fn default_backend() -> String {
    "sqlite".to_string()
}
fn default_index_path() -> PathBuf {
    PathBuf::from("./data/ragline.sqlite")
}
fn default_index_timeout_secs() -> u64 {
    30
}

/// What to do with existing records when a document id is ingested again.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OnExisting {
    /// Swap the document's previous records for the new version, keyed by
    /// deterministic ids.
    #[default]
    Replace,
    /// Upsert without ids; the index keeps earlier copies.
    Append,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IngestConfig {
    #[serde(default)]
    pub on_existing: OnExisting,
}

impl Config {
    /// Check cross-field constraints. Called by [`load_config`].
    pub fn validate(&self) -> Result<()> {
        validate_params(self.chunking.chunk_size, self.chunking.chunk_overlap)
            .map_err(|e| anyhow::anyhow!("chunking: {}", e.message()))?;

        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }

        if self.answer.not_found_message.trim().is_empty() {
            bail!("answer.not_found_message must not be empty");
        }

        match self.embedding.provider.as_str() {
            "gemini" | "openai" | "ollama" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be gemini, openai, or ollama.",
                other
            ),
        }
        if self.embedding.dims() == 0 {
            bail!("embedding.dims must be > 0");
        }
        if self.embedding.model.is_none() {
            bail!("embedding.model must be specified");
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        match self.generation.provider.as_str() {
            "gemini" | "openai" | "ollama" => {}
            other => bail!(
                "Unknown generation provider: '{}'. Must be gemini, openai, or ollama.",
                other
            ),
        }

        match self.index.backend.as_str() {
            "memory" | "sqlite" => {}
            "pinecone" => {
                if self.index.host.is_none() {
                    bail!("index.host must be set when backend is 'pinecone'");
                }
            }
            other => bail!(
                "Unknown index backend: '{}'. Must be memory, sqlite, or pinecone.",
                other
            ),
        }

        Ok(())
    }
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}
