//! HTTP embedding providers.
//!
//! Concrete [`Embedder`] implementations:
//! - **[`GeminiEmbedder`]** Google Generative Language `batchEmbedContents`.
//! - **[`OpenAIEmbedder`]** OpenAI `POST /v1/embeddings`.
//! - **[`OllamaEmbedder`]** local Ollama `POST /api/embed`.
//!
//! # Provider Selection
//!
//! [`create_embedder`] builds the configured provider once; the pipeline
//! shares it across every request.
//!
//! # Failure Model
//!
//! Retries follow [`crate::http::send_json`]. A response with the wrong
//! number of vectors, a non-numeric value, or an empty vector is a
//! [`Error::Provider`]; no provider ever substitutes a zero vector.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use ragline_core::embedding::Embedder;
use ragline_core::error::{self, Error};

use crate::config::EmbeddingConfig;
use crate::http::{env_key, json_to_vector, send_json, ProviderSettings, RetryPolicy};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Build the embedder named by `config.provider`.
///
/// API keys come from `GOOGLE_API_KEY` (gemini) or `OPENAI_API_KEY`
/// (openai); Ollama needs none.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let model = config
        .model
        .clone()
        .ok_or_else(|| anyhow::anyhow!("embedding.model must be specified"))?;
    let dims = config.dims();
    let timeout = Duration::from_secs(config.timeout_secs);
    let retry = RetryPolicy::new(config.max_retries);

    let embedder: Arc<dyn Embedder> = match config.provider.as_str() {
        "gemini" => {
            let key = env_key("GOOGLE_API_KEY");
            if key.is_none() {
                bail!("GOOGLE_API_KEY environment variable not set");
            }
            let base = config.url.as_deref().unwrap_or(GEMINI_BASE_URL);
            let settings = ProviderSettings::new(base, key, timeout).with_retry(retry);
            Arc::new(GeminiEmbedder::new(model, dims, settings)?)
        }
        "openai" => {
            let key = env_key("OPENAI_API_KEY");
            if key.is_none() {
                bail!("OPENAI_API_KEY environment variable not set");
            }
            let base = config.url.as_deref().unwrap_or(OPENAI_BASE_URL);
            let settings = ProviderSettings::new(base, key, timeout).with_retry(retry);
            Arc::new(OpenAIEmbedder::new(model, dims, settings)?)
        }
        "ollama" => {
            let base = config.url.as_deref().unwrap_or(OLLAMA_BASE_URL);
            let settings = ProviderSettings::new(base, None, timeout).with_retry(retry);
            Arc::new(OllamaEmbedder::new(model, dims, settings)?)
        }
        other => bail!("Unknown embedding provider: {}", other),
    };

    Ok(embedder)
}

fn expect_count(provider: &str, vectors: Vec<Vec<f32>>, expected: usize) -> error::Result<Vec<Vec<f32>>> {
    if vectors.len() != expected {
        return Err(Error::provider(format!(
            "{} returned {} embeddings for {} inputs",
            provider,
            vectors.len(),
            expected
        )));
    }
    Ok(vectors)
}

// ============ Gemini ============

/// Embedder backed by the Gemini `batchEmbedContents` endpoint.
///
/// The model name is sent with its `models/` prefix
/// (e.g. `models/gemini-embedding-001`); `outputDimensionality` is set to
/// the configured dimension.
pub struct GeminiEmbedder {
    model: String,
    dims: usize,
    settings: ProviderSettings,
    client: Client,
}

impl GeminiEmbedder {
    pub fn new(model: impl Into<String>, dims: usize, settings: ProviderSettings) -> Result<Self> {
        let model = model.into();
        let model = if model.starts_with("models/") {
            model
        } else {
            format!("models/{}", model)
        };
        let client = settings.build_client()?;
        Ok(Self {
            model,
            dims,
            settings,
            client,
        })
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_many(&self, texts: &[String]) -> error::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let key = self.settings.require_api_key("Gemini")?;
        let url = self
            .settings
            .url(&format!("/v1beta/{}:batchEmbedContents", self.model));
        let requests: Vec<Value> = texts
            .iter()
            .map(|t| {
                json!({
                    "model": self.model,
                    "content": { "parts": [{ "text": t }] },
                    "outputDimensionality": self.dims,
                })
            })
            .collect();
        let body = json!({ "requests": requests });

        let json = send_json("Gemini", &self.settings.retry, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", key)
                .json(&body)
        })
        .await?;

        expect_count("Gemini", parse_gemini_response(&json)?, texts.len())
    }
}

fn parse_gemini_response(json: &Value) -> error::Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| Error::provider("Invalid Gemini response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|e| {
            let values = e
                .get("values")
                .ok_or_else(|| Error::provider("Invalid Gemini response: missing values"))?;
            json_to_vector("Gemini", values)
        })
        .collect()
}

// ============ OpenAI ============

/// Embedder backed by the OpenAI embeddings API.
pub struct OpenAIEmbedder {
    model: String,
    dims: usize,
    settings: ProviderSettings,
    client: Client,
}

impl OpenAIEmbedder {
    pub fn new(model: impl Into<String>, dims: usize, settings: ProviderSettings) -> Result<Self> {
        let client = settings.build_client()?;
        Ok(Self {
            model: model.into(),
            dims,
            settings,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_many(&self, texts: &[String]) -> error::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let key = self.settings.require_api_key("OpenAI")?;
        let url = self.settings.url("/v1/embeddings");
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let json = send_json("OpenAI", &self.settings.retry, || {
            self.client.post(&url).bearer_auth(key).json(&body)
        })
        .await?;

        expect_count("OpenAI", parse_openai_response(&json)?, texts.len())
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &Value) -> error::Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::provider("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| Error::provider("Invalid OpenAI response: missing embedding"))?;
        indexed.push((index, json_to_vector("OpenAI", embedding)?));
    }
    indexed.sort_by_key(|(i, _)| *i);

    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

/// Embedder backed by a local Ollama instance.
///
/// Requires an embedding model to be pulled (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    settings: ProviderSettings,
    client: Client,
}

impl OllamaEmbedder {
    pub fn new(model: impl Into<String>, dims: usize, settings: ProviderSettings) -> Result<Self> {
        let client = settings.build_client()?;
        Ok(Self {
            model: model.into(),
            dims,
            settings,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_many(&self, texts: &[String]) -> error::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.settings.url("/api/embed");
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let json = send_json("Ollama", &self.settings.retry, || {
            self.client.post(&url).json(&body)
        })
        .await?;

        expect_count("Ollama", parse_ollama_response(&json)?, texts.len())
    }
}

fn parse_ollama_response(json: &Value) -> error::Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| Error::provider("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|e| json_to_vector("Ollama", e))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_openai_orders_by_index() {
        let json = json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        let vecs = parse_openai_response(&json).unwrap();
        assert_eq!(vecs, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_gemini() {
        let json = json!({ "embeddings": [{ "values": [0.25, 0.5] }] });
        assert_eq!(parse_gemini_response(&json).unwrap(), vec![vec![0.25, 0.5]]);
        assert!(parse_gemini_response(&json!({})).is_err());
    }

    #[test]
    fn test_parse_ollama_rejects_non_numeric() {
        let json = json!({ "embeddings": [[0.1, null]] });
        assert!(matches!(parse_ollama_response(&json), Err(Error::Provider(_))));
    }

    #[test]
    fn test_count_mismatch_is_provider_error() {
        let err = expect_count("X", vec![vec![1.0]], 2).unwrap_err();
        assert!(err.message().contains("1 embeddings for 2 inputs"));
    }

    #[test]
    fn test_gemini_model_prefix() {
        let settings = ProviderSettings::new(GEMINI_BASE_URL, None, Duration::from_secs(5));
        let e = GeminiEmbedder::new("gemini-embedding-001", 768, settings).unwrap();
        assert_eq!(e.model_name(), "models/gemini-embedding-001");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = EmbeddingConfig {
            provider: "cohere".to_string(),
            model: Some("m".to_string()),
            dims: Some(8),
            ..Default::default()
        };
        assert!(create_embedder(&config).is_err());
    }
}
