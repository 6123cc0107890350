//! HTTP text-generation providers.
//!
//! Each provider sends one non-streaming completion request per prompt and
//! returns the generated text. Temperature comes from `[generation]`; the
//! default (0.3) keeps answers close to the retrieved context.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use ragline_core::error::{self, Error};
use ragline_core::generate::Generator;

use crate::config::GenerationConfig;
use crate::embedding::{GEMINI_BASE_URL, OLLAMA_BASE_URL, OPENAI_BASE_URL};
use crate::http::{env_key, send_json, ProviderSettings, RetryPolicy};

/// Build the generator named by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    let model = config.model_name();
    let timeout = Duration::from_secs(config.timeout_secs);
    let retry = RetryPolicy::new(config.max_retries);

    let generator: Arc<dyn Generator> = match config.provider.as_str() {
        "gemini" => {
            let key = env_key("GOOGLE_API_KEY");
            if key.is_none() {
                bail!("GOOGLE_API_KEY environment variable not set");
            }
            let base = config.url.as_deref().unwrap_or(GEMINI_BASE_URL);
            let settings = ProviderSettings::new(base, key, timeout).with_retry(retry);
            Arc::new(GeminiGenerator::new(model, config.temperature, settings)?)
        }
        "openai" => {
            let key = env_key("OPENAI_API_KEY");
            if key.is_none() {
                bail!("OPENAI_API_KEY environment variable not set");
            }
            let base = config.url.as_deref().unwrap_or(OPENAI_BASE_URL);
            let settings = ProviderSettings::new(base, key, timeout).with_retry(retry);
            Arc::new(OpenAIGenerator::new(model, config.temperature, settings)?)
        }
        "ollama" => {
            let base = config.url.as_deref().unwrap_or(OLLAMA_BASE_URL);
            let settings = ProviderSettings::new(base, None, timeout).with_retry(retry);
            Arc::new(OllamaGenerator::new(model, config.temperature, settings)?)
        }
        other => bail!("Unknown generation provider: {}", other),
    };

    Ok(generator)
}

/// Gemini `generateContent`.
pub struct GeminiGenerator {
    model: String,
    temperature: f32,
    settings: ProviderSettings,
    client: Client,
}

impl GeminiGenerator {
    pub fn new(model: impl Into<String>, temperature: f32, settings: ProviderSettings) -> Result<Self> {
        let model = model.into();
        let model = model.strip_prefix("models/").unwrap_or(&model).to_string();
        let client = settings.build_client()?;
        Ok(Self {
            model,
            temperature,
            settings,
            client,
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> error::Result<String> {
        let key = self.settings.require_api_key("Gemini")?;
        let url = self
            .settings
            .url(&format!("/v1beta/models/{}:generateContent", self.model));
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": self.temperature },
        });

        let json = send_json("Gemini", &self.settings.retry, || {
            self.client
                .post(&url)
                .header("x-goog-api-key", key)
                .json(&body)
        })
        .await?;

        parse_gemini_text(&json)
    }
}

/// Concatenate `candidates[0].content.parts[].text`.
fn parse_gemini_text(json: &Value) -> error::Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| Error::provider("Invalid Gemini response: missing candidates"))?;

    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join(""))
}

/// OpenAI chat completions.
pub struct OpenAIGenerator {
    model: String,
    temperature: f32,
    settings: ProviderSettings,
    client: Client,
}

impl OpenAIGenerator {
    pub fn new(model: impl Into<String>, temperature: f32, settings: ProviderSettings) -> Result<Self> {
        let client = settings.build_client()?;
        Ok(Self {
            model: model.into(),
            temperature,
            settings,
            client,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> error::Result<String> {
        let key = self.settings.require_api_key("OpenAI")?;
        let url = self.settings.url("/v1/chat/completions");
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let json = send_json("OpenAI", &self.settings.retry, || {
            self.client.post(&url).bearer_auth(key).json(&body)
        })
        .await?;

        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::provider("Invalid OpenAI response: missing choices[0].message.content"))
    }
}

/// Ollama `/api/generate` with streaming disabled.
pub struct OllamaGenerator {
    model: String,
    temperature: f32,
    settings: ProviderSettings,
    client: Client,
}

impl OllamaGenerator {
    pub fn new(model: impl Into<String>, temperature: f32, settings: ProviderSettings) -> Result<Self> {
        let client = settings.build_client()?;
        Ok(Self {
            model: model.into(),
            temperature,
            settings,
            client,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> error::Result<String> {
        let url = self.settings.url("/api/generate");
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.temperature },
        });

        let json = send_json("Ollama", &self.settings.retry, || {
            self.client.post(&url).json(&body)
        })
        .await?;

        json.get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::provider("Invalid Ollama response: missing response"))
    }
}
