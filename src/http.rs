//! Shared HTTP plumbing for provider clients.
//!
//! Every provider owns one [`reqwest::Client`] built at construction time
//! with the configured timeout, and sends requests through [`send_json`],
//! which applies the bounded retry policy:
//!
//! - HTTP 429 and 5xx → retry with exponential backoff
//! - other 4xx → fail immediately
//! - connection errors → retry
//! - request timeouts → fail immediately (a timeout is reported, never retried silently)
//! - backoff: `base`, `2×base`, `4×base`, … (exponent capped at 5)
//!
//! All failures are mapped to [`ragline_core::Error::Provider`].

use std::time::Duration;

use ragline_core::error::{Error, Result};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

/// Bounded retry policy for provider calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(1),
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << (attempt.saturating_sub(1)).min(5))
    }
}

/// Connection settings shared by every HTTP-backed client.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Base URL without a trailing slash.
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl ProviderSettings {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            timeout,
            retry: RetryPolicy::new(3),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn require_api_key(&self, provider: &str) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| Error::provider(format!("{} API key is not set", provider)))
    }

    /// Build the HTTP client for this provider. Called once per client.
    pub fn build_client(&self) -> anyhow::Result<Client> {
        Ok(Client::builder().timeout(self.timeout).build()?)
    }
}

/// Read an API key from the environment, treating blank values as unset.
pub fn env_key(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Send a JSON request with retry, returning the parsed JSON body.
///
/// `build` is called once per attempt to produce a fresh request.
pub async fn send_json<F>(provider: &str, retry: &RetryPolicy, build: F) -> Result<Value>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=retry.max_retries {
        if attempt > 0 {
            let delay = retry.delay(attempt);
            tracing::warn!(provider, attempt, delay_ms = delay.as_millis() as u64, "retrying request");
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response.json::<Value>().await.map_err(|e| {
                        Error::provider(format!("{} returned malformed JSON: {}", provider, e))
                    });
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = Error::provider(format!("{} API error {}: {}", provider, status, body_text));

                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(err);
                    continue;
                }

                return Err(err);
            }
            Err(e) if e.is_timeout() => {
                return Err(Error::provider(format!("{} request timed out: {}", provider, e)));
            }
            Err(e) => {
                last_err = Some(Error::provider(format!("{} connection error: {}", provider, e)));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| Error::provider(format!("{} request failed after retries", provider))))
}

/// Convert a JSON array of numbers into an `f32` vector.
///
/// Non-numeric entries are a malformed response, never silently zeroed.
pub fn json_to_vector(provider: &str, value: &Value) -> Result<Vec<f32>> {
    let arr = value
        .as_array()
        .ok_or_else(|| Error::provider(format!("{} response: embedding is not an array", provider)))?;
    if arr.is_empty() {
        return Err(Error::provider(format!("{} response: empty embedding", provider)));
    }
    arr.iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| Error::provider(format!("{} response: non-numeric embedding value", provider)))
        })
        .collect()
}
