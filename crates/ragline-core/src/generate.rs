//! Generative model contract.

use async_trait::async_trait;

use crate::error::Result;

/// Produces text from a rendered prompt.
///
/// Failures (network, quota, malformed response) surface as
/// [`Error::Provider`](crate::error::Error::Provider).
#[async_trait]
pub trait Generator: Send + Sync {
    /// Model identifier (e.g. `"gemini-flash-latest"`).
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}
