//! Embedder contract and vector utilities.
//!
//! Defines the [`Embedder`] trait every embedding backend implements, plus
//! pure helpers for dimensionality checks, similarity and BLOB encoding.
//!
//! Concrete providers (Gemini, OpenAI, Ollama) live in the `ragline` app
//! crate.

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Maps text to fixed-dimension vectors.
///
/// Implementations are constructed once and shared across requests, so
/// they must be `Send + Sync`. A failing call returns
/// [`Error::Provider`]; implementations never substitute a zero vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"models/gemini-embedding-001"`).
    fn model_name(&self) -> &str;

    /// Configured vector dimensionality.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in input order.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_many(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(Error::provider(format!(
                "embedder returned {} vectors for 1 input",
                vectors.len()
            )));
        }
        Ok(vectors.remove(0))
    }
}

/// Reject any vector whose length differs from `expected`.
pub fn check_dims(vectors: &[Vec<f32>], expected: usize) -> Result<()> {
    for (i, v) in vectors.iter().enumerate() {
        if v.len() != expected {
            return Err(Error::configuration(format!(
                "vector {} has dimension {}, index expects {}",
                i,
                v.len(),
                expected
            )));
        }
    }
    Ok(())
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use ragline_core::embedding::{blob_to_vec, vec_to_blob};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero-magnitude operand.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
