//! Per-call timeouts for the external collaborators.
//!
//! Each wrapper races the inner call against `tokio::time::timeout`. An
//! expired deadline becomes [`Error::Provider`]; the call is not retried
//! here, and the abandoned future is simply dropped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use ragline_core::embedding::Embedder;
use ragline_core::error::{Error, Result};
use ragline_core::generate::Generator;
use ragline_core::index::{Replaced, VectorIndex};
use ragline_core::models::{IndexRecord, Passage};

async fn bounded<T>(what: &str, limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::provider(format!("{} timed out after {:?}", what, limit)))?
}

pub struct TimeoutEmbedder {
    inner: Arc<dyn Embedder>,
    limit: Duration,
}

impl TimeoutEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl Embedder for TimeoutEmbedder {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    fn dims(&self) -> usize {
        self.inner.dims()
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bounded("embed", self.limit, self.inner.embed_many(texts)).await
    }
}

pub struct TimeoutIndex {
    inner: Arc<dyn VectorIndex>,
    limit: Duration,
}

impl TimeoutIndex {
    pub fn new(inner: Arc<dyn VectorIndex>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl VectorIndex for TimeoutIndex {
    fn backend(&self) -> &str {
        self.inner.backend()
    }

    async fn upsert(&self, records: &[IndexRecord]) -> Result<usize> {
        bounded("upsert", self.limit, self.inner.upsert(records)).await
    }

    async fn replace_document(&self, document_id: &str, records: &[IndexRecord]) -> Result<Replaced> {
        bounded(
            "replace",
            self.limit,
            self.inner.replace_document(document_id, records),
        )
        .await
    }

    async fn query(&self, vector: &[f32], k: i64) -> Result<Vec<Passage>> {
        bounded("query", self.limit, self.inner.query(vector, k)).await
    }

    async fn delete_document(&self, document_id: &str) -> Result<Option<usize>> {
        bounded("delete", self.limit, self.inner.delete_document(document_id)).await
    }

    async fn count(&self) -> Result<usize> {
        bounded("count", self.limit, self.inner.count()).await
    }
}

pub struct TimeoutGenerator {
    inner: Arc<dyn Generator>,
    limit: Duration,
}

impl TimeoutGenerator {
    pub fn new(inner: Arc<dyn Generator>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl Generator for TimeoutGenerator {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        bounded("generate", self.limit, self.inner.generate(prompt)).await
    }
}
