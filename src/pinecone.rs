//! Pinecone data-plane [`VectorIndex`].
//!
//! Talks to the index host directly (`https://<index>-<project>.svc.<env>.pinecone.io`).
//! Pinecone metadata must be flat, so [`SourceMetadata`] is spread into
//! top-level keys and the passage text is stored under `"text"`.
//!
//! Pinecone has no transactions. A document replacement upserts the new
//! records over their deterministic ids first and only then deletes the
//! stale tail (`chunk_index` past the new version), so a failed write
//! leaves the previous version queryable.

use std::time::Duration;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Map, Value};

use ragline_core::error::{Error, Result};
use ragline_core::index::{validate_k, Replaced, VectorIndex};
use ragline_core::models::{IndexRecord, Passage, SourceMetadata};

use crate::http::{send_json, ProviderSettings, RetryPolicy};

pub const API_VERSION: &str = "2025-04";
/// Maximum vectors per upsert request.
pub const UPSERT_BATCH: usize = 100;

pub struct PineconeIndex {
    namespace: String,
    settings: ProviderSettings,
    client: Client,
}

impl PineconeIndex {
    pub fn new(host: &str, api_key: Option<String>, namespace: impl Into<String>, timeout: Duration) -> AnyResult<Self> {
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };
        let settings = ProviderSettings::new(host, api_key, timeout);
        let client = settings.build_client()?;
        Ok(Self {
            namespace: namespace.into(),
            settings,
            client,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.settings = self.settings.with_retry(retry);
        self
    }

    fn post(&self, path: &str, key: &str, body: &Value) -> RequestBuilder {
        self.client
            .post(self.settings.url(path))
            .header("Api-Key", key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(body)
    }

    async fn upsert_batches(&self, records: &[IndexRecord]) -> Result<usize> {
        let mut written = 0usize;
        for batch in records.chunks(UPSERT_BATCH) {
            let vectors: Vec<Value> = batch.iter().map(record_to_vector).collect();
            let json = self
                .call(
                    "/vectors/upsert",
                    json!({ "vectors": vectors, "namespace": self.namespace }),
                )
                .await?;
            let count = json
                .get("upsertedCount")
                .and_then(|c| c.as_u64())
                .map(|c| c as usize)
                .unwrap_or(batch.len());
            written += count;
        }
        Ok(written)
    }

    async fn call(&self, path: &str, body: Value) -> Result<Value> {
        let key = self.settings.require_api_key("Pinecone")?;
        send_json("Pinecone", &self.settings.retry, || self.post(path, key, &body)).await
    }
}

fn record_to_vector(r: &IndexRecord) -> Value {
    let mut metadata = Map::new();
    metadata.insert("text".into(), json!(r.text));
    metadata.insert("document_id".into(), json!(r.metadata.document_id));
    metadata.insert("chunk_index".into(), json!(r.metadata.chunk_index));
    metadata.insert("start_offset".into(), json!(r.metadata.start_offset));
    metadata.insert("length".into(), json!(r.metadata.length));
    if let Some(ts) = &r.metadata.ingested_at {
        metadata.insert("ingested_at".into(), json!(ts));
    }

    let id = r
        .id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    json!({
        "id": id,
        "values": r.vector,
        "metadata": metadata,
    })
}

fn match_to_passage(m: &Value) -> Result<Passage> {
    let score = m
        .get("score")
        .and_then(|s| s.as_f64())
        .ok_or_else(|| Error::provider("Invalid Pinecone response: match without score"))?;
    let metadata = m.get("metadata");
    let text = metadata
        .and_then(|md| md.get("text"))
        .and_then(|t| t.as_str())
        .ok_or_else(|| Error::provider("Invalid Pinecone response: match without text"))?
        .to_string();

    let source = metadata.and_then(|md| {
        let as_usize = |key: &str| md.get(key).and_then(|v| v.as_f64()).map(|f| f as usize);
        Some(SourceMetadata {
            document_id: md.get("document_id")?.as_str()?.to_string(),
            chunk_index: as_usize("chunk_index")?,
            start_offset: as_usize("start_offset").unwrap_or(0),
            length: as_usize("length").unwrap_or(0),
            ingested_at: md
                .get("ingested_at")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    });

    Ok(Passage {
        text,
        score,
        metadata: source,
    })
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn backend(&self) -> &str {
        "pinecone"
    }

    async fn upsert(&self, records: &[IndexRecord]) -> Result<usize> {
        self.upsert_batches(records).await
    }

    async fn replace_document(&self, document_id: &str, records: &[IndexRecord]) -> Result<Replaced> {
        if records.iter().any(|r| r.id.is_none()) {
            return Err(Error::configuration(
                "Pinecone document replacement needs a stable id on every record",
            ));
        }
        let written = self.upsert_batches(records).await?;
        let keep = records
            .iter()
            .map(|r| r.metadata.chunk_index + 1)
            .max()
            .unwrap_or(0);
        self.call(
            "/vectors/delete",
            json!({
                "filter": {
                    "document_id": { "$eq": document_id },
                    "chunk_index": { "$gte": keep },
                },
                "namespace": self.namespace,
            }),
        )
        .await?;
        Ok(Replaced {
            written,
            removed: None,
        })
    }

    async fn query(&self, vector: &[f32], k: i64) -> Result<Vec<Passage>> {
        let k = validate_k(k)?;
        let json = self
            .call(
                "/query",
                json!({
                    "vector": vector,
                    "topK": k,
                    "includeMetadata": true,
                    "includeValues": false,
                    "namespace": self.namespace,
                }),
            )
            .await?;

        let matches = json
            .get("matches")
            .and_then(|m| m.as_array())
            .ok_or_else(|| Error::provider("Invalid Pinecone response: missing matches"))?;

        let mut passages = matches
            .iter()
            .map(match_to_passage)
            .collect::<Result<Vec<_>>>()?;
        passages.truncate(k);
        Ok(passages)
    }

    async fn delete_document(&self, document_id: &str) -> Result<Option<usize>> {
        self.call(
            "/vectors/delete",
            json!({
                "filter": { "document_id": { "$eq": document_id } },
                "namespace": self.namespace,
            }),
        )
        .await?;
        Ok(None)
    }

    async fn count(&self) -> Result<usize> {
        let json = self.call("/describe_index_stats", json!({})).await?;

        if !self.namespace.is_empty() {
            return Ok(json
                .pointer(&format!("/namespaces/{}/vectorCount", self.namespace))
                .and_then(|c| c.as_u64())
                .unwrap_or(0) as usize);
        }

        json.get("totalVectorCount")
            .and_then(|c| c.as_u64())
            .map(|c| c as usize)
            .ok_or_else(|| Error::provider("Invalid Pinecone response: missing totalVectorCount"))
    }
}
