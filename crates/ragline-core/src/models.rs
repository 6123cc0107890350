//! Core data types flowing through the ingestion and query paths.
//!
//! Ingestion: [`Document`] → [`Chunk`]s → [`IndexRecord`]s.
//! Query: question → [`RetrievalResult`] → [`Answer`].

use serde::{Deserialize, Serialize};

/// Extracted document text plus a stable identifier (usually the file name).
///
/// Request-scoped: created for an ingestion request and dropped once chunked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// An ordered, overlapping slice of a [`Document`].
///
/// Offsets and lengths are counted in Unicode scalar values (`char`s), not
/// bytes, so a chunk never splits a multi-byte character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Deterministic id derived from the document id and chunk index.
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub start_offset: usize,
    pub length: usize,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
}

impl Chunk {
    /// Exclusive end offset, in chars.
    pub fn end_offset(&self) -> usize {
        self.start_offset + self.length
    }
}

/// Source metadata stored alongside every indexed vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub document_id: String,
    pub chunk_index: usize,
    pub start_offset: usize,
    pub length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingested_at: Option<String>,
}

impl SourceMetadata {
    pub fn for_chunk(chunk: &Chunk) -> Self {
        Self {
            document_id: chunk.document_id.clone(),
            chunk_index: chunk.chunk_index,
            start_offset: chunk.start_offset,
            length: chunk.length,
            ingested_at: None,
        }
    }
}

/// The durable unit handed to [`VectorIndex::upsert`](crate::index::VectorIndex::upsert).
///
/// With `id: Some(_)` an upsert replaces any record carrying the same id;
/// with `id: None` the index appends a new record.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub id: Option<String>,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: SourceMetadata,
}

/// One ranked passage returned by a vector index query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
    pub text: String,
    /// Relevance score, higher is more relevant.
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SourceMetadata>,
}

impl Passage {
    pub fn new(text: impl Into<String>, score: f64) -> Self {
        Self {
            text: text.into(),
            score,
            metadata: None,
        }
    }
}

/// Passages for one query, at most `k` long, in descending relevance order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub passages: Vec<Passage>,
}

impl RetrievalResult {
    pub fn new(passages: Vec<Passage>) -> Self {
        Self { passages }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Passage> {
        self.passages.iter()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.passages.iter().map(|p| p.text.as_str()).collect()
    }
}

/// Generated answer plus the retrieval that grounded it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// `false` when the model applied the not-found branch.
    pub found: bool,
    pub retrieval: RetrievalResult,
}
