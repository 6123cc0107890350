//! In-memory [`VectorIndex`] for tests and single-process deployments.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`; queries are
//! brute-force cosine similarity over every stored vector. Readers run
//! concurrently, writers are serialized by the lock, so a document
//! replacement is never observed half-applied.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{ensure_dims, ensure_query_dims, rank_top_k, validate_k, Replaced, VectorIndex};
use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};
use crate::models::{IndexRecord, Passage};

struct StoredRecord {
    id: Option<String>,
    record: IndexRecord,
}

/// In-memory vector index.
pub struct InMemoryIndex {
    records: RwLock<Vec<StoredRecord>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<StoredRecord>>> {
        self.records
            .read()
            .map_err(|_| Error::provider("in-memory index lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<StoredRecord>>> {
        self.records
            .write()
            .map_err(|_| Error::provider("in-memory index lock poisoned"))
    }
}

fn stored_dims(stored: &[StoredRecord]) -> Option<usize> {
    stored.first().map(|s| s.record.vector.len())
}

fn insert(stored: &mut Vec<StoredRecord>, records: &[IndexRecord]) {
    for r in records {
        if let Some(id) = &r.id {
            stored.retain(|s| s.id.as_deref() != Some(id.as_str()));
        }
        stored.push(StoredRecord {
            id: r.id.clone(),
            record: r.clone(),
        });
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn upsert(&self, records: &[IndexRecord]) -> Result<usize> {
        let mut stored = self.write()?;
        ensure_dims(stored_dims(&stored), records)?;
        insert(&mut stored, records);
        Ok(records.len())
    }

    async fn replace_document(&self, document_id: &str, records: &[IndexRecord]) -> Result<Replaced> {
        let mut stored = self.write()?;
        ensure_dims(stored_dims(&stored), records)?;
        let before = stored.len();
        stored.retain(|s| s.record.metadata.document_id != document_id);
        let removed = before - stored.len();
        insert(&mut stored, records);
        Ok(Replaced {
            written: records.len(),
            removed: Some(removed),
        })
    }

    async fn query(&self, vector: &[f32], k: i64) -> Result<Vec<Passage>> {
        let k = validate_k(k)?;
        let stored = self.read()?;
        ensure_query_dims(stored_dims(&stored), vector)?;
        let candidates: Vec<Passage> = stored
            .iter()
            .map(|s| Passage {
                text: s.record.text.clone(),
                score: cosine_similarity(vector, &s.record.vector) as f64,
                metadata: Some(s.record.metadata.clone()),
            })
            .collect();
        Ok(rank_top_k(candidates, k))
    }

    async fn delete_document(&self, document_id: &str) -> Result<Option<usize>> {
        let mut stored = self.write()?;
        let before = stored.len();
        stored.retain(|s| s.record.metadata.document_id != document_id);
        Ok(Some(before - stored.len()))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceMetadata;

    fn record(id: Option<&str>, doc: &str, idx: usize, vector: Vec<f32>, text: &str) -> IndexRecord {
        IndexRecord {
            id: id.map(str::to_string),
            vector,
            text: text.to_string(),
            metadata: SourceMetadata {
                document_id: doc.to_string(),
                chunk_index: idx,
                start_offset: 0,
                length: text.chars().count(),
                ingested_at: None,
            },
        }
    }

    #[tokio::test]
    async fn test_empty_index_returns_no_passages() {
        let index = InMemoryIndex::new();
        let result = index.query(&[1.0, 0.0], 4).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_query_ranks_by_similarity() {
        let index = InMemoryIndex::new();
        index
            .upsert(&[
                record(None, "d", 0, vec![0.0, 1.0], "orthogonal"),
                record(None, "d", 1, vec![1.0, 0.0], "same"),
                record(None, "d", 2, vec![1.0, 1.0], "diagonal"),
            ])
            .await
            .unwrap();
        let result = index.query(&[1.0, 0.0], 2).await.unwrap();
        let texts: Vec<&str> = result.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["same", "diagonal"]);
        assert!(result[0].score > result[1].score);
    }

    #[tokio::test]
    async fn test_fewer_matches_than_k_not_padded() {
        let index = InMemoryIndex::new();
        index
            .upsert(&[
                record(None, "d", 0, vec![1.0, 0.0], "a"),
                record(None, "d", 1, vec![0.5, 0.5], "b"),
            ])
            .await
            .unwrap();
        assert_eq!(index.query(&[1.0, 0.0], 4).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_non_positive_k_rejected() {
        let index = InMemoryIndex::new();
        assert!(matches!(
            index.query(&[1.0], 0).await,
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_upsert_with_id_replaces() {
        let index = InMemoryIndex::new();
        index
            .upsert(&[record(Some("r1"), "d", 0, vec![1.0], "old")])
            .await
            .unwrap();
        index
            .upsert(&[record(Some("r1"), "d", 0, vec![1.0], "new")])
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 1);
        let result = index.query(&[1.0], 1).await.unwrap();
        assert_eq!(result[0].text, "new");
    }

    #[tokio::test]
    async fn test_upsert_without_id_appends() {
        let index = InMemoryIndex::new();
        let r = record(None, "d", 0, vec![1.0], "dup");
        index.upsert(&[r.clone()]).await.unwrap();
        index.upsert(&[r]).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_mixed_dimensions_rejected() {
        let index = InMemoryIndex::new();
        index
            .upsert(&[record(None, "a.pdf", 0, vec![1.0, 0.0], "two")])
            .await
            .unwrap();
        let err = index
            .upsert(&[record(None, "b.pdf", 0, vec![1.0, 0.0, 0.0], "three")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(index.count().await.unwrap(), 1);
        assert!(matches!(
            index.query(&[1.0, 0.0, 0.0], 4).await,
            Err(Error::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_replace_document_swaps_only_that_document() {
        let index = InMemoryIndex::new();
        index
            .upsert(&[
                record(Some("a0"), "a.pdf", 0, vec![1.0], "old a0"),
                record(Some("a1"), "a.pdf", 1, vec![1.0], "old a1"),
                record(Some("b0"), "b.pdf", 0, vec![1.0], "b0"),
            ])
            .await
            .unwrap();
        let replaced = index
            .replace_document("a.pdf", &[record(Some("a0"), "a.pdf", 0, vec![1.0], "new a0")])
            .await
            .unwrap();
        assert_eq!(replaced, Replaced { written: 1, removed: Some(2) });
        assert_eq!(index.count().await.unwrap(), 2);
        let texts: Vec<String> = index
            .query(&[1.0], 4)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.text)
            .collect();
        assert!(texts.contains(&"new a0".to_string()));
        assert!(!texts.iter().any(|t| t.starts_with("old")));
    }

    #[tokio::test]
    async fn test_rejected_replace_keeps_previous_version() {
        let index = InMemoryIndex::new();
        index
            .upsert(&[record(Some("a0"), "a.pdf", 0, vec![1.0, 0.0], "old")])
            .await
            .unwrap();
        let err = index
            .replace_document("a.pdf", &[record(Some("a0"), "a.pdf", 0, vec![1.0], "new")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(index.query(&[1.0, 0.0], 1).await.unwrap()[0].text, "old");
    }

    #[tokio::test]
    async fn test_delete_document_only_touches_that_document() {
        let index = InMemoryIndex::new();
        index
            .upsert(&[
                record(None, "a.pdf", 0, vec![1.0], "a0"),
                record(None, "a.pdf", 1, vec![1.0], "a1"),
                record(None, "b.pdf", 0, vec![1.0], "b0"),
            ])
            .await
            .unwrap();
        assert_eq!(index.delete_document("a.pdf").await.unwrap(), Some(2));
        assert_eq!(index.count().await.unwrap(), 1);
    }
}
