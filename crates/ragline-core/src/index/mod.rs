//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the narrow contract the pipeline consumes:
//! persist `(vector, text, metadata)` records and answer nearest-neighbour
//! queries. Backends (in-memory here; SQLite and Pinecone in the app crate)
//! are constructed once and shared across requests.

pub mod memory;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{IndexRecord, Passage};

/// Persists indexed records and answers nearest-neighbour queries.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorIndex::upsert) | Insert records; replace those whose `id` already exists |
/// | [`replace_document`](VectorIndex::replace_document) | Swap a document's records for a new version |
/// | [`query`](VectorIndex::query) | Top-`k` passages by descending score |
/// | [`delete_document`](VectorIndex::delete_document) | Purge every record of one document |
/// | [`count`](VectorIndex::count) | Number of stored records |
///
/// Every vector in one index has the same dimension. Writing or querying
/// with another dimension fails with [`Error::Configuration`].
///
/// Service failures surface as [`Error::Provider`].
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name used in logs and diagnostics (e.g. `"sqlite"`).
    fn backend(&self) -> &str;

    /// Store records. Idempotent for records with an `id`; records without
    /// one are appended. Returns the number of records written.
    async fn upsert(&self, records: &[IndexRecord]) -> Result<usize>;

    /// Replace every record of `document_id` with `records`.
    ///
    /// If this fails, the previous version stays queryable: backends either
    /// apply the whole swap or none of it, or write the new records before
    /// removing the old ones.
    async fn replace_document(&self, document_id: &str, records: &[IndexRecord]) -> Result<Replaced>;

    /// Return at most `k` passages sorted by descending score.
    ///
    /// `k <= 0` fails with [`Error::Configuration`].
    async fn query(&self, vector: &[f32], k: i64) -> Result<Vec<Passage>>;

    /// Remove all records whose metadata names `document_id`.
    ///
    /// Returns the number removed, or `None` when the backend does not
    /// report it.
    async fn delete_document(&self, document_id: &str) -> Result<Option<usize>>;

    /// Number of records currently stored.
    async fn count(&self) -> Result<usize>;
}

/// Outcome of [`VectorIndex::replace_document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replaced {
    pub written: usize,
    /// Previous records of the document that were removed, when the
    /// backend reports it.
    pub removed: Option<usize>,
}

/// Check incoming records against the dimension already held by an index.
///
/// An empty index (`stored == None`) adopts the dimension of the first
/// record; every other record must then match it.
pub fn ensure_dims(stored: Option<usize>, records: &[IndexRecord]) -> Result<()> {
    let expected = match stored.or_else(|| records.first().map(|r| r.vector.len())) {
        Some(d) => d,
        None => return Ok(()),
    };
    for (i, r) in records.iter().enumerate() {
        if r.vector.len() != expected {
            return Err(Error::configuration(format!(
                "record {} has dimension {}, index holds {}-dimensional vectors",
                i,
                r.vector.len(),
                expected
            )));
        }
    }
    Ok(())
}

/// Check a query vector against the dimension held by an index.
pub fn ensure_query_dims(stored: Option<usize>, vector: &[f32]) -> Result<()> {
    match stored {
        Some(d) if d != vector.len() => Err(Error::configuration(format!(
            "query vector has dimension {}, index holds {}-dimensional vectors",
            vector.len(),
            d
        ))),
        _ => Ok(()),
    }
}

/// Validate a fan-out value, returning it as a `usize`.
pub fn validate_k(k: i64) -> Result<usize> {
    if k <= 0 {
        return Err(Error::configuration(format!("k must be >= 1, got {}", k)));
    }
    Ok(k as usize)
}

/// Sort passages by descending score and keep the best `k`.
///
/// Ties keep their insertion order.
pub fn rank_top_k(mut passages: Vec<Passage>, k: usize) -> Vec<Passage> {
    passages.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    passages.truncate(k);
    passages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceMetadata;

    fn record(vector: Vec<f32>) -> IndexRecord {
        IndexRecord {
            id: None,
            vector,
            text: "t".into(),
            metadata: SourceMetadata {
                document_id: "d".into(),
                chunk_index: 0,
                start_offset: 0,
                length: 1,
                ingested_at: None,
            },
        }
    }

    #[test]
    fn test_ensure_dims_against_stored() {
        assert!(ensure_dims(Some(2), &[record(vec![1.0, 0.0])]).is_ok());
        let err = ensure_dims(Some(2), &[record(vec![1.0, 0.0, 0.0])]).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.message().contains("index holds 2-dimensional"));
    }

    #[test]
    fn test_ensure_dims_empty_index_uses_first_record() {
        assert!(ensure_dims(None, &[]).is_ok());
        assert!(ensure_dims(None, &[record(vec![1.0; 3]), record(vec![0.5; 3])]).is_ok());
        assert!(matches!(
            ensure_dims(None, &[record(vec![1.0; 3]), record(vec![0.5; 2])]),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_ensure_query_dims() {
        assert!(ensure_query_dims(None, &[1.0]).is_ok());
        assert!(ensure_query_dims(Some(2), &[1.0, 0.0]).is_ok());
        assert!(matches!(
            ensure_query_dims(Some(2), &[1.0, 0.0, 0.0]),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_k() {
        assert_eq!(validate_k(4).unwrap(), 4);
        assert!(matches!(validate_k(0), Err(Error::Configuration(_))));
        assert!(matches!(validate_k(-3), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_rank_top_k_orders_and_truncates() {
        let passages = vec![
            Passage::new("low", 0.1),
            Passage::new("high", 0.9),
            Passage::new("mid", 0.5),
        ];
        let ranked = rank_top_k(passages, 2);
        let texts: Vec<&str> = ranked.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["high", "mid"]);
    }

    #[test]
    fn test_rank_top_k_stable_on_ties() {
        let passages = vec![Passage::new("first", 0.5), Passage::new("second", 0.5)];
        let ranked = rank_top_k(passages, 5);
        assert_eq!(ranked[0].text, "first");
        assert_eq!(ranked[1].text, "second");
    }
}
