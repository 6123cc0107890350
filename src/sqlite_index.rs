//! SQLite-backed [`VectorIndex`].
//!
//! Vectors are stored as little-endian `f32` BLOBs next to the passage
//! text and its [`SourceMetadata`] (as JSON). Queries are brute-force
//! cosine similarity over every row, which is fine for the document
//! counts a single SQLite file is meant to hold.

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use sqlx::{Row, SqliteConnection, SqlitePool};

use ragline_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use ragline_core::error::{Error, Result};
use ragline_core::index::{
    ensure_dims, ensure_query_dims, rank_top_k, validate_k, Replaced, VectorIndex,
};
use ragline_core::models::{IndexRecord, Passage, SourceMetadata};

use crate::{db, migrate};

pub struct SqliteIndex {
    pool: SqlitePool,
}

fn db_err(e: sqlx::Error) -> Error {
    Error::provider(format!("sqlite: {}", e))
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `path` and make sure the schema exists.
    pub async fn open(path: &std::path::Path) -> AnyResult<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }
}

async fn stored_dims(conn: &mut SqliteConnection) -> Result<Option<usize>> {
    let dims: Option<i64> = sqlx::query_scalar("SELECT dims FROM records LIMIT 1")
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(dims.map(|d| d as usize))
}

async fn insert_records(conn: &mut SqliteConnection, records: &[IndexRecord]) -> Result<()> {
    for r in records {
        let metadata_json = serde_json::to_string(&r.metadata)
            .map_err(|e| Error::provider(format!("sqlite: encode metadata: {}", e)))?;
        sqlx::query(
            r#"
            INSERT INTO records (id, document_id, chunk_index, start_offset, length,
                                 text, metadata_json, dims, embedding)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                document_id = excluded.document_id,
                chunk_index = excluded.chunk_index,
                start_offset = excluded.start_offset,
                length = excluded.length,
                text = excluded.text,
                metadata_json = excluded.metadata_json,
                dims = excluded.dims,
                embedding = excluded.embedding
            "#,
        )
        .bind(&r.id)
        .bind(&r.metadata.document_id)
        .bind(r.metadata.chunk_index as i64)
        .bind(r.metadata.start_offset as i64)
        .bind(r.metadata.length as i64)
        .bind(&r.text)
        .bind(&metadata_json)
        .bind(r.vector.len() as i64)
        .bind(vec_to_blob(&r.vector))
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    }
    Ok(())
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    fn backend(&self) -> &str {
        "sqlite"
    }

    async fn upsert(&self, records: &[IndexRecord]) -> Result<usize> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        ensure_dims(stored_dims(&mut *tx).await?, records)?;
        insert_records(&mut *tx, records).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(records.len())
    }

    /// Delete and re-insert inside one transaction; on any error the
    /// transaction is dropped and rolled back.
    async fn replace_document(&self, document_id: &str, records: &[IndexRecord]) -> Result<Replaced> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        ensure_dims(stored_dims(&mut *tx).await?, records)?;

        let removed = sqlx::query("DELETE FROM records WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?
            .rows_affected() as usize;
        insert_records(&mut *tx, records).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(Replaced {
            written: records.len(),
            removed: Some(removed),
        })
    }

    async fn query(&self, vector: &[f32], k: i64) -> Result<Vec<Passage>> {
        let k = validate_k(k)?;
        let rows = sqlx::query("SELECT text, metadata_json, dims, embedding FROM records ORDER BY seq")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let stored = rows.first().map(|row| row.get::<i64, _>("dims") as usize);
        ensure_query_dims(stored, vector)?;

        let candidates: Vec<Passage> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let metadata_json: String = row.get("metadata_json");
                Passage {
                    text: row.get("text"),
                    score: cosine_similarity(vector, &blob_to_vec(&blob)) as f64,
                    metadata: serde_json::from_str::<SourceMetadata>(&metadata_json).ok(),
                }
            })
            .collect();

        Ok(rank_top_k(candidates, k))
    }

    async fn delete_document(&self, document_id: &str) -> Result<Option<usize>> {
        let result = sqlx::query("DELETE FROM records WHERE document_id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(Some(result.rows_affected() as usize))
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(n as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: Option<&str>, doc: &str, idx: usize, vector: Vec<f32>, text: &str) -> IndexRecord {
        IndexRecord {
            id: id.map(str::to_string),
            vector,
            text: text.to_string(),
            metadata: SourceMetadata {
                document_id: doc.to_string(),
                chunk_index: idx,
                start_offset: idx * 10,
                length: text.chars().count(),
                ingested_at: Some("2026-01-01T00:00:00Z".to_string()),
            },
        }
    }

    async fn open_temp() -> (TempDir, SqliteIndex) {
        let tmp = TempDir::new().unwrap();
        let index = SqliteIndex::open(&tmp.path().join("data/index.sqlite"))
            .await
            .unwrap();
        (tmp, index)
    }

    #[tokio::test]
    async fn test_upsert_query_roundtrip_keeps_metadata() {
        let (_tmp, index) = open_temp().await;
        index
            .upsert(&[
                record(Some("a"), "doc.pdf", 0, vec![1.0, 0.0], "first"),
                record(Some("b"), "doc.pdf", 1, vec![0.0, 1.0], "second"),
            ])
            .await
            .unwrap();

        let result = index.query(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].text, "second");
        let meta = result[0].metadata.as_ref().unwrap();
        assert_eq!(meta.document_id, "doc.pdf");
        assert_eq!(meta.chunk_index, 1);
    }

    #[tokio::test]
    async fn test_same_id_replaces_and_null_id_appends() {
        let (_tmp, index) = open_temp().await;
        index
            .upsert(&[record(Some("a"), "d", 0, vec![1.0], "old")])
            .await
            .unwrap();
        index
            .upsert(&[record(Some("a"), "d", 0, vec![1.0], "new")])
            .await
            .unwrap();
        assert_eq!(index.count().await.unwrap(), 1);

        let r = record(None, "d", 1, vec![1.0], "appended");
        index.upsert(&[r.clone(), r]).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_delete_document_reports_count() {
        let (_tmp, index) = open_temp().await;
        index
            .upsert(&[
                record(Some("a0"), "a", 0, vec![1.0], "a0"),
                record(Some("a1"), "a", 1, vec![1.0], "a1"),
                record(Some("b0"), "b", 0, vec![1.0], "b0"),
            ])
            .await
            .unwrap();
        assert_eq!(index.delete_document("a").await.unwrap(), Some(2));
        assert_eq!(index.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dimension_change_between_ingestions_rejected() {
        let (_tmp, index) = open_temp().await;
        index
            .upsert(&[record(Some("two"), "old.pdf", 0, vec![1.0, 0.0], "passage two")])
            .await
            .unwrap();

        let err = index
            .upsert(&[record(Some("three"), "new.pdf", 0, vec![0.0, 0.0, 1.0], "passage three")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(index.count().await.unwrap(), 1);

        assert!(matches!(
            index.query(&[0.0, 0.0, 1.0], 4).await,
            Err(Error::Configuration(_))
        ));
        assert_eq!(index.query(&[1.0, 0.0], 4).await.unwrap()[0].text, "passage two");
    }

    #[tokio::test]
    async fn test_replace_document_in_one_transaction() {
        let (_tmp, index) = open_temp().await;
        index
            .upsert(&[
                record(Some("a0"), "a", 0, vec![1.0, 0.0], "old a0"),
                record(Some("a1"), "a", 1, vec![1.0, 0.0], "old a1"),
                record(Some("b0"), "b", 0, vec![0.0, 1.0], "b0"),
            ])
            .await
            .unwrap();

        let replaced = index
            .replace_document("a", &[record(Some("a0"), "a", 0, vec![1.0, 0.0], "new a0")])
            .await
            .unwrap();
        assert_eq!(replaced, Replaced { written: 1, removed: Some(2) });
        assert_eq!(index.count().await.unwrap(), 2);
        assert_eq!(index.query(&[1.0, 0.0], 1).await.unwrap()[0].text, "new a0");
    }

    #[tokio::test]
    async fn test_failed_replace_keeps_previous_version() {
        let (_tmp, index) = open_temp().await;
        index
            .upsert(&[record(Some("a0"), "a", 0, vec![1.0, 0.0], "old a0")])
            .await
            .unwrap();

        let result = index
            .replace_document("a", &[record(Some("a0"), "a", 0, vec![1.0, 0.0, 0.0], "new a0")])
            .await;
        assert!(result.is_err());
        assert_eq!(index.count().await.unwrap(), 1);
        assert_eq!(index.query(&[1.0, 0.0], 1).await.unwrap()[0].text, "old a0");
    }

    #[tokio::test]
    async fn test_empty_index_and_bad_k() {
        let (_tmp, index) = open_temp().await;
        assert!(index.query(&[1.0], 4).await.unwrap().is_empty());
        assert!(matches!(
            index.query(&[1.0], 0).await,
            Err(Error::Configuration(_))
        ));
    }
}
