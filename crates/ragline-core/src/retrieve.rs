//! Query-side retrieval: question → query vector → top-`k` passages.
//!
//! The retriever passes the vector index ranking through untouched. It
//! only truncates to `k` in case a backend over-returns; it never
//! re-orders. An empty index yields an empty [`RetrievalResult`], which
//! is a valid result and not an error.

use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::index::{validate_k, VectorIndex};
use crate::models::RetrievalResult;

/// Borrows the shared embedder and index for the duration of one query.
pub struct Retriever<'a> {
    embedder: &'a dyn Embedder,
    index: &'a dyn VectorIndex,
}

impl<'a> Retriever<'a> {
    pub fn new(embedder: &'a dyn Embedder, index: &'a dyn VectorIndex) -> Self {
        Self { embedder, index }
    }

    /// Embed `question` and return the index's top-`k` passages.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] if `k <= 0`.
    /// - [`Error::EmptyInput`] if `question` is blank.
    /// - [`Error::Provider`] if the embedder or index fails.
    pub async fn retrieve(&self, question: &str, k: i64) -> Result<RetrievalResult> {
        let k = validate_k(k)?;
        if question.trim().is_empty() {
            return Err(Error::empty_input("question is empty"));
        }

        let query_vec = self.embedder.embed(question).await?;
        let mut passages = self.index.query(&query_vec, k as i64).await?;
        passages.truncate(k);

        Ok(RetrievalResult::new(passages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::memory::InMemoryIndex;
    use crate::models::Passage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ConstEmbedder;

    #[async_trait]
    impl Embedder for ConstEmbedder {
        fn model_name(&self) -> &str {
            "const"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    /// Returns a canned ranking and records the `k` it was asked for.
    struct ScriptedIndex {
        ranking: Vec<Passage>,
        seen_k: Mutex<Option<i64>>,
    }

    #[async_trait]
    impl VectorIndex for ScriptedIndex {
        fn backend(&self) -> &str {
            "scripted"
        }
        async fn upsert(&self, records: &[crate::models::IndexRecord]) -> Result<usize> {
            Ok(records.len())
        }
        async fn replace_document(
            &self,
            _document_id: &str,
            records: &[crate::models::IndexRecord],
        ) -> Result<crate::index::Replaced> {
            Ok(crate::index::Replaced {
                written: records.len(),
                removed: Some(0),
            })
        }
        async fn query(&self, _vector: &[f32], k: i64) -> Result<Vec<Passage>> {
            *self.seen_k.lock().unwrap() = Some(k);
            Ok(self.ranking.clone())
        }
        async fn delete_document(&self, _document_id: &str) -> Result<Option<usize>> {
            Ok(Some(0))
        }
        async fn count(&self) -> Result<usize> {
            Ok(self.ranking.len())
        }
    }

    fn scripted(ranking: Vec<Passage>) -> ScriptedIndex {
        ScriptedIndex {
            ranking,
            seen_k: Mutex::new(None),
        }
    }

    #[tokio::test]
    async fn test_preserves_index_order_even_if_unsorted() {
        // Deliberately not sorted by score: the retriever must not re-rank.
        let index = scripted(vec![
            Passage::new("b", 0.2),
            Passage::new("a", 0.9),
            Passage::new("c", 0.5),
        ]);
        let result = Retriever::new(&ConstEmbedder, &index)
            .retrieve("q", 3)
            .await
            .unwrap();
        assert_eq!(result.texts(), vec!["b", "a", "c"]);
        assert_eq!(*index.seen_k.lock().unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_truncates_over_returning_backend() {
        let index = scripted((0..10).map(|i| Passage::new(i.to_string(), 1.0)).collect());
        let result = Retriever::new(&ConstEmbedder, &index)
            .retrieve("q", 4)
            .await
            .unwrap();
        assert_eq!(result.texts(), vec!["0", "1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_empty_index_gives_empty_result() {
        let index = InMemoryIndex::new();
        let result = Retriever::new(&ConstEmbedder, &index)
            .retrieve("What is the tuition fee?", 4)
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_blank_question_and_bad_k() {
        let index = InMemoryIndex::new();
        let retriever = Retriever::new(&ConstEmbedder, &index);
        assert!(matches!(
            retriever.retrieve("   ", 4).await,
            Err(Error::EmptyInput(_))
        ));
        assert!(matches!(
            retriever.retrieve("q", 0).await,
            Err(Error::Configuration(_))
        ));
    }
}
