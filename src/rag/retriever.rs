use std::sync::Arc;

use super::document::RetrievalResult;
use super::store::VectorStore;
use crate::core::errors::{RagError, Result};
use crate::embedding::{ensure_vector_count, EmbeddingProvider};

/// Embeds a query and asks the store for its nearest passages.
///
/// Results keep the store's ordering. Errors from either side are returned
/// as-is; retrying is left to the caller.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub async fn retrieve(&self, query: &str, n_results: usize) -> Result<Vec<RetrievalResult>> {
        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        ensure_vector_count(1, &vectors)?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| RagError::unavailable("embedding backend returned no vector"))?;

        let matches = self.store.query(&vector, n_results).await?;
        Ok(matches
            .into_iter()
            .map(|m| RetrievalResult::from_distance(m.text, m.metadata, m.distance))
            .collect())
    }

    /// Retrieval entry point for question answering. The language is recorded
    /// but does not filter the collection.
    pub async fn semantic_search(
        &self,
        query: &str,
        language: &str,
        n_results: usize,
    ) -> Result<Vec<RetrievalResult>> {
        tracing::debug!(language = %language, n_results, "Semantic search: {}", query);
        self.retrieve(query, n_results).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use crate::rag::distance::DistanceMetric;
    use crate::rag::document::{EmbeddingRecord, Metadata};
    use crate::rag::sqlite::SqliteVectorStore;
    use async_trait::async_trait;

    struct BrokenEmbedder;

    #[async_trait]
    impl EmbeddingProvider for BrokenEmbedder {
        fn model_name(&self) -> &str {
            "broken"
        }

        fn dimension(&self) -> usize {
            3
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(Vec::new())
        }
    }

    async fn seeded(tmp: &tempfile::TempDir) -> Retriever {
        let embedder = Arc::new(HashingEmbedder::new("hashing", 64));
        let store = SqliteVectorStore::create_or_open(tmp.path(), "docs", DistanceMetric::Cosine)
            .await
            .unwrap();

        let texts = [
            "python list comprehension creates lists",
            "rust borrow checker and ownership",
            "javascript promises and async await",
        ];
        let records = texts
            .iter()
            .enumerate()
            .map(|(i, text)| EmbeddingRecord {
                id: format!("doc_{i}"),
                vector: embedder.embed_text(text),
                text: text.to_string(),
                metadata: Metadata::new().with_title(format!("Doc {i}")),
            })
            .collect();
        store.add(records).await.unwrap();

        Retriever::new(Arc::new(store), embedder)
    }

    #[tokio::test]
    async fn results_are_ordered_by_distance_with_relevance() {
        let tmp = tempfile::tempdir().unwrap();
        let retriever = seeded(&tmp).await;

        let results = retriever.retrieve("python list comprehension", 3).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].metadata.title.as_deref(), Some("Doc 0"));
        assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
        for result in &results {
            assert_eq!(result.relevance, 1.0 - result.distance / 2.0);
        }
    }

    #[tokio::test]
    async fn semantic_search_ignores_language_for_filtering() {
        let tmp = tempfile::tempdir().unwrap();
        let retriever = seeded(&tmp).await;

        let with_language = retriever.semantic_search("ownership", "Rust", 2).await.unwrap();
        let other_language = retriever.semantic_search("ownership", "Python", 2).await.unwrap();

        assert_eq!(with_language, other_language);
    }

    #[tokio::test]
    async fn missing_query_vector_is_a_provider_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::create_or_open(tmp.path(), "docs", DistanceMetric::Cosine)
            .await
            .unwrap();
        let retriever = Retriever::new(Arc::new(store), Arc::new(BrokenEmbedder));

        let err = retriever.retrieve("anything", 3).await.unwrap_err();
        assert!(matches!(err, RagError::ProviderUnavailable(_)));
    }
}
