//! Ingestion and retrieval over one collection.
//!
//! Documents are chunked, embedded and added in fixed-size batches. Each batch
//! is atomic; a failed batch leaves the earlier ones in place.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use super::chunker::DocumentChunker;
use super::document::{Document, EmbeddingRecord, RetrievalResult};
use super::retriever::Retriever;
use super::store::{CollectionStats, VectorStore};
use crate::core::config::defaults::DEFAULT_BATCH_SIZE;
use crate::core::errors::{RagError, Result};
use crate::embedding::{ensure_vector_count, EmbeddingProvider};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub added: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    #[serde(flatten)]
    pub collection: CollectionStats,
    pub embedding_model: String,
}

pub struct RagEngine {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    retriever: Retriever,
    chunker: DocumentChunker,
    batch_size: usize,
}

impl RagEngine {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let retriever = Retriever::new(store.clone(), embedder.clone());
        Self {
            store,
            embedder,
            retriever,
            chunker: DocumentChunker::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_chunker(mut self, chunker: DocumentChunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Embeds and stores `documents` as-is, `batch_size` at a time, in order.
    /// Returns the number of records added.
    pub async fn add_documents(&self, documents: &[Document], batch_size: usize) -> Result<usize> {
        if batch_size == 0 {
            return Err(RagError::BadRequest("batch_size must be positive".to_string()));
        }

        let total = documents.len();
        let mut committed = 0;
        for (batch_idx, batch) in documents.chunks(batch_size).enumerate() {
            let offset = batch_idx * batch_size;
            if let Err(e) = self.add_batch(batch, offset).await {
                tracing::warn!(
                    "Ingestion into {} stopped after {} of {} documents: {}",
                    self.store.collection_name(),
                    committed,
                    total,
                    e
                );
                return Err(e);
            }
            committed += batch.len();
            tracing::debug!("Added batch {} ({}/{})", batch_idx + 1, committed, total);
        }

        tracing::info!(
            "Added {} documents to collection {}",
            committed,
            self.store.collection_name()
        );
        Ok(committed)
    }

    async fn add_batch(&self, batch: &[Document], offset: usize) -> Result<()> {
        let texts: Vec<String> = batch.iter().map(|doc| doc.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        ensure_vector_count(texts.len(), &vectors)?;

        let records = batch
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (doc, vector))| EmbeddingRecord {
                id: format!("doc_{}_{}", offset + i, Uuid::new_v4().simple()),
                vector,
                text: doc.text.clone(),
                metadata: doc.metadata.clone(),
            })
            .collect();

        self.store.add(records).await
    }

    /// Chunks long documents, then adds every chunk.
    pub async fn ingest(&self, documents: &[Document]) -> Result<IngestReport> {
        let chunks: Vec<Document> = self
            .chunker
            .chunk_documents(documents)
            .into_iter()
            .map(Document::from)
            .collect();

        let added = self.add_documents(&chunks, self.batch_size).await?;
        Ok(IngestReport {
            documents: documents.len(),
            chunks: chunks.len(),
            added,
        })
    }

    pub async fn retrieve(&self, query: &str, n_results: usize) -> Result<Vec<RetrievalResult>> {
        self.retriever.retrieve(query, n_results).await
    }

    pub async fn semantic_search(
        &self,
        query: &str,
        language: &str,
        n_results: usize,
    ) -> Result<Vec<RetrievalResult>> {
        self.retriever.semantic_search(query, language, n_results).await
    }

    pub async fn stats(&self) -> Result<EngineStats> {
        Ok(EngineStats {
            collection: self.store.stats().await?,
            embedding_model: self.embedder.model_name().to_string(),
        })
    }

    pub async fn reset(&self) -> Result<()> {
        self.store.reset().await
    }
}
