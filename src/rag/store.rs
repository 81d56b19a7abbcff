//! Abstract interface over embedding collections.
//!
//! The shipped implementation is `SqliteVectorStore` in the `sqlite` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::distance::DistanceMetric;
use super::document::{EmbeddingRecord, Metadata};
use crate::core::errors::{Result, StoreError};

/// A stored record matched by a query, closest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub collection_name: String,
    pub document_count: usize,
    pub distance_metric: DistanceMetric,
    /// `None` until the first record pins the dimension.
    pub dimension: Option<usize>,
    pub persist_directory: String,
}

/// A named collection of embedding records.
///
/// Implementations must:
/// - reject ids that already exist in the collection instead of overwriting
/// - answer `query` with the collection's fixed metric, closest first
/// - allow concurrent readers while serialising writers
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn collection_name(&self) -> &str;

    fn metric(&self) -> DistanceMetric;

    /// Append records. The call is atomic: on any error nothing is added.
    async fn add(&self, records: Vec<EmbeddingRecord>) -> Result<()>;

    /// Up to `k` nearest records. Fewer when the collection is smaller.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryMatch>>;

    async fn count(&self) -> Result<usize>;

    async fn stats(&self) -> Result<CollectionStats>;

    /// Remove records by id; returns how many existed.
    async fn delete(&self, ids: &[String]) -> Result<usize>;

    /// Drop every record in the collection. The metric is kept.
    async fn reset(&self) -> Result<()>;

    /// Column-oriented `add`: the four sequences must line up.
    async fn add_columns(
        &self,
        ids: Vec<String>,
        vectors: Vec<Vec<f32>>,
        texts: Vec<String>,
        metadatas: Vec<Metadata>,
    ) -> Result<()> {
        let n = ids.len();
        if vectors.len() != n || texts.len() != n || metadatas.len() != n {
            return Err(StoreError::ColumnMismatch(format!(
                "ids={}, vectors={}, texts={}, metadatas={}",
                n,
                vectors.len(),
                texts.len(),
                metadatas.len()
            ))
            .into());
        }

        let records = ids
            .into_iter()
            .zip(vectors)
            .zip(texts)
            .zip(metadatas)
            .map(|(((id, vector), text), metadata)| EmbeddingRecord {
                id,
                vector,
                text,
                metadata,
            })
            .collect();

        self.add(records).await
    }
}
