use async_trait::async_trait;

use crate::core::errors::{RagError, Result};

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// model identifier reported in stats (e.g. "hashing-384")
    fn model_name(&self) -> &str;

    /// width of every vector this provider returns
    fn dimension(&self) -> usize;

    /// embed a batch of texts, one vector per input, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Rejects a backend response that does not line up with its inputs.
pub fn ensure_vector_count(expected: usize, vectors: &[Vec<f32>]) -> Result<()> {
    if vectors.len() != expected {
        return Err(RagError::ProviderUnavailable(format!(
            "embedding backend returned {} vectors for {} inputs",
            vectors.len(),
            expected
        )));
    }
    Ok(())
}
