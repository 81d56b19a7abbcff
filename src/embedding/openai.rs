use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::{ensure_vector_count, EmbeddingProvider};
use crate::core::errors::{RagError, Result};
use crate::llm::classify_status;

/// Embeddings from an OpenAI-compatible `/embeddings` endpoint.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
    client: Client,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(RagError::internal)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            dimension,
            client,
        })
    }
}

/// Pulls vectors out of an embeddings payload, honouring the `index` field
/// when the backend returns items out of order.
pub(crate) fn parse_embeddings(payload: &Value) -> Result<Vec<Vec<f32>>> {
    let data = payload["data"]
        .as_array()
        .ok_or_else(|| RagError::unavailable("embedding response has no data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let values = item["embedding"]
            .as_array()
            .ok_or_else(|| RagError::unavailable("embedding item has no vector"))?;
        let vector: Vec<f32> = values
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<_>>()
            .ok_or_else(|| RagError::unavailable("embedding vector holds a non-number"))?;
        let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(position);
        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": texts,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let res = request.send().await?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let payload: Value = res.json().await?;
        let vectors = parse_embeddings(&payload)?;
        ensure_vector_count(texts.len(), &vectors)?;
        tracing::debug!("Embedded {} texts with {}", texts.len(), self.model);
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vectors_in_index_order() {
        let payload = json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });

        let vectors = parse_embeddings(&payload).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn malformed_payloads_are_provider_failures() {
        let missing = parse_embeddings(&json!({ "error": "boom" })).unwrap_err();
        assert!(matches!(missing, RagError::ProviderUnavailable(_)));

        let bad_value = parse_embeddings(&json!({ "data": [{ "embedding": [1.0, "x"] }] })).unwrap_err();
        assert!(matches!(bad_value, RagError::ProviderUnavailable(_)));
    }

    #[test]
    fn short_responses_are_rejected() {
        let err = ensure_vector_count(3, &[vec![1.0], vec![0.5]]).unwrap_err();
        assert!(matches!(err, RagError::ProviderUnavailable(_)));
    }

    #[tokio::test]
    async fn empty_input_skips_the_network() {
        let embedder = OpenAiEmbedder::new("http://127.0.0.1:9", None, "text-embedding-3-small", 1536).unwrap();
        assert!(embedder.embed(&[]).await.unwrap().is_empty());
    }
}
