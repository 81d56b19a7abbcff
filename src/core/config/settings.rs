//! Typed view over the merged YAML configuration.
//!
//! Every section and field has a default, so a missing or partial
//! `config.yml` still yields a usable [`AppSettings`].

use serde::{Deserialize, Serialize};

use super::defaults::*;
use crate::rag::DistanceMetric;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub rag: RagSettings,
    pub embedding: EmbeddingSettings,
    pub llm: LlmSettings,
    pub qa: QaSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub collection_name: String,
    pub persist_directory: String,
    pub distance_metric: DistanceMetric,
    pub batch_size: usize,
    pub chunk_max_length: usize,
    pub chunk_threshold: usize,
    pub hard_split: bool,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            collection_name: DEFAULT_COLLECTION.to_string(),
            persist_directory: DEFAULT_PERSIST_DIRECTORY.to_string(),
            distance_metric: DistanceMetric::Cosine,
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_max_length: DEFAULT_CHUNK_MAX_LENGTH,
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
            hard_split: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local feature-hashing embedder, no network access.
    Hashing,
    /// OpenAI-compatible `/embeddings` endpoint.
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingBackend,
    /// Falls back to a backend-specific name when unset.
    pub model: Option<String>,
    pub dimension: usize,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::Hashing,
            model: None,
            dimension: DEFAULT_EMBEDDING_DIMENSION,
            base_url: None,
            api_key: None,
        }
    }
}

impl EmbeddingSettings {
    pub fn model_name(&self) -> String {
        match (&self.model, self.provider) {
            (Some(model), _) => model.clone(),
            (None, EmbeddingBackend::Hashing) => format!("hashing-{}", self.dimension),
            (None, EmbeddingBackend::OpenAi) => DEFAULT_REMOTE_EMBEDDING_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub retry: RetrySettings,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            api_key: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: 60,
            retry: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub multiplier_secs: u64,
    pub min_delay_secs: u64,
    pub max_delay_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            multiplier_secs: 1,
            min_delay_secs: 2,
            max_delay_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QaSettings {
    pub language: String,
    pub level: String,
    pub include_examples: bool,
    pub n_context_docs: usize,
    pub max_sources: usize,
    pub preview_chars: usize,
}

impl Default for QaSettings {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            level: DEFAULT_LEVEL.to_string(),
            include_examples: true,
            n_context_docs: DEFAULT_N_CONTEXT_DOCS,
            max_sources: DEFAULT_MAX_SOURCES,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_sections_fall_back_to_defaults() {
        let settings: AppSettings = serde_json::from_value(json!({
            "rag": { "collection_name": "rust_docs", "distance_metric": "l2" },
            "qa": { "n_context_docs": 8 }
        }))
        .unwrap();

        assert_eq!(settings.rag.collection_name, "rust_docs");
        assert_eq!(settings.rag.distance_metric, DistanceMetric::L2);
        assert_eq!(settings.rag.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(settings.qa.n_context_docs, 8);
        assert_eq!(settings.qa.max_sources, 3);
        assert_eq!(settings.llm.model, "gpt-4o");
        assert_eq!(settings.embedding.provider, EmbeddingBackend::Hashing);
    }

    #[test]
    fn default_template_deserializes_to_defaults() {
        let settings: AppSettings = serde_json::from_value(default_config()).unwrap();
        assert_eq!(settings.rag.chunk_max_length, 800);
        assert_eq!(settings.llm.retry.max_attempts, 3);
        assert_eq!(settings.embedding.dimension, 384);
        assert_eq!(settings.embedding.model_name(), "hashing-384");
    }

    #[test]
    fn embedding_model_name_follows_the_backend() {
        let mut embedding = EmbeddingSettings {
            dimension: 128,
            ..EmbeddingSettings::default()
        };
        assert_eq!(embedding.model_name(), "hashing-128");

        embedding.provider = EmbeddingBackend::OpenAi;
        assert_eq!(embedding.model_name(), "all-MiniLM-L6-v2");

        embedding.model = Some("text-embedding-3-small".to_string());
        assert_eq!(embedding.model_name(), "text-embedding-3-small");
    }
}
