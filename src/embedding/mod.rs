//! Text embedding backends.

mod hashing;
mod openai;
mod provider;

use std::sync::Arc;

pub use hashing::HashingEmbedder;
pub use openai::OpenAiEmbedder;
pub use provider::{ensure_vector_count, EmbeddingProvider};

use crate::core::config::defaults::DEFAULT_LLM_BASE_URL;
use crate::core::config::{EmbeddingBackend, EmbeddingSettings};
use crate::core::errors::Result;

pub fn from_settings(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingProvider>> {
    match settings.provider {
        EmbeddingBackend::Hashing => Ok(Arc::new(HashingEmbedder::new(
            settings.model_name(),
            settings.dimension,
        ))),
        EmbeddingBackend::OpenAi => {
            let base_url = settings.base_url.as_deref().unwrap_or(DEFAULT_LLM_BASE_URL);
            Ok(Arc::new(OpenAiEmbedder::new(
                base_url,
                settings.api_key.clone(),
                settings.model_name(),
                settings.dimension,
            )?))
        }
    }
}
