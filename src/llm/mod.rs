pub mod openai;
pub mod provider;
pub mod retry;
pub mod types;

use std::sync::Arc;

pub use openai::{classify_status, OpenAiClient};
pub use provider::{FragmentStream, GenerationClient};
pub use retry::{RetryPolicy, RetryingClient};
pub use types::{ChatMessage, ChatRequest};

use crate::core::config::LlmSettings;
use crate::core::errors::Result;

/// The production client: OpenAI-compatible completions behind the retry policy.
pub fn from_settings(settings: &LlmSettings) -> Result<Arc<dyn GenerationClient>> {
    let client = OpenAiClient::from_settings(settings)?;
    tracing::info!("LLM client ready: {} at {}", client.model(), settings.base_url);
    Ok(Arc::new(RetryingClient::new(
        client,
        RetryPolicy::from(&settings.retry),
    )))
}
