use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::types::ChatMessage;
use crate::core::errors::{RagError, Result};

/// Lazily produced answer fragments. Dropping the receiver stops the producer.
pub type FragmentStream = mpsc::Receiver<Result<String>>;

#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// return the client name (e.g. "openai")
    fn name(&self) -> &str;

    /// single-shot completion
    async fn generate(&self, prompt: &str, system_message: Option<&str>) -> Result<String>;

    /// multi-turn conversation; `temperature` overrides the configured one
    async fn chat(&self, messages: &[ChatMessage], temperature: Option<f64>) -> Result<String>;

    /// streaming completion; fragments arrive in order and the stream ends on completion
    async fn generate_streaming(
        &self,
        prompt: &str,
        system_message: Option<&str>,
    ) -> Result<FragmentStream>;

    /// completion whose text must be a JSON document
    async fn generate_json(&self, prompt: &str, system_message: Option<&str>) -> Result<Value> {
        let text = self.generate(prompt, system_message).await?;
        parse_json_response(&text)
    }

    /// completion grounded on numbered context documents
    async fn generate_with_context(
        &self,
        prompt: &str,
        context: &[String],
        system_message: Option<&str>,
    ) -> Result<String> {
        let enhanced = build_context_prompt(prompt, context);
        self.generate(&enhanced, system_message).await
    }
}

pub fn build_context_prompt(prompt: &str, context: &[String]) -> String {
    let context_str = context
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("Document {}:\n{}", i + 1, doc))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    format!(
        "Based on the following context, please answer the question.\n\n\
         Context:\n{context_str}\n\n\
         Question: {prompt}\n\n\
         Please provide a comprehensive answer based on the context provided. \
         If the context doesn't contain enough information, acknowledge this and \
         provide your best answer based on your knowledge."
    )
}

/// Parses model output as JSON, tolerating a surrounding markdown code fence.
pub fn parse_json_response(text: &str) -> Result<Value> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(body)
        .map_err(|e| RagError::Parse(format!("model output is not valid JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_response_accepts_plain_and_fenced_output() {
        assert_eq!(parse_json_response(r#"{"score": 90}"#).unwrap(), json!({"score": 90}));
        assert_eq!(
            parse_json_response("```json\n{\"score\": 90}\n```").unwrap(),
            json!({"score": 90})
        );
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let err = parse_json_response("Sure! Here is your answer").unwrap_err();
        assert!(matches!(err, RagError::Parse(_)));
    }

    #[test]
    fn context_prompt_numbers_documents() {
        let prompt = build_context_prompt(
            "What is a list?",
            &["Lists are ordered.".to_string(), "Lists are mutable.".to_string()],
        );
        assert!(prompt.contains("Document 1:\nLists are ordered.\n\n---\n\nDocument 2:\nLists are mutable."));
        assert!(prompt.contains("Question: What is a list?"));
    }
}
