use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::provider::{parse_json_response, FragmentStream, GenerationClient};
use super::types::{ChatMessage, ChatRequest};
use crate::core::config::LlmSettings;
use crate::core::errors::{RagError, Result};

/// Chat completions against an OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f64,
    max_tokens: u32,
    client: Client,
}

impl OpenAiClient {
    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(RagError::internal)?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone().filter(|key| !key.is_empty()),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, request: &ChatRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": request.temperature.unwrap_or(self.temperature),
            "max_tokens": self.max_tokens,
            "stream": stream,
        });

        if request.json_mode {
            if let Some(obj) = body.as_object_mut() {
                obj.insert("response_format".to_string(), json!({ "type": "json_object" }));
            }
        }
        body
    }

    async fn post_chat(&self, body: &Value) -> Result<Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut request = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }
        Ok(res)
    }

    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let body = self.request_body(&request, false);
        let res = self.post_chat(&body).await?;
        let payload: Value = res.json().await?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RagError::unavailable("completion response has no message content"))
    }
}

/// Maps an unsuccessful HTTP status to the error taxonomy.
pub fn classify_status(status: StatusCode, body: &str) -> RagError {
    let detail = format!("{} {}", status, error_detail(body));
    match status.as_u16() {
        401 | 403 => RagError::Auth(detail),
        429 if body.contains("insufficient_quota") => RagError::QuotaExceeded(detail),
        429 => RagError::ProviderUnavailable(detail),
        404 => RagError::NotFound(detail),
        code if code >= 500 => RagError::ProviderUnavailable(detail),
        _ => RagError::BadRequest(detail),
    }
}

fn error_detail(body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<Value>(body) {
        if let Some(message) = payload["error"]["message"].as_str() {
            return message.to_string();
        }
    }
    body.chars().take(200).collect()
}

#[derive(Debug, PartialEq)]
enum SseEvent {
    Fragment(String),
    Done,
    Failed(String),
    Skip,
}

fn parse_sse_line(line: &str) -> SseEvent {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return SseEvent::Skip;
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return SseEvent::Done;
    }

    match serde_json::from_str::<Value>(data) {
        Ok(json) => {
            if let Some(message) = json["error"]["message"].as_str() {
                return SseEvent::Failed(message.to_string());
            }
            match json["choices"][0]["delta"]["content"].as_str() {
                Some(content) if !content.is_empty() => SseEvent::Fragment(content.to_string()),
                _ => SseEvent::Skip,
            }
        }
        Err(_) => SseEvent::Skip,
    }
}

/// Removes and returns every complete line in `buffer`; a trailing partial
/// line stays for the next network chunk.
fn drain_lines(buffer: &mut String) -> Vec<String> {
    let Some(last_newline) = buffer.rfind('\n') else {
        return Vec::new();
    };
    let rest = buffer.split_off(last_newline + 1);
    let complete = std::mem::replace(buffer, rest);
    complete.lines().map(str::to_string).collect()
}

#[async_trait]
impl GenerationClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str, system_message: Option<&str>) -> Result<String> {
        self.complete(ChatRequest::from_prompt(prompt, system_message))
            .await
    }

    async fn chat(&self, messages: &[ChatMessage], temperature: Option<f64>) -> Result<String> {
        if messages.is_empty() {
            return Err(RagError::BadRequest("chat needs at least one message".to_string()));
        }
        self.complete(ChatRequest::new(messages.to_vec()).with_temperature(temperature))
            .await
    }

    async fn generate_json(&self, prompt: &str, system_message: Option<&str>) -> Result<Value> {
        let text = self
            .complete(ChatRequest::from_prompt(prompt, system_message).json())
            .await?;
        parse_json_response(&text)
    }

    async fn generate_streaming(
        &self,
        prompt: &str,
        system_message: Option<&str>,
    ) -> Result<FragmentStream> {
        let request = ChatRequest::from_prompt(prompt, system_message);
        let body = self.request_body(&request, true);
        let res = self.post_chat(&body).await?;

        let (tx, rx) = mpsc::channel(32);
        let mut stream = res.bytes_stream();

        tokio::spawn(async move {
            let mut buffer = String::new();
            while let Some(item) = stream.next().await {
                match item {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        for line in drain_lines(&mut buffer) {
                            match parse_sse_line(&line) {
                                SseEvent::Fragment(content) => {
                                    if tx.send(Ok(content)).await.is_err() {
                                        return;
                                    }
                                }
                                SseEvent::Done => return,
                                SseEvent::Failed(message) => {
                                    let _ = tx.send(Err(RagError::ProviderUnavailable(message))).await;
                                    return;
                                }
                                SseEvent::Skip => {}
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(RagError::from(e))).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_error_kinds() {
        assert!(matches!(classify_status(StatusCode::UNAUTHORIZED, ""), RagError::Auth(_)));
        assert!(matches!(classify_status(StatusCode::FORBIDDEN, ""), RagError::Auth(_)));
        assert!(matches!(classify_status(StatusCode::NOT_FOUND, ""), RagError::NotFound(_)));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, "upstream"),
            RagError::ProviderUnavailable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY, ""),
            RagError::BadRequest(_)
        ));
    }

    #[test]
    fn quota_is_told_apart_from_rate_limiting() {
        let quota_body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota","code":"insufficient_quota"}}"#;
        let quota = classify_status(StatusCode::TOO_MANY_REQUESTS, quota_body);
        assert!(matches!(quota, RagError::QuotaExceeded(ref m) if m.contains("exceeded your current quota")));

        let rate = classify_status(StatusCode::TOO_MANY_REQUESTS, r#"{"error":{"message":"Rate limit reached"}}"#);
        assert!(matches!(rate, RagError::ProviderUnavailable(_)));
        assert!(rate.is_retryable());
    }

    #[test]
    fn sse_lines_yield_fragments_and_done() {
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#),
            SseEvent::Fragment("Hel".to_string())
        );
        assert_eq!(parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#), SseEvent::Skip);
        assert_eq!(parse_sse_line(": keep-alive"), SseEvent::Skip);
        assert_eq!(parse_sse_line("data: [DONE]"), SseEvent::Done);
        assert_eq!(
            parse_sse_line(r#"data: {"error":{"message":"overloaded"}}"#),
            SseEvent::Failed("overloaded".to_string())
        );
    }

    #[test]
    fn partial_lines_wait_for_the_next_chunk() {
        let mut buffer = String::from("data: one\ndata: tw");
        assert_eq!(drain_lines(&mut buffer), vec!["data: one".to_string()]);
        assert_eq!(buffer, "data: tw");

        buffer.push_str("o\n");
        assert_eq!(drain_lines(&mut buffer), vec!["data: two".to_string()]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn request_body_carries_sampling_and_json_mode() {
        let client = OpenAiClient::from_settings(&LlmSettings::default()).unwrap();
        let body = client.request_body(&ChatRequest::from_prompt("q", None).json(), false);

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 2000);
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn chat_request_overrides_temperature_only() {
        let client = OpenAiClient::from_settings(&LlmSettings::default()).unwrap();
        let request = ChatRequest::new(vec![
            ChatMessage::system("You are a tutor"),
            ChatMessage::user("What is a list?"),
            ChatMessage::assistant("An ordered collection."),
            ChatMessage::user("Is it mutable?"),
        ])
        .with_temperature(Some(0.2));

        let body = client.request_body(&request, false);

        assert_eq!(body["temperature"], 0.2);
        assert_eq!(body["max_tokens"], 2000);
        assert_eq!(body["messages"].as_array().unwrap().len(), 4);
        assert_eq!(body["messages"][2]["role"], "assistant");
        assert!(body.get("response_format").is_none());
    }

    #[tokio::test]
    async fn empty_chat_is_rejected_before_any_request() {
        let client = OpenAiClient::from_settings(&LlmSettings::default()).unwrap();
        let err = client.chat(&[], None).await.unwrap_err();
        assert!(matches!(err, RagError::BadRequest(_)));
    }
}
