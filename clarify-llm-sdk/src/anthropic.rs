//! Anthropic Messages API client with blocking and streaming completion.

use crate::client::LlmClient;
use crate::error::LlmError;
use crate::types::{
    ApiErrorResponse, CompletionRequest, CompletionResponse, ContentBlock, Role, StreamChunk,
    Usage,
};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest_eventsource::{Event, EventSource};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic (Claude) LLM client
pub struct AnthropicClient {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl AnthropicClient {
    /// Create a new client with the given API key and model id
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(LlmError::authentication("API key cannot be empty"));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http,
        })
    }

    /// Set a custom base URL for the API
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|_| LlmError::authentication("Invalid API key format"))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn status_error(response: reqwest::Response) -> LlmError {
        let status = response.status();
        // Capture retry-after before consuming the response body
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse().ok());

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = serde_json::from_str::<ApiErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);

        match status {
            reqwest::StatusCode::BAD_REQUEST => LlmError::invalid_request(message),
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                LlmError::authentication(message)
            }
            reqwest::StatusCode::TOO_MANY_REQUESTS => LlmError::rate_limit(message, retry_after),
            _ => LlmError::api_error(status.as_u16(), message),
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);
        debug!(model = %request.model, messages = request.messages.len(), "sending completion request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::internal(format!("Failed to parse response: {e}")))?;
        Ok(completion)
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/v1/messages", self.base_url);
        let mut body = serde_json::to_value(&request)?;
        body["stream"] = serde_json::Value::Bool(true);

        let http_request = self.http.post(&url).headers(self.headers()?).json(&body);
        let mut es =
            EventSource::new(http_request).map_err(|e| LlmError::stream(e.to_string()))?;

        let mut id = String::new();
        let mut model = request.model.clone();
        let mut full_text = String::new();
        let mut stop_reason = None;
        let mut usage = Usage::default();

        while let Some(event) = es.next().await {
            match event {
                Ok(Event::Open) => debug!("stream opened"),
                Ok(Event::Message(msg)) => {
                    let data: serde_json::Value = serde_json::from_str(&msg.data)?;
                    match data["type"].as_str() {
                        Some("message_start") => {
                            if let Some(message) = data.get("message") {
                                if let Some(message_id) = message["id"].as_str() {
                                    id = message_id.to_string();
                                }
                                if let Some(m) = message["model"].as_str() {
                                    model = m.to_string();
                                }
                                if let Some(u) = message.get("usage") {
                                    usage.input_tokens =
                                        u["input_tokens"].as_u64().unwrap_or(0) as u32;
                                }
                            }
                        }
                        Some("content_block_delta") => {
                            if let Some(text) = data["delta"]["text"].as_str() {
                                full_text.push_str(text);
                                let _ = chunk_tx
                                    .send(StreamChunk {
                                        content: text.to_string(),
                                        is_finished: false,
                                    })
                                    .await;
                            }
                        }
                        Some("message_delta") => {
                            if let Some(reason) = data["delta"]["stop_reason"].as_str() {
                                stop_reason = Some(reason.to_string());
                            }
                            if let Some(u) = data.get("usage") {
                                usage.output_tokens =
                                    u["output_tokens"].as_u64().unwrap_or(0) as u32;
                            }
                        }
                        Some("message_stop") => break,
                        Some("error") => {
                            let message = data["error"]["message"]
                                .as_str()
                                .unwrap_or("stream error")
                                .to_string();
                            return Err(LlmError::stream(message));
                        }
                        _ => {}
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(e) => return Err(LlmError::stream(e.to_string())),
            }
        }

        let _ = chunk_tx
            .send(StreamChunk {
                content: String::new(),
                is_finished: true,
            })
            .await;

        Ok(CompletionResponse {
            id,
            model,
            role: Role::Assistant,
            content: vec![ContentBlock::Text { text: full_text }],
            stop_reason,
            usage,
        })
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    #[test]
    fn rejects_empty_api_key() {
        assert!(AnthropicClient::new("", "claude-sonnet-4-5-20250929").is_err());
    }

    #[test]
    fn stream_body_sets_stream_flag() {
        let request = CompletionRequest {
            model: "claude-sonnet-4-5-20250929".to_string(),
            max_tokens: 1000,
            messages: vec![Message::user("hi")],
            system: None,
            temperature: Some(0.3),
            top_p: None,
            stop_sequences: None,
        };
        let mut body = serde_json::to_value(&request).unwrap();
        body["stream"] = serde_json::Value::Bool(true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["temperature"], 0.3);
    }

    #[test]
    fn base_url_override() {
        let client = AnthropicClient::new("test-key", "claude-sonnet-4-5-20250929")
            .unwrap()
            .with_base_url("http://localhost:8099");
        assert_eq!(client.base_url, "http://localhost:8099");
        assert_eq!(client.provider_name(), "anthropic");
        assert_eq!(client.model_name(), "claude-sonnet-4-5-20250929");
    }
}
