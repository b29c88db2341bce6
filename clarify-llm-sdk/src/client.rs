use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, StreamChunk};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Core trait for LLM clients
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete a request (non-streaming)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Stream a completion, sending text deltas over `chunk_tx` as they
    /// arrive, and return the assembled response once the stream ends.
    async fn stream(
        &self,
        _request: CompletionRequest,
        _chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        Err(LlmError::not_supported("streaming not supported"))
    }

    /// Get provider name (e.g., "anthropic")
    fn provider_name(&self) -> &str;

    /// Get model name (e.g., "claude-sonnet-4-5-20250929")
    fn model_name(&self) -> &str;
}
