//! # Clarify LLM SDK
//!
//! Anthropic Messages API client behind a small `LlmClient` trait, with
//! blocking and streaming completion.
//!
//! ## Example
//!
//! ```rust,no_run
//! use clarify_llm_sdk::{AnthropicClient, LlmClient};
//! use clarify_llm_sdk::types::{CompletionRequest, Message};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AnthropicClient::new("your-api-key", "claude-sonnet-4-5-20250929")?;
//!     let response = client
//!         .complete(CompletionRequest {
//!             model: client.model_name().to_string(),
//!             max_tokens: 1024,
//!             messages: vec![Message::user("Hello, Claude!")],
//!             system: None,
//!             temperature: None,
//!             top_p: None,
//!             stop_sequences: None,
//!         })
//!         .await?;
//!     println!("{}", response.text());
//!     Ok(())
//! }
//! ```

pub mod anthropic;
pub mod client;
pub mod error;
pub mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
