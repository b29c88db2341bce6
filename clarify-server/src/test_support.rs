//! Shared fixtures for the crate's test modules.

use crate::config::{AppConfig, AuthConfig};
use crate::generator::QuestionGenerator;
use crate::handlers::AppState;
use crate::store::SessionStore;
use actix_web::web;
use async_trait::async_trait;
use clarify_llm_sdk::types::{
    CompletionRequest, CompletionResponse, ContentBlock, Role, StreamChunk, Usage,
};
use clarify_llm_sdk::{LlmClient, LlmError};
use clarify_types::{Question, QuestionCategory};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;

pub fn sample_questions() -> Vec<Question> {
    vec![
        Question {
            id: "q1".to_string(),
            text: "Which platforms should this target?".to_string(),
            category: QuestionCategory::Scope,
            options: vec!["Web".to_string(), "Mobile".to_string()],
        },
        Question {
            id: "q2".to_string(),
            text: "Which stack do you prefer?".to_string(),
            category: QuestionCategory::TechStack,
            options: vec!["React".to_string(), "Vue".to_string()],
        },
        Question {
            id: "q3".to_string(),
            text: "Anything else to integrate?".to_string(),
            category: QuestionCategory::Integrations,
            options: vec![],
        },
    ]
}

enum MockBehavior {
    Reply(String),
    Fail(String),
    Stream { text: String, chunk_size: usize },
    StreamFail(String),
}

/// Scripted stand-in for the Anthropic client.
pub struct MockLlmClient {
    behavior: MockBehavior,
}

impl MockLlmClient {
    pub fn replying(text: &str) -> Self {
        Self {
            behavior: MockBehavior::Reply(text.to_string()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            behavior: MockBehavior::Fail(message.to_string()),
        }
    }

    pub fn streaming(text: &str, chunk_size: usize) -> Self {
        Self {
            behavior: MockBehavior::Stream {
                text: text.to_string(),
                chunk_size,
            },
        }
    }

    pub fn stream_failing(message: &str) -> Self {
        Self {
            behavior: MockBehavior::StreamFail(message.to_string()),
        }
    }

    fn response(text: &str) -> CompletionResponse {
        CompletionResponse {
            id: "msg_mock".to_string(),
            model: "mock-model".to_string(),
            role: Role::Assistant,
            content: vec![ContentBlock::Text {
                text: text.to_string(),
            }],
            stop_reason: Some("end_turn".to_string()),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 20,
            },
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        match &self.behavior {
            MockBehavior::Reply(text) | MockBehavior::Stream { text, .. } => {
                Ok(Self::response(text))
            }
            MockBehavior::Fail(message) | MockBehavior::StreamFail(message) => {
                Err(LlmError::internal(message.clone()))
            }
        }
    }

    async fn stream(
        &self,
        _request: CompletionRequest,
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<CompletionResponse, LlmError> {
        match &self.behavior {
            MockBehavior::Stream { text, chunk_size } => {
                for chunk in text.as_bytes().chunks((*chunk_size).max(1)) {
                    let _ = chunk_tx
                        .send(StreamChunk {
                            content: String::from_utf8_lossy(chunk).to_string(),
                            is_finished: false,
                        })
                        .await;
                }
                let _ = chunk_tx
                    .send(StreamChunk {
                        content: String::new(),
                        is_finished: true,
                    })
                    .await;
                Ok(Self::response(text))
            }
            MockBehavior::Reply(text) => {
                let _ = chunk_tx
                    .send(StreamChunk {
                        content: text.clone(),
                        is_finished: false,
                    })
                    .await;
                Ok(Self::response(text))
            }
            MockBehavior::StreamFail(message) => {
                // some partial output, then the transport dies
                let _ = chunk_tx
                    .send(StreamChunk {
                        content: "{\"questio".to_string(),
                        is_finished: false,
                    })
                    .await;
                Err(LlmError::stream(message.clone()))
            }
            MockBehavior::Fail(message) => Err(LlmError::internal(message.clone())),
        }
    }

    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Application state backed by a temp directory and a scripted client.
/// Keep the `TempDir` alive for the duration of the test.
pub struct TestContext {
    pub state: web::Data<AppState>,
    pub store: Arc<SessionStore>,
    _dir: tempfile::TempDir,
}

pub fn state_with(mock: MockLlmClient, api_key: Option<&str>) -> TestContext {
    let dir = tempfile::tempdir().expect("create temp sessions dir");
    let mut config = AppConfig::default();
    config.storage.sessions_dir = dir.path().to_path_buf();
    config.auth = api_key.map(|key| AuthConfig {
        api_key: Some(key.to_string()),
    });

    let store = Arc::new(
        SessionStore::load(dir.path(), Duration::from_secs(3600)).expect("load session store"),
    );
    let generator = Arc::new(QuestionGenerator::new(Arc::new(mock), config.llm.clone()));
    let state = web::Data::new(AppState {
        store: Arc::clone(&store),
        generator,
        config: Arc::new(config),
        start_time: SystemTime::now(),
    });

    TestContext {
        state,
        store,
        _dir: dir,
    }
}
