//! MCP server exposing the clarification tools over stdio.

// The rmcp `#[tool(aggr)]` macro requires ownership of input structs,
// making pass-by-value necessary for all tool handler functions.
#![allow(clippy::needless_pass_by_value)]

use crate::error::{AppError, AppResult};
use crate::generator::QuestionGenerator;
use crate::mcp::ops;
use crate::store::SessionStore;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{tool, Error as McpError, ServerHandler, ServiceExt};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

/// Instructions for the MCP server, shown to agents using this server.
const INSTRUCTIONS: &str = r#"Clarifying-questions server. Call generate_questions with an informal task description to receive 5-7 targeted questions (with suggested answers) and a session id. Record each user answer with answer_question, read back the collected context with get_context, and enumerate live sessions with list_sessions. Sessions expire after an hour without new answers."#;

#[derive(Clone)]
pub struct ClarifyServer {
    store: Arc<SessionStore>,
    generator: Arc<QuestionGenerator>,
}

impl ClarifyServer {
    pub fn new(store: Arc<SessionStore>, generator: Arc<QuestionGenerator>) -> Self {
        Self { store, generator }
    }

    fn ok_json(value: serde_json::Value) -> Result<CallToolResult, McpError> {
        let text = serde_json::to_string_pretty(&value)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(text)]))
    }
}

// Tool input schemas

/// Input for generating questions.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateQuestionsInput {
    /// Informal description of the task to clarify.
    #[serde(rename = "taskDescription")]
    pub task_description: String,
    /// Existing session to return instead of generating anew (optional).
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Input for answering a question.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct AnswerQuestionInput {
    /// Session the question belongs to.
    #[serde(rename = "sessionId")]
    pub session_id: String,
    /// Question being answered.
    #[serde(rename = "questionId")]
    pub question_id: String,
    /// The user's answer.
    pub answer: String,
}

/// Input for fetching a session's context.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetContextInput {
    /// Session to read.
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[tool(tool_box)]
impl ClarifyServer {
    #[tool(
        description = "Generate 5-7 clarifying questions for a task description and open a session; pass sessionId to fetch an existing session's questions instead"
    )]
    async fn generate_questions(
        &self,
        #[tool(aggr)] input: GenerateQuestionsInput,
    ) -> Result<CallToolResult, McpError> {
        let value = ops::generate_questions(
            &self.store,
            &self.generator,
            &input.task_description,
            input.session_id.as_deref(),
        )
        .await
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Self::ok_json(value)
    }

    #[tool(description = "Record the user's answer to one question in a session")]
    async fn answer_question(
        &self,
        #[tool(aggr)] input: AnswerQuestionInput,
    ) -> Result<CallToolResult, McpError> {
        match ops::answer_question(
            &self.store,
            &input.session_id,
            &input.question_id,
            &input.answer,
        )
        .await
        {
            Ok(value) => Self::ok_json(value),
            Err(AppError::NotFound(message)) => Err(McpError::invalid_params(message, None)),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    #[tool(
        description = "Get the full task context for a session: description, questions, answers, and progress"
    )]
    async fn get_context(
        &self,
        #[tool(aggr)] input: GetContextInput,
    ) -> Result<CallToolResult, McpError> {
        match ops::get_context(&self.store, &input.session_id) {
            Ok(value) => Self::ok_json(value),
            Err(AppError::SessionNotFound(id)) => {
                Err(McpError::invalid_params(format!("Session not found: {id}"), None))
            }
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    #[tool(description = "List every live session with its question and answer counts")]
    async fn list_sessions(&self) -> Result<CallToolResult, McpError> {
        let value = ops::list_sessions(&self.store)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Self::ok_json(value)
    }
}

#[tool(tool_box)]
impl ServerHandler for ClarifyServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "clarify-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }
}

/// Serve the tool set over stdio until the client disconnects.
pub async fn serve_stdio(
    store: Arc<SessionStore>,
    generator: Arc<QuestionGenerator>,
) -> AppResult<()> {
    tracing::info!("serving MCP over stdio");
    let server = ClarifyServer::new(store, generator);
    let service = server
        .serve(rmcp::transport::stdio())
        .await
        .map_err(|e| AppError::Internal(format!("MCP stdio serve failed: {e}")))?;
    service
        .waiting()
        .await
        .map_err(|e| AppError::Internal(format!("MCP stdio session failed: {e}")))?;
    Ok(())
}
