// Wire types for the HTTP API. Field names are camelCase on the wire
// (taskDescription, sessionId, questionId) to match the existing clients.

use crate::question::Question;
use crate::session::{Progress, TaskContext};
use serde::{Deserialize, Serialize};

/// Response body for `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime: u64,
    pub timestamp: String,
}

/// Request body for `POST /api/generate`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub task_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub session_id: String,
    pub task_description: String,
    pub questions: Vec<Question>,
}

/// Request body for `POST /api/answer`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub session_id: String,
    pub question_id: String,
    pub answer: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub session_id: String,
    pub question_id: String,
    pub progress: Progress,
    pub is_complete: bool,
}

/// One row in the `GET /api/sessions` listing.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub task_description: String,
    pub question_count: usize,
    pub answered_count: usize,
    pub completion_percentage: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl SessionSummary {
    pub fn from_context(context: &TaskContext) -> Self {
        Self {
            session_id: context.session_id.clone(),
            task_description: context.task_description.clone(),
            question_count: context.questions.len(),
            answered_count: context.responses.len(),
            completion_percentage: context.progress.percentage,
            created_at: context.created_at.clone(),
            updated_at: context.updated_at.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionListResponse {
    pub count: usize,
    pub sessions: Vec<SessionSummary>,
}

// Payloads for the `GET /api/stream` event stream.

#[derive(Debug, Serialize, Deserialize)]
pub struct StreamStart {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamComplete {
    pub session_id: String,
    pub question_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StreamError {
    pub error: String,
}
