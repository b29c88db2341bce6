use crate::config::AppConfig;
use crate::error::AppError;
use crate::generator::QuestionGenerator;
use crate::store::SessionStore;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use clarify_types::{
    AnswerRequest, AnswerResponse, GenerateRequest, GenerateResponse, HealthResponse,
    SessionListResponse, SessionSummary,
};
use std::sync::Arc;
use std::time::SystemTime;

pub struct AppState {
    pub store: Arc<SessionStore>,
    pub generator: Arc<QuestionGenerator>,
    pub config: Arc<AppConfig>,
    pub start_time: SystemTime,
}

pub async fn health(data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let uptime = data
        .start_time
        .elapsed()
        .map_err(|e| AppError::Internal(format!("Failed to calculate uptime: {e}")))?
        .as_secs();

    Ok(HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

pub async fn generate(
    data: web::Data<AppState>,
    request: web::Json<GenerateRequest>,
) -> Result<HttpResponse, AppError> {
    let req = request.into_inner();
    let task_description = req
        .task_description
        .filter(|task| !task.trim().is_empty())
        .ok_or_else(|| AppError::InvalidRequest("taskDescription is required".to_string()))?;

    // Reuse a still-live session when the caller supplies its id
    if let Some(session_id) = &req.session_id {
        if let Some(session) = data.store.get_session(session_id)? {
            tracing::info!(session_id = %session.id, "returning questions for existing session");
            return Ok(HttpResponse::Ok().json(GenerateResponse {
                session_id: session.id,
                task_description: session.task_description,
                questions: session.questions,
            }));
        }
    }

    let questions = data.generator.generate(&task_description).await;
    let session = data.store.create_session(&task_description, questions).await?;
    tracing::info!(
        session_id = %session.id,
        question_count = session.questions.len(),
        "created session"
    );

    Ok(HttpResponse::Ok().json(GenerateResponse {
        session_id: session.id,
        task_description: session.task_description,
        questions: session.questions,
    }))
}

pub async fn answer(
    data: web::Data<AppState>,
    request: web::Json<AnswerRequest>,
) -> Result<HttpResponse, AppError> {
    let req = request.into_inner();
    let session = data
        .store
        .add_response(&req.session_id, &req.question_id, &req.answer)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "session '{}' or question '{}' not found",
                req.session_id, req.question_id
            ))
        })?;

    let progress = session.progress();
    let is_complete = session.is_complete();
    Ok(HttpResponse::Ok().json(AnswerResponse {
        session_id: session.id,
        question_id: req.question_id,
        is_complete,
        progress,
    }))
}

pub async fn context(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let session_id = path.into_inner();
    let context = data
        .store
        .get_task_context(&session_id)?
        .ok_or(AppError::SessionNotFound(session_id))?;
    Ok(HttpResponse::Ok().json(context))
}

pub async fn sessions(data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let mut contexts = data.store.get_all_sessions()?;
    // stable listing, oldest first (RFC 3339 strings sort chronologically)
    contexts.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let sessions: Vec<SessionSummary> = contexts.iter().map(SessionSummary::from_context).collect();
    Ok(HttpResponse::Ok().json(SessionListResponse {
        count: sessions.len(),
        sessions,
    }))
}
