use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("LLM error: {0}")]
    Llm(#[from] clarify_llm_sdk::LlmError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Startup error: {0}")]
    Startup(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            error: self.error_type(),
            message: self.to_string(),
        };

        match self {
            AppError::SessionNotFound(_) | AppError::NotFound(_) => {
                HttpResponse::NotFound().json(error_response)
            }
            AppError::InvalidRequest(_) => HttpResponse::BadRequest().json(error_response),
            AppError::Unauthorized(_) => HttpResponse::Unauthorized().json(error_response),
            AppError::Config(_)
            | AppError::Io(_)
            | AppError::Serialization(_)
            | AppError::Llm(_)
            | AppError::Startup(_)
            | AppError::Internal(_) => HttpResponse::InternalServerError().json(error_response),
        }
    }
}

impl AppError {
    fn error_type(&self) -> String {
        match self {
            AppError::Config(_) => "config_error".to_string(),
            AppError::Io(_) => "io_error".to_string(),
            AppError::Serialization(_) => "serialization_error".to_string(),
            AppError::SessionNotFound(_) => "session_not_found".to_string(),
            AppError::NotFound(_) => "not_found".to_string(),
            AppError::InvalidRequest(_) => "invalid_request".to_string(),
            AppError::Llm(_) => "llm_error".to_string(),
            AppError::Unauthorized(_) => "unauthorized".to_string(),
            AppError::Startup(_) => "startup_error".to_string(),
            AppError::Internal(_) => "internal_error".to_string(),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
