//! Server-sent events for incremental question generation.

use crate::error::AppError;
use crate::generator::GenerationEvent;
use crate::handlers::AppState;
use actix_web::{web, HttpResponse};
use clarify_types::{StreamComplete, StreamError, StreamStart};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamQuery {
    pub task_description: Option<String>,
}

/// One SSE frame: `event: <name>\ndata: <json>\n\n`
fn sse_frame<T: Serialize>(event: &str, data: &T) -> web::Bytes {
    let payload = serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string());
    web::Bytes::from(format!("event: {event}\ndata: {payload}\n\n"))
}

/// `GET /api/stream?taskDescription=...`
///
/// Emits `start`, one `question` per newly extracted question, then
/// `complete` with the new session id. A mid-stream provider failure emits
/// `error` instead, and no session is created on that path.
pub async fn stream(
    data: web::Data<AppState>,
    query: web::Query<StreamQuery>,
) -> Result<HttpResponse, AppError> {
    let task_description = query
        .into_inner()
        .task_description
        .filter(|task| !task.trim().is_empty())
        .ok_or_else(|| AppError::InvalidRequest("taskDescription is required".to_string()))?;

    let mut events = data.generator.stream(&task_description);
    let store = Arc::clone(&data.store);

    let body = async_stream::stream! {
        yield Ok::<_, actix_web::Error>(sse_frame(
            "start",
            &StreamStart {
                message: format!("Generating questions for: {task_description}"),
            },
        ));

        while let Some(event) = events.recv().await {
            match event {
                GenerationEvent::Question(question) => {
                    yield Ok(sse_frame("question", &question));
                }
                GenerationEvent::Complete(questions) => {
                    // the session exists only once generation succeeded
                    match store.create_session(&task_description, questions).await {
                        Ok(session) => {
                            tracing::info!(
                                session_id = %session.id,
                                question_count = session.questions.len(),
                                "created session from stream"
                            );
                            yield Ok(sse_frame(
                                "complete",
                                &StreamComplete {
                                    session_id: session.id,
                                    question_count: session.questions.len(),
                                },
                            ));
                        }
                        Err(e) => {
                            yield Ok(sse_frame("error", &StreamError { error: e.to_string() }));
                        }
                    }
                    break;
                }
                GenerationEvent::Failed(error) => {
                    tracing::warn!(error = %error, "streaming generation failed");
                    yield Ok(sse_frame("error", &StreamError { error }));
                    break;
                }
            }
        }
    };

    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(body))
}
