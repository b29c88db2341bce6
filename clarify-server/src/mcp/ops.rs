//! The four tool operations, shared by the stdio server and the HTTP
//! bridge. Each returns the JSON payload that goes into the tool result.

use crate::error::{AppError, AppResult};
use crate::generator::QuestionGenerator;
use crate::store::SessionStore;
use clarify_types::SessionSummary;
use serde_json::{json, Value};

/// `generate_questions`: reuse a live session or generate a fresh one.
pub async fn generate_questions(
    store: &SessionStore,
    generator: &QuestionGenerator,
    task_description: &str,
    session_id: Option<&str>,
) -> AppResult<Value> {
    if let Some(id) = session_id {
        if let Some(session) = store.get_session(id)? {
            return Ok(json!({
                "sessionId": session.id,
                "taskDescription": session.task_description,
                "questions": session.questions,
            }));
        }
    }

    let questions = generator.generate(task_description).await;
    let session = store.create_session(task_description, questions).await?;
    tracing::info!(
        session_id = %session.id,
        question_count = session.questions.len(),
        "created session via tool call"
    );
    Ok(json!({
        "sessionId": session.id,
        "taskDescription": session.task_description,
        "questions": session.questions,
    }))
}

/// `answer_question`: record one answer, last write wins.
pub async fn answer_question(
    store: &SessionStore,
    session_id: &str,
    question_id: &str,
    answer: &str,
) -> AppResult<Value> {
    let session = store
        .add_response(session_id, question_id, answer)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "session '{session_id}' or question '{question_id}' not found"
            ))
        })?;

    let progress = session.progress();
    Ok(json!({
        "sessionId": session.id,
        "questionId": question_id,
        "progress": progress,
        "isComplete": session.is_complete(),
    }))
}

/// `get_context`: the full projection plus human-readable progress lines.
pub fn get_context(store: &SessionStore, session_id: &str) -> AppResult<Value> {
    let context = store
        .get_task_context(session_id)?
        .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))?;

    let progress = context.progress;
    let progress_text = format!(
        "{}/{} questions answered ({}%)",
        progress.answered, progress.total, progress.percentage
    );
    let answered_summary: Vec<String> = context
        .questions
        .iter()
        .filter_map(|question| {
            context
                .responses
                .get(&question.id)
                .map(|answer| format!("Q: {}\nA: {}", question.text, answer))
        })
        .collect();

    let mut value = serde_json::to_value(&context)?;
    if let Value::Object(map) = &mut value {
        map.insert("progressText".to_string(), Value::String(progress_text));
        map.insert("answeredSummary".to_string(), json!(answered_summary));
    }
    Ok(value)
}

/// `list_sessions`: count plus one summary per live session.
pub fn list_sessions(store: &SessionStore) -> AppResult<Value> {
    let mut contexts = store.get_all_sessions()?;
    contexts.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let sessions: Vec<SessionSummary> = contexts.iter().map(SessionSummary::from_context).collect();
    Ok(json!({
        "count": sessions.len(),
        "sessions": sessions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SessionStore;
    use crate::test_support::sample_questions;
    use std::time::Duration;

    async fn store_with_session() -> (tempfile::TempDir, SessionStore, String) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::load(dir.path(), Duration::from_secs(3600)).unwrap();
        let session = store
            .create_session("build a chat app", sample_questions())
            .await
            .unwrap();
        let id = session.id;
        (dir, store, id)
    }

    #[tokio::test]
    async fn answer_question_reports_progress() {
        let (_dir, store, session_id) = store_with_session().await;
        let value = answer_question(&store, &session_id, "q1", "React")
            .await
            .unwrap();
        assert_eq!(value["progress"]["answered"], 1);
        assert_eq!(value["progress"]["total"], 3);
        assert_eq!(value["progress"]["percentage"], 33);
        assert_eq!(value["isComplete"], false);
    }

    #[tokio::test]
    async fn answer_question_rejects_unknown_ids() {
        let (_dir, store, session_id) = store_with_session().await;
        assert!(answer_question(&store, "sess_missing", "q1", "x")
            .await
            .is_err());
        assert!(answer_question(&store, &session_id, "q999", "x")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn context_includes_progress_text_and_summary() {
        let (_dir, store, session_id) = store_with_session().await;
        store.add_response(&session_id, "q2", "React").await.unwrap();

        let value = get_context(&store, &session_id).unwrap();
        assert_eq!(value["progressText"], "1/3 questions answered (33%)");
        let summary = value["answeredSummary"].as_array().unwrap();
        assert_eq!(summary.len(), 1);
        assert!(summary[0]
            .as_str()
            .unwrap()
            .starts_with("Q: Which stack do you prefer?"));
        assert_eq!(value["responses"]["q2"], "React");
    }

    #[tokio::test]
    async fn list_sessions_counts_live_sessions() {
        let (_dir, store, session_id) = store_with_session().await;
        let value = list_sessions(&store).unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(value["sessions"][0]["sessionId"], session_id);
        assert_eq!(value["sessions"][0]["questionCount"], 3);
        assert_eq!(value["sessions"][0]["answeredCount"], 0);
    }
}
