use crate::question::Question;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Durable record of one clarification conversation.
///
/// The question list is fixed at creation; only `responses` and
/// `updated_at` change afterwards. Response keys always reference a
/// question id from `questions` (enforced by the store at write time).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub task_description: String,
    pub questions: Vec<Question>,
    /// question id -> submitted answer, last write wins
    #[serde(default)]
    pub responses: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn has_question(&self, question_id: &str) -> bool {
        self.questions.iter().any(|q| q.id == question_id)
    }

    pub fn progress(&self) -> Progress {
        Progress::new(self.responses.len(), self.questions.len())
    }

    pub fn is_complete(&self) -> bool {
        self.responses.len() == self.questions.len()
    }
}

/// Answered/total counters plus a rounded percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
    pub percentage: u32,
}

impl Progress {
    /// Percentage is round-to-nearest, not truncation: 2 of 3 is 67.
    pub fn new(answered: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            ((answered as f64 / total as f64) * 100.0).round() as u32
        };
        Self {
            answered,
            total,
            percentage,
        }
    }
}

/// Read-only projection of a session with portable (RFC 3339) timestamps.
/// Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskContext {
    pub session_id: String,
    pub task_description: String,
    pub questions: Vec<Question>,
    pub responses: HashMap<String, String>,
    pub progress: Progress,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskContext {
    pub fn from_session(session: &Session) -> Self {
        Self {
            session_id: session.id.clone(),
            task_description: session.task_description.clone(),
            questions: session.questions.clone(),
            responses: session.responses.clone(),
            progress: session.progress(),
            created_at: session.created_at.to_rfc3339(),
            updated_at: session.updated_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::QuestionCategory;

    fn session_with(total: usize, answered: usize) -> Session {
        let questions = (1..=total)
            .map(|i| Question {
                id: format!("q{i}"),
                text: format!("Question {i}?"),
                category: QuestionCategory::Other,
                options: vec![],
            })
            .collect::<Vec<_>>();
        let responses = (1..=answered)
            .map(|i| (format!("q{i}"), format!("answer {i}")))
            .collect();
        let now = Utc::now();
        Session {
            id: "sess_test".to_string(),
            task_description: "build a chat app".to_string(),
            questions,
            responses,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn percentage_rounds_to_nearest() {
        assert_eq!(Progress::new(1, 5).percentage, 20);
        assert_eq!(Progress::new(1, 3).percentage, 33);
        assert_eq!(Progress::new(2, 3).percentage, 67);
        assert_eq!(Progress::new(0, 7).percentage, 0);
        assert_eq!(Progress::new(7, 7).percentage, 100);
    }

    #[test]
    fn empty_total_has_zero_percentage() {
        assert_eq!(Progress::new(0, 0).percentage, 0);
    }

    #[test]
    fn complete_session_reports_full_progress() {
        let session = session_with(3, 3);
        assert!(session.is_complete());
        assert_eq!(session.progress().percentage, 100);
    }

    #[test]
    fn context_carries_rfc3339_timestamps() {
        let session = session_with(2, 1);
        let context = TaskContext::from_session(&session);
        assert_eq!(context.session_id, session.id);
        assert_eq!(context.progress.answered, 1);
        assert!(DateTime::parse_from_rfc3339(&context.created_at).is_ok());
        assert!(DateTime::parse_from_rfc3339(&context.updated_at).is_ok());
    }

    #[test]
    fn session_round_trips_through_json() {
        let session = session_with(2, 2);
        let raw = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&raw).unwrap();
        assert_eq!(restored, session);
    }
}
