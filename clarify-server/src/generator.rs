//! Turns a task description into categorized clarifying questions.
//!
//! The streaming path re-extracts from the growing buffer after every delta
//! and emits each question id at most once. Those partial emissions are
//! advisory previews: a balanced-but-incomplete envelope mid-stream can
//! surface a truncated list, so the decode that runs after the stream ends
//! is the authoritative one and feeds the `Complete` event.

use crate::config::LlmConfig;
use crate::extractor;
use clarify_llm_sdk::types::{CompletionRequest, Message};
use clarify_llm_sdk::LlmClient;
use clarify_types::Question;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

const SYSTEM_PROMPT: &str = r#"You are a JSON API that produces clarifying questions for an informal software task description.

Your entire output MUST be a single valid JSON object with this field:
- "questions": an array of 5 to 7 question objects

Each question object must have:
- "id": "q1", "q2", ...
- "text": the clarifying question
- "category": one of "tech_stack", "scope", "architecture", "features", "deployment", "integrations", "other"
- "options": an array of 2 to 4 short suggested answers

Example:

Input: build a chat app
Output: {"questions": [{"id": "q1", "text": "Which platforms should the chat app target?", "category": "scope", "options": ["Web", "Mobile", "Both"]}]}

Return ONLY the JSON object. No markdown, no code blocks."#;

/// Progress of one streaming generation call.
#[derive(Debug, Clone)]
pub enum GenerationEvent {
    /// A question extracted from the partial buffer; each id is emitted once
    Question(Question),
    /// The stream ended; carries the authoritative final list
    Complete(Vec<Question>),
    /// The provider stream failed before completion
    Failed(String),
}

pub struct QuestionGenerator {
    client: Arc<dyn LlmClient>,
    settings: LlmConfig,
}

impl QuestionGenerator {
    pub fn new(client: Arc<dyn LlmClient>, settings: LlmConfig) -> Self {
        Self { client, settings }
    }

    fn build_request(&self, task_description: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            messages: vec![Message::user(format!(
                "Generate clarifying questions for this task:\n\n{task_description}"
            ))],
            system: Some(SYSTEM_PROMPT.to_string()),
            temperature: Some(self.settings.temperature),
            top_p: None,
            stop_sequences: None,
        }
    }

    /// Non-streaming generation. Provider failures degrade to the fallback
    /// set and are never surfaced to the caller; no retries.
    pub async fn generate(&self, task_description: &str) -> Vec<Question> {
        match self
            .client
            .complete(self.build_request(task_description))
            .await
        {
            Ok(response) => extractor::extract_with_fallback(&response.text()),
            Err(e) => {
                tracing::warn!(error = %e, "question generation failed, using fallback set");
                extractor::fallback_questions()
            }
        }
    }

    /// Streaming generation. The returned receiver yields `Question` events
    /// as they become extractable, then exactly one `Complete` or `Failed`.
    /// Dropping the receiver does not cancel the provider call; remaining
    /// events are discarded.
    pub fn stream(&self, task_description: &str) -> mpsc::Receiver<GenerationEvent> {
        let request = self.build_request(task_description);
        let client = Arc::clone(&self.client);
        let (event_tx, event_rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let (chunk_tx, mut chunk_rx) = mpsc::channel(64);
            let stream_task =
                tokio::spawn(async move { client.stream(request, chunk_tx).await });

            let mut buffer = String::new();
            let mut seen: HashSet<String> = HashSet::new();

            while let Some(chunk) = chunk_rx.recv().await {
                if chunk.content.is_empty() {
                    continue;
                }
                buffer.push_str(&chunk.content);
                if let Ok(questions) = extractor::extract(&buffer) {
                    for question in questions {
                        if seen.insert(question.id.clone()) {
                            let _ = event_tx.send(GenerationEvent::Question(question)).await;
                        }
                    }
                }
            }

            match stream_task.await {
                Ok(Ok(_)) => {
                    let final_questions = extractor::extract_with_fallback(&buffer);
                    for question in &final_questions {
                        if seen.insert(question.id.clone()) {
                            let _ = event_tx
                                .send(GenerationEvent::Question(question.clone()))
                                .await;
                        }
                    }
                    let _ = event_tx
                        .send(GenerationEvent::Complete(final_questions))
                        .await;
                }
                Ok(Err(e)) => {
                    let _ = event_tx.send(GenerationEvent::Failed(e.to_string())).await;
                }
                Err(e) => {
                    let _ = event_tx
                        .send(GenerationEvent::Failed(format!(
                            "generation task failed: {e}"
                        )))
                        .await;
                }
            }
        });

        event_rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::fallback_questions;
    use crate::test_support::MockLlmClient;

    const ENVELOPE: &str = r#"{"questions": [
        {"id": "q1", "text": "Which platforms?", "category": "scope", "options": ["Web", "Mobile"]},
        {"id": "q2", "text": "Which stack?", "category": "tech_stack", "options": ["React", "Vue"]}
    ]}"#;

    fn generator_with(client: MockLlmClient) -> QuestionGenerator {
        QuestionGenerator::new(Arc::new(client), LlmConfig::default())
    }

    async fn collect(mut rx: mpsc::Receiver<GenerationEvent>) -> Vec<GenerationEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn generate_parses_the_envelope() {
        let generator = generator_with(MockLlmClient::replying(ENVELOPE));
        let questions = generator.generate("build a chat app").await;
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].id, "q1");
    }

    #[tokio::test]
    async fn generate_falls_back_on_provider_error() {
        let generator = generator_with(MockLlmClient::failing("boom"));
        let questions = generator.generate("build a chat app").await;
        assert_eq!(questions, fallback_questions());
    }

    #[tokio::test]
    async fn generate_falls_back_on_malformed_output() {
        let generator = generator_with(MockLlmClient::replying("I cannot produce JSON today"));
        let questions = generator.generate("build a chat app").await;
        assert_eq!(questions, fallback_questions());
    }

    #[tokio::test]
    async fn stream_emits_each_question_once_then_complete() {
        let generator = generator_with(MockLlmClient::streaming(ENVELOPE, 7));
        let events = collect(generator.stream("build a chat app")).await;

        let mut question_ids = Vec::new();
        let mut completes = 0;
        for event in &events {
            match event {
                GenerationEvent::Question(q) => question_ids.push(q.id.clone()),
                GenerationEvent::Complete(questions) => {
                    completes += 1;
                    assert_eq!(questions.len(), 2);
                }
                GenerationEvent::Failed(e) => panic!("unexpected failure: {e}"),
            }
        }
        assert_eq!(completes, 1);
        assert!(matches!(events.last(), Some(GenerationEvent::Complete(_))));
        // no duplicate ids even though the buffer is re-extracted per chunk
        let unique: HashSet<_> = question_ids.iter().collect();
        assert_eq!(unique.len(), question_ids.len());
        assert!(question_ids.contains(&"q1".to_string()));
        assert!(question_ids.contains(&"q2".to_string()));
    }

    #[tokio::test]
    async fn stream_failure_emits_failed_and_no_complete() {
        let generator = generator_with(MockLlmClient::stream_failing("connection reset"));
        let events = collect(generator.stream("build a chat app")).await;
        assert!(matches!(events.last(), Some(GenerationEvent::Failed(_))));
        assert!(!events
            .iter()
            .any(|e| matches!(e, GenerationEvent::Complete(_))));
    }

    #[tokio::test]
    async fn stream_of_malformed_output_completes_with_fallback() {
        let generator = generator_with(MockLlmClient::streaming("not json at all", 4));
        let events = collect(generator.stream("build a chat app")).await;
        match events.last() {
            Some(GenerationEvent::Complete(questions)) => {
                assert_eq!(*questions, fallback_questions());
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }
}
