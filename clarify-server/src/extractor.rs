//! Converts raw model output into validated question records.
//!
//! The model is asked for a single JSON object with a `questions` array, but
//! may wrap it in prose or markdown fences, or may not have produced the
//! closing brace yet. `extract` pulls the first balanced object span out of
//! whatever text is there; `extract_with_fallback` guarantees callers a
//! non-empty, well-formed list no matter what came back.

use clarify_types::{Question, QuestionCategory};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no balanced JSON object found in text")]
    NoEnvelope,

    #[error("malformed JSON envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("envelope has no questions array")]
    MissingQuestions,
}

/// The questions served when generation or extraction fails:
/// (text, category, options), ids assigned positionally.
pub const FALLBACK_QUESTIONS: &[(&str, QuestionCategory, &[&str])] = &[
    (
        "What technology stack would you like to use?",
        QuestionCategory::TechStack,
        &[
            "React + Node.js",
            "Vue + FastAPI",
            "Plain HTML/CSS/JS",
            "No preference",
        ],
    ),
    (
        "How should the application be structured?",
        QuestionCategory::Architecture,
        &[
            "Single-page app",
            "Server-rendered pages",
            "API with separate frontend",
            "No preference",
        ],
    ),
    (
        "Where will this be deployed?",
        QuestionCategory::Deployment,
        &[
            "Cloud provider",
            "Self-hosted server",
            "Local machine only",
            "Not decided yet",
        ],
    ),
    (
        "Which features matter most for a first version?",
        QuestionCategory::Features,
        &[
            "Core functionality only",
            "Core plus a few nice-to-haves",
            "Full feature set",
        ],
    ),
    (
        "How large should the initial scope be?",
        QuestionCategory::Scope,
        &["Minimal prototype", "Usable MVP", "Production-ready"],
    ),
];

/// Build the fallback set from the constant table.
pub fn fallback_questions() -> Vec<Question> {
    FALLBACK_QUESTIONS
        .iter()
        .enumerate()
        .map(|(i, (text, category, options))| Question {
            id: format!("q{}", i + 1),
            text: (*text).to_string(),
            category: *category,
            options: options.iter().map(|o| (*o).to_string()).collect(),
        })
        .collect()
}

/// Extract questions from the first balanced JSON object in `text`.
///
/// Pure function of the input; only the envelope is validated. Individual
/// entries are never rejected: missing ids get positional `q<n>` fallbacks,
/// unknown categories become `other`, missing options become empty, and an
/// entry without text is still emitted with empty text.
pub fn extract(text: &str) -> Result<Vec<Question>, ExtractError> {
    let span = balanced_object_span(text).ok_or(ExtractError::NoEnvelope)?;
    let envelope: Value = serde_json::from_str(span)?;
    let entries = envelope
        .get("questions")
        .and_then(Value::as_array)
        .ok_or(ExtractError::MissingQuestions)?;

    Ok(entries
        .iter()
        .enumerate()
        .map(|(i, entry)| question_from_entry(i, entry))
        .collect())
}

/// `extract`, degrading to the fixed fallback set on any failure (or an
/// empty decoded list, which callers must never see).
pub fn extract_with_fallback(text: &str) -> Vec<Question> {
    match extract(text) {
        Ok(questions) if !questions.is_empty() => questions,
        Ok(_) => {
            tracing::warn!("generation produced an empty question list, using fallback set");
            fallback_questions()
        }
        Err(e) => {
            tracing::warn!(error = %e, "question extraction failed, using fallback set");
            fallback_questions()
        }
    }
}

fn question_from_entry(index: usize, entry: &Value) -> Question {
    let id = entry
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("q{}", index + 1));
    let text = entry
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let category = entry
        .get("category")
        .and_then(Value::as_str)
        .map(QuestionCategory::parse_or_other)
        .unwrap_or_default();
    let options = entry
        .get("options")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Question {
        id,
        text,
        category,
        options,
    }
}

/// First balanced top-level `{...}` span, honoring string literals and
/// escape sequences so braces inside question text don't end the span early.
fn balanced_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENVELOPE: &str = r#"{
        "questions": [
            {"id": "q1", "text": "Which platforms?", "category": "scope", "options": ["Web", "Mobile"]},
            {"id": "q2", "text": "Which stack?", "category": "tech_stack", "options": ["React", "Vue"]},
            {"id": "q3", "text": "Real-time updates?", "category": "features", "options": ["Yes", "No"]}
        ]
    }"#;

    #[test]
    fn extracts_all_questions_in_order() {
        let questions = extract(ENVELOPE).unwrap();
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0].id, "q1");
        assert_eq!(questions[1].text, "Which stack?");
        assert_eq!(questions[2].category, QuestionCategory::Features);
    }

    #[test]
    fn tolerates_surrounding_prose_and_fences() {
        let text = format!("Here are your questions:\n```json\n{ENVELOPE}\n```\nDone.");
        let questions = extract(&text).unwrap();
        assert_eq!(questions.len(), 3);
    }

    #[test]
    fn braces_inside_strings_do_not_close_the_span() {
        let text = r#"{"questions": [{"id": "q1", "text": "Use {curly} braces \"quoted\"?", "category": "other", "options": []}]}"#;
        let questions = extract(text).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].text, "Use {curly} braces \"quoted\"?");
    }

    #[test]
    fn entry_defaults_are_applied() {
        let text = r#"{"questions": [
            {"text": "No id or category"},
            {"id": "", "text": "Empty id", "category": "budget"},
            {"id": "custom", "category": "scope"}
        ]}"#;
        let questions = extract(text).unwrap();
        assert_eq!(questions[0].id, "q1");
        assert_eq!(questions[0].category, QuestionCategory::Other);
        assert!(questions[0].options.is_empty());
        assert_eq!(questions[1].id, "q2");
        assert_eq!(questions[1].category, QuestionCategory::Other);
        assert_eq!(questions[2].id, "custom");
        assert_eq!(questions[2].text, "");
    }

    #[test]
    fn truncated_text_is_no_envelope() {
        let truncated = &ENVELOPE[..ENVELOPE.len() - 10];
        assert!(matches!(extract(truncated), Err(ExtractError::NoEnvelope)));
        assert!(matches!(extract("no json here"), Err(ExtractError::NoEnvelope)));
    }

    #[test]
    fn malformed_envelope_is_rejected() {
        assert!(matches!(
            extract(r#"{"questions": [}"#),
            Err(ExtractError::Malformed(_))
        ));
    }

    #[test]
    fn envelope_without_questions_array_is_rejected() {
        assert!(matches!(
            extract(r#"{"answer": "42"}"#),
            Err(ExtractError::MissingQuestions)
        ));
        assert!(matches!(
            extract(r#"{"questions": "not-an-array"}"#),
            Err(ExtractError::MissingQuestions)
        ));
    }

    #[test]
    fn fallback_matches_the_constant_table() {
        let fallback = extract_with_fallback("garbage");
        assert_eq!(fallback.len(), FALLBACK_QUESTIONS.len());
        for (question, (text, category, options)) in fallback.iter().zip(FALLBACK_QUESTIONS) {
            assert_eq!(question.text, *text);
            assert_eq!(question.category, *category);
            assert_eq!(question.options.len(), options.len());
        }
        // deterministic: same input, same output
        assert_eq!(fallback, extract_with_fallback("garbage"));
        assert_eq!(fallback, fallback_questions());
    }

    #[test]
    fn empty_question_list_degrades_to_fallback() {
        assert_eq!(
            extract_with_fallback(r#"{"questions": []}"#),
            fallback_questions()
        );
    }
}
