use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Closed set of categories a clarifying question can belong to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    TechStack,
    Scope,
    Architecture,
    Features,
    Deployment,
    Integrations,
    #[default]
    Other,
}

impl QuestionCategory {
    /// Parse a category label; anything outside the closed set maps to `Other`.
    pub fn parse_or_other(label: &str) -> Self {
        match label {
            "tech_stack" => Self::TechStack,
            "scope" => Self::Scope,
            "architecture" => Self::Architecture,
            "features" => Self::Features,
            "deployment" => Self::Deployment,
            "integrations" => Self::Integrations,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TechStack => "tech_stack",
            Self::Scope => "scope",
            Self::Architecture => "architecture",
            Self::Features => "features",
            Self::Deployment => "deployment",
            Self::Integrations => "integrations",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for QuestionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One clarifying question. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Question {
    /// Identifier, unique within a session
    pub id: String,
    /// The question text to display to the user
    pub text: String,
    /// Category from the closed set
    pub category: QuestionCategory,
    /// Suggested answers (may be empty)
    #[serde(default)]
    pub options: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_labels_round_trip() {
        for category in [
            QuestionCategory::TechStack,
            QuestionCategory::Scope,
            QuestionCategory::Architecture,
            QuestionCategory::Features,
            QuestionCategory::Deployment,
            QuestionCategory::Integrations,
            QuestionCategory::Other,
        ] {
            assert_eq!(QuestionCategory::parse_or_other(category.as_str()), category);
        }
    }

    #[test]
    fn unknown_category_maps_to_other() {
        assert_eq!(
            QuestionCategory::parse_or_other("budget"),
            QuestionCategory::Other
        );
        assert_eq!(QuestionCategory::parse_or_other(""), QuestionCategory::Other);
    }

    #[test]
    fn question_serializes_snake_case_category() {
        let question = Question {
            id: "q1".to_string(),
            text: "Which stack?".to_string(),
            category: QuestionCategory::TechStack,
            options: vec!["React".to_string()],
        };
        let json = serde_json::to_value(&question).unwrap();
        assert_eq!(json["category"], "tech_stack");
    }
}
