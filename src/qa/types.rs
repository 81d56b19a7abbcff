use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::config::defaults::{
    DEFAULT_LANGUAGE, DEFAULT_LEVEL, DEFAULT_N_CONTEXT_DOCS,
};
use crate::core::config::QaSettings;
use crate::llm::FragmentStream;

/// Where a question is in its pipeline. `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStage {
    Received,
    Retrieving,
    ContextAssembled,
    Generating,
    Answered,
    Failed,
}

impl RequestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStage::Received => "RECEIVED",
            RequestStage::Retrieving => "RETRIEVING",
            RequestStage::ContextAssembled => "CONTEXT_ASSEMBLED",
            RequestStage::Generating => "GENERATING",
            RequestStage::Answered => "ANSWERED",
            RequestStage::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaRequest {
    pub question: String,
    pub language: String,
    /// Beginner / Intermediate / Advanced by convention; any label is accepted.
    pub level: String,
    pub include_examples: bool,
    pub n_context_docs: usize,
}

impl QaRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            language: DEFAULT_LANGUAGE.to_string(),
            level: DEFAULT_LEVEL.to_string(),
            include_examples: true,
            n_context_docs: DEFAULT_N_CONTEXT_DOCS,
        }
    }

    pub fn from_settings(question: impl Into<String>, settings: &QaSettings) -> Self {
        Self {
            question: question.into(),
            language: settings.language.clone(),
            level: settings.level.clone(),
            include_examples: settings.include_examples,
            n_context_docs: settings.n_context_docs,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_examples(mut self, include_examples: bool) -> Self {
        self.include_examples = include_examples;
        self
    }

    pub fn with_context_docs(mut self, n_context_docs: usize) -> Self {
        self.n_context_docs = n_context_docs;
        self
    }
}

/// A retrieved passage as shown next to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    /// Leading characters of the passage.
    pub content: String,
    pub relevance: f32,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaAnswer {
    /// The generated answer, or a readable error message on soft failure.
    pub answer: String,
    pub sources: Vec<Source>,
    pub language: String,
    pub level: String,
    pub stage: RequestStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QaAnswer {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum RelatedQuestions {
    Found(Vec<String>),
    /// Generation worked but no numbered lines came back.
    NoneFound,
    Failed(String),
}

impl RelatedQuestions {
    /// The questions, empty unless some were found.
    pub fn questions(&self) -> &[String] {
        match self {
            RelatedQuestions::Found(questions) => questions,
            RelatedQuestions::NoneFound | RelatedQuestions::Failed(_) => &[],
        }
    }

    pub fn into_questions(self) -> Vec<String> {
        match self {
            RelatedQuestions::Found(questions) => questions,
            RelatedQuestions::NoneFound | RelatedQuestions::Failed(_) => Vec::new(),
        }
    }
}

/// Sources known up front, answer text still arriving.
pub struct StreamingAnswer {
    pub sources: Vec<Source>,
    pub language: String,
    pub level: String,
    pub fragments: FragmentStream,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_follow_settings() {
        let settings = QaSettings {
            language: "Rust".into(),
            level: "Advanced".into(),
            include_examples: false,
            n_context_docs: 7,
            ..QaSettings::default()
        };

        let request = QaRequest::from_settings("What is Pin?", &settings);
        assert_eq!(request.language, "Rust");
        assert_eq!(request.level, "Advanced");
        assert!(!request.include_examples);
        assert_eq!(request.n_context_docs, 7);

        let plain = QaRequest::new("q");
        assert_eq!(plain.language, "Python");
        assert_eq!(plain.level, "Intermediate");
        assert_eq!(plain.n_context_docs, 5);
    }

    #[test]
    fn related_questions_accessor_hides_failures() {
        let found = RelatedQuestions::Found(vec!["a".into()]);
        assert_eq!(found.questions(), ["a".to_string()]);
        assert!(RelatedQuestions::Failed("quota".into()).questions().is_empty());
        assert!(RelatedQuestions::NoneFound.into_questions().is_empty());
    }

    #[test]
    fn stage_serializes_in_upper_snake_case() {
        let value = serde_json::to_value(RequestStage::ContextAssembled).unwrap();
        assert_eq!(value, "CONTEXT_ASSEMBLED");
        assert_eq!(RequestStage::Failed.to_string(), "FAILED");
    }
}
