use std::sync::{Arc, OnceLock};

use regex::Regex;

use super::prompt::{
    build_qa_prompt, explain_concept_prompt, related_questions_prompt, EXAMPLES_REQUEST,
    QA_SYSTEM_PROMPT,
};
use super::types::{QaAnswer, QaRequest, RelatedQuestions, RequestStage, Source, StreamingAnswer};
use crate::core::config::QaSettings;
use crate::core::errors::{RagError, Result};
use crate::llm::GenerationClient;
use crate::rag::{RetrievalResult, Retriever};

const DEFAULT_SOURCE_TITLE: &str = "Documentation";
/// Upper bound on displayed sources, whatever `n_context_docs` retrieved.
pub const MAX_DISPLAYED_SOURCES: usize = 3;

static ENUMERATION_MARKER: OnceLock<Regex> = OnceLock::new();

fn enumeration_marker() -> &'static Regex {
    ENUMERATION_MARKER
        .get_or_init(|| Regex::new(r"^\d+\s*[.):\-]?\s*").expect("enumeration pattern is valid"))
}

/// Keeps lines that start with a digit, minus their `1.` / `2)` marker.
pub fn parse_numbered_lines(text: &str, limit: usize) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .map(|line| enumeration_marker().replace(line, "").trim().to_string())
        .filter(|question| !question.is_empty())
        .take(limit)
        .collect()
}

/// Answers programming questions from retrieved documentation.
pub struct QaSystem {
    retriever: Retriever,
    llm: Arc<dyn GenerationClient>,
    settings: QaSettings,
}

impl QaSystem {
    pub fn new(retriever: Retriever, llm: Arc<dyn GenerationClient>, settings: QaSettings) -> Self {
        Self {
            retriever,
            llm,
            settings,
        }
    }

    pub fn settings(&self) -> &QaSettings {
        &self.settings
    }

    /// A request carrying the configured defaults.
    pub fn request(&self, question: impl Into<String>) -> QaRequest {
        QaRequest::from_settings(question, &self.settings)
    }

    /// Never fails: errors come back as a readable `answer` with no sources
    /// and `stage == Failed`.
    pub async fn answer_question(&self, request: QaRequest) -> QaAnswer {
        let mut stage = RequestStage::Received;
        tracing::debug!("Question received: {}", request.question);

        match self.try_answer(&request, &mut stage).await {
            Ok((answer, sources)) => QaAnswer {
                answer,
                sources,
                language: request.language,
                level: request.level,
                stage,
                error: None,
            },
            Err(e) => {
                let e = fail(&mut stage, e, "answering question");
                QaAnswer {
                    answer: format!(
                        "I encountered an error processing your question: {}",
                        e.user_message()
                    ),
                    sources: Vec::new(),
                    language: request.language,
                    level: request.level,
                    stage,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn try_answer(
        &self,
        request: &QaRequest,
        stage: &mut RequestStage,
    ) -> Result<(String, Vec<Source>)> {
        let (prompt, sources) = self.prepare(request, stage).await?;

        advance(stage, RequestStage::Generating);
        let answer = self.llm.generate(&prompt, Some(QA_SYSTEM_PROMPT)).await?;

        advance(stage, RequestStage::Answered);
        Ok((answer, sources))
    }

    async fn prepare(
        &self,
        request: &QaRequest,
        stage: &mut RequestStage,
    ) -> Result<(String, Vec<Source>)> {
        advance(stage, RequestStage::Retrieving);
        if request.n_context_docs == 0 {
            return Err(RagError::BadRequest(
                "n_context_docs must be at least 1".to_string(),
            ));
        }
        let docs = self
            .retriever
            .semantic_search(&request.question, &request.language, request.n_context_docs)
            .await?;

        advance(stage, RequestStage::ContextAssembled);
        let context: Vec<String> = docs.iter().map(|doc| doc.content.clone()).collect();
        let mut prompt = build_qa_prompt(&request.question, &context, &request.language, &request.level);
        if request.include_examples {
            prompt.push_str(EXAMPLES_REQUEST);
        }

        Ok((prompt, self.sources_from(&docs)))
    }

    fn sources_from(&self, docs: &[RetrievalResult]) -> Vec<Source> {
        docs.iter()
            .take(self.settings.max_sources.min(MAX_DISPLAYED_SOURCES))
            .map(|doc| Source {
                title: doc
                    .metadata
                    .title
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SOURCE_TITLE.to_string()),
                content: preview(&doc.content, self.settings.preview_chars),
                relevance: doc.relevance,
                url: doc.metadata.url.clone().unwrap_or_default(),
            })
            .collect()
    }

    /// Same retrieval and prompt as [`answer_question`](Self::answer_question),
    /// with the answer streamed. Errors before the first fragment are returned.
    pub async fn answer_question_streaming(&self, request: QaRequest) -> Result<StreamingAnswer> {
        let mut stage = RequestStage::Received;
        let (prompt, sources) = self
            .prepare(&request, &mut stage)
            .await
            .map_err(|e| fail(&mut stage, e, "preparing streamed answer"))?;

        advance(&mut stage, RequestStage::Generating);
        let fragments = self
            .llm
            .generate_streaming(&prompt, Some(QA_SYSTEM_PROMPT))
            .await
            .map_err(|e| fail(&mut stage, e, "starting answer stream"))?;

        Ok(StreamingAnswer {
            sources,
            language: request.language,
            level: request.level,
            fragments,
        })
    }

    pub async fn get_related_questions(&self, question: &str, n_questions: usize) -> RelatedQuestions {
        if n_questions == 0 {
            return RelatedQuestions::NoneFound;
        }

        let prompt = related_questions_prompt(question, n_questions);
        match self.llm.generate(&prompt, None).await {
            Ok(text) => {
                let questions = parse_numbered_lines(&text, n_questions);
                if questions.is_empty() {
                    tracing::debug!("No numbered questions in response");
                    RelatedQuestions::NoneFound
                } else {
                    RelatedQuestions::Found(questions)
                }
            }
            Err(e) => {
                tracing::warn!("Related question generation failed: {}", e);
                RelatedQuestions::Failed(e.user_message())
            }
        }
    }

    pub async fn explain_concept(&self, concept: &str, language: &str, level: &str) -> String {
        let prompt = explain_concept_prompt(concept, language, level);
        match self.llm.generate(&prompt, Some(QA_SYSTEM_PROMPT)).await {
            Ok(explanation) => explanation,
            Err(e) => {
                tracing::warn!("Explanation of '{}' failed: {}", concept, e);
                format!("Error generating explanation: {}", e.user_message())
            }
        }
    }
}

fn advance(stage: &mut RequestStage, next: RequestStage) {
    tracing::debug!("Question stage {} -> {}", stage, next);
    *stage = next;
}

/// Logs the error with the stage it interrupted, then moves to `Failed`.
fn fail(stage: &mut RequestStage, error: RagError, activity: &str) -> RagError {
    tracing::warn!("Error {} during {}: {}", activity, stage, error);
    advance(stage, RequestStage::Failed);
    error
}

fn preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbered_questions() {
        let text = "1. What is X?\n2. How does Y work?\n3. Why Z?";
        assert_eq!(
            parse_numbered_lines(text, 3),
            vec!["What is X?", "How does Y work?", "Why Z?"]
        );
    }

    #[test]
    fn parsing_skips_prose_and_respects_limit() {
        let text = "Here are some questions:\n\n  1) First?\n- bullet\n2. Second?\n3. Third?\n10. Tenth?";
        assert_eq!(parse_numbered_lines(text, 2), vec!["First?", "Second?"]);
        assert_eq!(parse_numbered_lines(text, 10).len(), 4);
        assert!(parse_numbered_lines("no numbers here", 3).is_empty());
    }

    #[test]
    fn failure_moves_any_stage_to_failed() {
        for start in [RequestStage::Retrieving, RequestStage::Generating] {
            let mut stage = start;
            let err = fail(&mut stage, RagError::Auth("401".into()), "starting answer stream");
            assert_eq!(stage, RequestStage::Failed);
            assert!(matches!(err, RagError::Auth(_)));
        }
    }

    #[test]
    fn preview_truncates_on_character_boundaries() {
        assert_eq!(preview("short", 200), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("ééééé", 2), "éé...");
    }
}
