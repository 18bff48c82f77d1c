//! Content specialist: writes the lesson, then the quiz.
//!
//! Each run does at most one of the two. An empty lesson is generated
//! first; on the next run an empty quiz is generated from the lesson;
//! once both exist the specialist does nothing.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::error::AgentResult;
use super::specialist::Specialist;
use super::state::{AgentState, QuizQuestion};
use crate::llm::{CompletionOptions, LlmGateway, Message};
use crate::prompts::content::{LESSON_SYSTEM_PROMPT, QUIZ_SYSTEM_PROMPT};
use crate::prompts::{build_lesson_context, build_lesson_prompt, build_quiz_prompt};
use crate::utils::extract_json_value;

/// Default cap on stored quiz questions.
pub const DEFAULT_MAX_QUIZ_QUESTIONS: usize = 12;

/// Configuration for the content specialist.
#[derive(Debug, Clone)]
pub struct ContentSpecialistConfig {
    pub lesson_temperature: f64,
    pub lesson_max_tokens: u32,
    pub quiz_temperature: f64,
    pub quiz_max_tokens: u32,
    pub max_quiz_questions: usize,
}

impl Default for ContentSpecialistConfig {
    fn default() -> Self {
        Self {
            lesson_temperature: 0.7,
            lesson_max_tokens: 2048,
            quiz_temperature: 0.6,
            quiz_max_tokens: 1024,
            max_quiz_questions: DEFAULT_MAX_QUIZ_QUESTIONS,
        }
    }
}

impl ContentSpecialistConfig {
    pub fn with_max_quiz_questions(mut self, max: usize) -> Self {
        self.max_quiz_questions = max;
        self
    }
}

pub struct ContentSpecialist {
    gateway: Arc<dyn LlmGateway>,
    config: ContentSpecialistConfig,
}

impl std::fmt::Debug for ContentSpecialist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSpecialist")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ContentSpecialist {
    pub const AGENT_NAME: &'static str = "content_specialist";

    pub fn new(gateway: Arc<dyn LlmGateway>, config: ContentSpecialistConfig) -> Self {
        Self { gateway, config }
    }

    pub fn with_defaults(gateway: Arc<dyn LlmGateway>) -> Self {
        Self::new(gateway, ContentSpecialistConfig::default())
    }

    async fn generate_lesson(&self, state: &mut AgentState) -> AgentResult<()> {
        let ctx = &state.context;
        tracing::info!(topic = %ctx.topic_query, subject = %ctx.subject, "Generating lesson content");

        let grounding = build_lesson_context(
            state
                .retrieved_docs
                .iter()
                .map(|d| (d.source.as_str(), d.content.as_str())),
        );
        let messages = vec![
            Message::system(LESSON_SYSTEM_PROMPT),
            Message::user(build_lesson_prompt(
                &ctx.topic_query,
                ctx.subject.display_name(),
                ctx.grade,
                &grounding,
            )),
        ];

        let completion = self
            .gateway
            .complete(
                messages,
                "content_generation",
                state.tenant_id(),
                CompletionOptions::new(self.config.lesson_temperature, self.config.lesson_max_tokens),
            )
            .await?;

        state.lesson_sources = state
            .retrieved_docs
            .iter()
            .map(|d| {
                if d.source.trim().is_empty() {
                    "generated".to_string()
                } else {
                    d.source.clone()
                }
            })
            .collect();
        state.lesson_content = completion.content;

        tracing::info!(length = state.lesson_content.chars().count(), "Lesson content generated");
        Ok(())
    }

    async fn generate_quiz(&self, state: &mut AgentState) -> AgentResult<()> {
        let ctx = &state.context;
        tracing::info!(topic = %ctx.topic_query, "Generating quiz");

        let messages = vec![
            Message::system(QUIZ_SYSTEM_PROMPT),
            Message::user(build_quiz_prompt(
                &ctx.topic_query,
                ctx.subject.display_name(),
                ctx.grade,
                &state.lesson_content,
            )),
        ];

        let completion = self
            .gateway
            .complete(
                messages,
                "quiz_generation",
                state.tenant_id(),
                CompletionOptions::new(self.config.quiz_temperature, self.config.quiz_max_tokens),
            )
            .await?;

        let mut quiz = parse_quiz(&completion.content);
        if quiz.len() > self.config.max_quiz_questions {
            tracing::debug!(
                generated = quiz.len(),
                kept = self.config.max_quiz_questions,
                "Truncating quiz"
            );
            quiz.truncate(self.config.max_quiz_questions);
        }
        state.quiz = quiz;

        tracing::info!(questions = state.quiz.len(), "Quiz generated");
        Ok(())
    }
}

/// Parse a quiz reply. A JSON array yields one question per parseable
/// element, a single object yields one question; when nothing parses the
/// reply becomes one raw-text fallback question.
pub fn parse_quiz(content: &str) -> Vec<QuizQuestion> {
    let parsed = extract_json_value(content).ok().and_then(|value| match value {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| match serde_json::from_value::<QuizQuestion>(item) {
                    Ok(q) => Some(q),
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping unparseable quiz element");
                        None
                    }
                })
                .collect::<Vec<_>>(),
        ),
        obj @ Value::Object(_) => serde_json::from_value::<QuizQuestion>(obj).ok().map(|q| vec![q]),
        _ => None,
    });

    match parsed {
        Some(quiz) if !quiz.is_empty() => quiz,
        _ => {
            tracing::warn!("Quiz reply has no parseable questions, storing raw text");
            vec![QuizQuestion::raw_text(content.trim())]
        }
    }
}

#[async_trait]
impl Specialist for ContentSpecialist {
    fn name(&self) -> &'static str {
        Self::AGENT_NAME
    }

    async fn run(&self, state: &mut AgentState) -> AgentResult<()> {
        if state.lesson_content.trim().is_empty() {
            self.generate_lesson(state).await
        } else if state.quiz.is_empty() {
            self.generate_quiz(state).await
        } else {
            tracing::info!("Content already generated");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::state::QuestionType;
    use crate::agents::test_support::{algebra_state, ScriptedGateway};
    use crate::retrieval::Document;

    fn doc(source: &str, content: &str) -> Document {
        Document {
            content: content.to_string(),
            source: source.to_string(),
            topic: "quadratics".to_string(),
            score: None,
        }
    }

    const QUIZ_JSON: &str = r#"[
        {"question": "Розв'яжи x^2 - 4 = 0", "type": "problem", "correct_answer": "±2"},
        {"question": "Скільки коренів має x^2 = -1?", "type": "multiple_choice", "options": ["0", "1", "2"], "correct_answer": 0}
    ]"#;

    #[tokio::test]
    async fn test_lesson_then_quiz_then_noop() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .with_reply("content_generation", "Урок про квадратні рівняння")
                .with_reply("quiz_generation", QUIZ_JSON),
        );
        let specialist = ContentSpecialist::with_defaults(gateway.clone());
        let mut state = algebra_state();
        state.retrieved_docs = vec![doc("Алгебра 8, с. 120", "Дискримінант"), doc("", "Теорема Вієта")];

        specialist.run(&mut state).await.expect("lesson");
        assert_eq!(state.lesson_content, "Урок про квадратні рівняння");
        assert_eq!(state.lesson_sources, vec!["Алгебра 8, с. 120", "generated"]);
        assert!(state.quiz.is_empty());

        specialist.run(&mut state).await.expect("quiz");
        assert_eq!(state.quiz.len(), 2);
        assert_eq!(state.quiz[0].question_type, QuestionType::Problem);
        assert_eq!(state.quiz[1].correct_answer, "0");

        specialist.run(&mut state).await.expect("noop");
        assert_eq!(gateway.calls().len(), 2);

        let lesson_call = &gateway.calls_for("content_generation")[0];
        assert_eq!(lesson_call.options.temperature, 0.7);
        assert_eq!(lesson_call.options.max_tokens, 2048);
        assert_eq!(lesson_call.tenant_id, "class-8a");
        assert!(lesson_call.messages[1].content.contains("Дискримінант"));

        let quiz_call = &gateway.calls_for("quiz_generation")[0];
        assert_eq!(quiz_call.options.temperature, 0.6);
        assert_eq!(quiz_call.options.max_tokens, 1024);
    }

    #[tokio::test]
    async fn test_failed_lesson_leaves_state_untouched() {
        let gateway = Arc::new(ScriptedGateway::new().with_failure("content_generation"));
        let specialist = ContentSpecialist::with_defaults(gateway);
        let mut state = algebra_state();
        state.retrieved_docs = vec![doc("src", "text")];

        assert!(specialist.run(&mut state).await.is_err());
        assert!(state.lesson_content.is_empty());
        assert!(state.lesson_sources.is_empty());
    }

    #[tokio::test]
    async fn test_quiz_is_capped() {
        let many: Vec<String> = (0..20)
            .map(|i| format!(r#"{{"question": "Питання {}", "correct_answer": "{}"}}"#, i, i))
            .collect();
        let reply = format!("[{}]", many.join(","));
        let gateway = Arc::new(ScriptedGateway::new().with_reply("quiz_generation", reply));
        let specialist = ContentSpecialist::new(
            gateway,
            ContentSpecialistConfig::default().with_max_quiz_questions(5),
        );
        let mut state = algebra_state();
        state.lesson_content = "Урок".to_string();

        specialist.run(&mut state).await.expect("quiz");
        assert_eq!(state.quiz.len(), 5);
        assert_eq!(state.quiz[4].question, "Питання 4");
    }

    #[test]
    fn test_parse_quiz_single_object_in_prose() {
        let quiz = parse_quiz("Ось питання: {\"question\": \"2+2?\", \"correct_answer\": 4}");
        assert_eq!(quiz.len(), 1);
        assert_eq!(quiz[0].correct_answer, "4");
        assert!(!quiz[0].is_fallback());
    }

    #[test]
    fn test_parse_quiz_falls_back_to_raw_text() {
        let quiz = parse_quiz("1. Що таке дискримінант?\n2. Формула коренів?");
        assert_eq!(quiz.len(), 1);
        assert!(quiz[0].is_fallback());
        assert_eq!(quiz[0].question_type, QuestionType::Open);
        assert!(quiz[0].question.contains("дискримінант"));
    }

    #[test]
    fn test_parse_quiz_keeps_elements_with_odd_fields() {
        let reply = r#"[
            {"question": "Розв'яжіть x^2 = 4", "type": "problem", "difficulty": "easy"},
            {"question": "Що таке корінь?", "type": null, "difficulty": 2},
            "зайвий рядок",
            {"question": "3x = 9", "type": "problem", "correct_answer": 3}
        ]"#;
        let quiz = parse_quiz(reply);

        assert_eq!(quiz.len(), 3);
        assert!(quiz.iter().all(|q| !q.is_fallback()));
        assert_eq!(quiz[0].question_type, QuestionType::Problem);
        assert_eq!(quiz[1].question_type, QuestionType::Open);
        assert_eq!(quiz[1].difficulty.as_deref(), Some("2"));
        assert_eq!(quiz[2].correct_answer, "3");
    }

    #[test]
    fn test_parse_quiz_array_without_questions_falls_back() {
        let quiz = parse_quiz(r#"["a", "b"]"#);
        assert_eq!(quiz.len(), 1);
        assert!(quiz[0].is_fallback());
    }
}
