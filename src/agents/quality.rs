//! Quality assurance over generated lessons and quizzes.
//!
//! [`QaValidator`] asks the cloud backend to review the lesson and the quiz
//! against a rubric, then scans each reply for issue and suggestion markers.
//! The scan is a plain substring match on the lower-cased reply, so a
//! review saying "no problems found" still counts as an issue. The tests
//! below pin that behavior.

use async_trait::async_trait;
use std::sync::Arc;

use super::error::AgentResult;
use super::state::{AgentState, Feedback};
use crate::llm::{Backend, CompletionOptions, LlmGateway, Message};
use crate::prompts::assessment::{LESSON_REVIEW_SYSTEM_PROMPT, QUIZ_REVIEW_SYSTEM_PROMPT};
use crate::prompts::{build_lesson_review_prompt, build_quiz_review_prompt};

const ISSUE_MARKERS: [&str; 4] = ["проблем", "невірн", "problem", "incorrect"];
const SUGGESTION_MARKERS: [&str; 4] = ["пропоную", "рекоменд", "suggest", "recommend"];

/// Validates the content in a state.
#[async_trait]
pub trait QualityValidator: Send + Sync {
    async fn validate(&self, state: &AgentState) -> AgentResult<Feedback>;
}

/// Marker scan result for one review reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewVerdict {
    pub has_issues: bool,
    pub has_suggestions: bool,
}

pub fn scan_review(reply: &str) -> ReviewVerdict {
    let lower = reply.to_lowercase();
    ReviewVerdict {
        has_issues: ISSUE_MARKERS.iter().any(|m| lower.contains(m)),
        has_suggestions: SUGGESTION_MARKERS.iter().any(|m| lower.contains(m)),
    }
}

/// LLM-backed [`QualityValidator`].
pub struct QaValidator {
    gateway: Arc<dyn LlmGateway>,
    temperature: f64,
    max_tokens: u32,
}

impl std::fmt::Debug for QaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QaValidator")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl QaValidator {
    pub const AGENT_NAME: &'static str = "qa_validator";

    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self {
            gateway,
            temperature: 0.2,
            max_tokens: 512,
        }
    }

    async fn review(&self, system: &str, prompt: String, tenant_id: &str) -> AgentResult<ReviewVerdict> {
        let completion = self
            .gateway
            .complete(
                vec![Message::system(system), Message::user(prompt)],
                "quality_check",
                tenant_id,
                CompletionOptions::new(self.temperature, self.max_tokens).with_provider(Backend::Cloud),
            )
            .await?;
        Ok(scan_review(&completion.content))
    }
}

#[async_trait]
impl QualityValidator for QaValidator {
    async fn validate(&self, state: &AgentState) -> AgentResult<Feedback> {
        if !state.has_content() {
            tracing::warn!(request_id = %state.context.request_id, "No content to validate");
            return Ok(Feedback::invalid("No content generated"));
        }

        let grade = state.context.grade;
        let mut feedback = Feedback::default();

        if !state.lesson_content.trim().is_empty() {
            let verdict = self
                .review(
                    LESSON_REVIEW_SYSTEM_PROMPT,
                    build_lesson_review_prompt(&state.lesson_content, grade),
                    state.tenant_id(),
                )
                .await?;
            if verdict.has_issues {
                feedback.issues.push("Lesson quality issues detected".to_string());
            }
            if verdict.has_suggestions {
                feedback.suggestions.push("Lesson improvements suggested".to_string());
            }
        }

        if !state.quiz.is_empty() {
            let quiz_json = serde_json::to_string(&state.quiz)?;
            let verdict = self
                .review(
                    QUIZ_REVIEW_SYSTEM_PROMPT,
                    build_quiz_review_prompt(&quiz_json, grade),
                    state.tenant_id(),
                )
                .await?;
            if verdict.has_issues {
                feedback.issues.push("Quiz quality issues detected".to_string());
            }
            if verdict.has_suggestions {
                feedback.suggestions.push("Quiz improvements suggested".to_string());
            }
        }

        feedback.valid = feedback.issues.is_empty();
        tracing::info!(
            valid = feedback.valid,
            issues = feedback.issues.len(),
            suggestions = feedback.suggestions.len(),
            "Content validated"
        );
        Ok(feedback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::state::QuizQuestion;
    use crate::agents::test_support::{algebra_state, ScriptedGateway};

    #[test]
    fn test_scan_review_markers() {
        assert_eq!(
            scan_review("Виявлено ПРОБЛЕМУ з прикладом. Пропоную додати графік."),
            ReviewVerdict {
                has_issues: true,
                has_suggestions: true
            }
        );
        assert_eq!(
            scan_review("Матеріал відповідає програмі."),
            ReviewVerdict {
                has_issues: false,
                has_suggestions: false
            }
        );
        assert!(scan_review("Answer 2 is incorrect").has_issues);
        assert!(scan_review("I recommend more examples").has_suggestions);
    }

    #[test]
    fn test_scan_review_negated_issue_still_counts() {
        assert!(scan_review("Проблем не виявлено").has_issues);
    }

    #[tokio::test]
    async fn test_no_content_is_invalid_without_calls() {
        let gateway = Arc::new(ScriptedGateway::new());
        let validator = QaValidator::new(gateway.clone());

        let feedback = validator.validate(&algebra_state()).await.expect("feedback");
        assert!(!feedback.valid);
        assert_eq!(feedback.issues, vec!["No content generated".to_string()]);
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reviews_lesson_and_quiz_on_cloud() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .with_queued("quality_check", Ok("Урок добрий. Рекомендую додати задачу.".to_string()))
                .with_queued("quality_check", Ok("Питання 2 має невірну відповідь.".to_string())),
        );
        let validator = QaValidator::new(gateway.clone());
        let mut state = algebra_state();
        state.lesson_content = "Урок".to_string();
        state.quiz = vec![QuizQuestion::raw_text("Питання")];

        let feedback = validator.validate(&state).await.expect("feedback");

        assert!(!feedback.valid);
        assert_eq!(feedback.issues, vec!["Quiz quality issues detected".to_string()]);
        assert_eq!(feedback.suggestions, vec!["Lesson improvements suggested".to_string()]);

        let calls = gateway.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.options.provider == Some(Backend::Cloud)));
        assert!(calls.iter().all(|c| c.options.max_tokens == 512));
    }

    #[tokio::test]
    async fn test_lesson_only_passes_when_clean() {
        let gateway = Arc::new(ScriptedGateway::new().with_reply("quality_check", "Все добре."));
        let validator = QaValidator::new(gateway.clone());
        let mut state = algebra_state();
        state.lesson_content = "Урок".to_string();

        let feedback = validator.validate(&state).await.expect("feedback");
        assert!(feedback.valid);
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_gateway_failure_propagates() {
        let gateway = Arc::new(ScriptedGateway::new().with_failure("quality_check"));
        let validator = QaValidator::new(gateway);
        let mut state = algebra_state();
        state.lesson_content = "Урок".to_string();

        assert!(validator.validate(&state).await.is_err());
    }
}
