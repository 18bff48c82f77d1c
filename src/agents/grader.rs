//! Grader specialist: scores student answers against the quiz.

use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;

use super::error::AgentResult;
use super::specialist::Specialist;
use super::state::{AgentState, Grade, GradingRecord, GradingResult};
use crate::llm::{CompletionOptions, LlmGateway, Message};
use crate::prompts::assessment::GRADING_SYSTEM_PROMPT;
use crate::prompts::{build_grading_prompt, GradingInput};

pub const MAX_SCORE: u8 = 10;

/// Lowest score counted as a correct answer.
pub const PASSING_SCORE: u8 = 7;

/// Score assumed when the grading reply has no number. This biases
/// unparseable replies towards "incorrect".
pub const NEUTRAL_SCORE: u8 = 5;

const SCORE_MARKERS: [&str; 2] = ["оцінк", "score"];

fn first_integer(text: &str) -> Option<u64> {
    let re = Regex::new(r"\d+").ok()?;
    re.find(text).and_then(|m| m.as_str().parse().ok())
}

/// Score from a grading reply: the first integer on the first line carrying
/// a score marker, else the first integer anywhere, else [`NEUTRAL_SCORE`].
/// Clamped to `0..=MAX_SCORE`.
pub fn extract_score(text: &str) -> u8 {
    let marked = text
        .lines()
        .find(|line| {
            let lower = line.to_lowercase();
            SCORE_MARKERS.iter().any(|m| lower.contains(m))
        })
        .and_then(first_integer);

    match marked.or_else(|| first_integer(text)) {
        Some(n) => n.min(u64::from(MAX_SCORE)) as u8,
        None => NEUTRAL_SCORE,
    }
}

pub struct GraderSpecialist {
    gateway: Arc<dyn LlmGateway>,
    temperature: f64,
    max_tokens: u32,
}

impl std::fmt::Debug for GraderSpecialist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraderSpecialist")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl GraderSpecialist {
    pub const AGENT_NAME: &'static str = "grader_specialist";

    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self {
            gateway,
            temperature: 0.2,
            max_tokens: 512,
        }
    }
}

#[async_trait]
impl Specialist for GraderSpecialist {
    fn name(&self) -> &'static str {
        Self::AGENT_NAME
    }

    async fn run(&self, state: &mut AgentState) -> AgentResult<()> {
        let answers = match state.student_answers.as_ref() {
            Some(answers) if !answers.is_empty() => answers.clone(),
            _ => {
                tracing::debug!("No student answers to grade");
                return Ok(());
            }
        };

        let ctx = &state.context;
        tracing::info!(questions = state.quiz.len(), answers = answers.len(), "Grading answers");

        let mut results = Vec::new();
        for (question_index, (question, answer)) in state.quiz.iter().zip(answers.iter()).enumerate() {
            let question_type = serde_json::to_value(question.question_type)?;
            let prompt = build_grading_prompt(&GradingInput {
                subject: ctx.subject.display_name(),
                grade: ctx.grade,
                question_type: question_type.as_str().unwrap_or("open"),
                question: &question.question,
                correct_answer: &question.correct_answer,
                student_answer: answer,
            });
            let completion = self
                .gateway
                .complete(
                    vec![Message::system(GRADING_SYSTEM_PROMPT), Message::user(prompt)],
                    "grading",
                    ctx.tenant_id(),
                    CompletionOptions::new(self.temperature, self.max_tokens),
                )
                .await?;

            let score = extract_score(&completion.content);
            results.push(GradingRecord {
                question_index,
                question: question.clone(),
                student_answer: answer.clone(),
                grade: Grade {
                    score,
                    max_score: MAX_SCORE,
                    correct: score >= PASSING_SCORE,
                    feedback: completion.content,
                    auto_graded: true,
                },
            });
        }

        let correct_answers = results.iter().filter(|r| r.grade.correct).count();
        let average_score = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| f64::from(r.grade.score)).sum::<f64>() / results.len() as f64
        };
        let result = GradingResult {
            total_questions: state.quiz.len(),
            correct_answers,
            average_score,
            results,
        };

        tracing::info!(
            correct = result.correct_answers,
            average = result.average_score,
            "Grading complete"
        );
        state.grading_result = Some(result);
        Ok(())
    }
}
