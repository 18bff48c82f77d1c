//! Solver specialist: step-by-step solutions for quiz problems.

use async_trait::async_trait;
use std::sync::Arc;

use super::error::AgentResult;
use super::specialist::Specialist;
use super::state::{AgentState, QuestionType, QuizQuestion, SolvedProblem, Subject};
use crate::llm::{CompletionOptions, LlmGateway, Message};
use crate::prompts::build_solver_prompt;
use crate::prompts::content::SOLVER_SYSTEM_PROMPT;

/// Substrings marking a question as a problem to solve.
const SOLVE_TRIGGERS: [&str; 3] = ["розв'яж", "розв'яз", "solve"];

/// Whether a quiz question asks for a worked solution.
pub fn is_problem(question: &QuizQuestion) -> bool {
    if question.question_type == QuestionType::Problem {
        return true;
    }
    let text = question.question.to_lowercase();
    SOLVE_TRIGGERS.iter().any(|t| text.contains(t))
}

/// Gateway task type for a subject's solutions.
pub fn solver_task_type(subject: Subject) -> &'static str {
    match subject {
        Subject::Algebra => "solver_algebra",
        _ => "solver_general",
    }
}

pub struct SolverSpecialist {
    gateway: Arc<dyn LlmGateway>,
    temperature: f64,
    max_tokens: u32,
}

impl std::fmt::Debug for SolverSpecialist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverSpecialist")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl SolverSpecialist {
    pub const AGENT_NAME: &'static str = "solver_specialist";

    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self {
            gateway,
            temperature: 0.3,
            max_tokens: 1024,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl Specialist for SolverSpecialist {
    fn name(&self) -> &'static str {
        Self::AGENT_NAME
    }

    async fn run(&self, state: &mut AgentState) -> AgentResult<()> {
        let subject = state.context.subject;
        if !subject.is_quantitative() {
            tracing::debug!(subject = %subject, "Solver skipped for non-quantitative subject");
            return Ok(());
        }

        let problems: Vec<(usize, String)> = state
            .quiz
            .iter()
            .enumerate()
            .filter(|(_, q)| is_problem(q))
            .map(|(i, q)| (i, q.question.clone()))
            .collect();

        tracing::info!(count = problems.len(), "Solving problems");

        let task_type = solver_task_type(subject);
        let mut solved = Vec::with_capacity(problems.len());
        for (question_index, problem) in problems {
            let messages = vec![
                Message::system(SOLVER_SYSTEM_PROMPT),
                Message::user(build_solver_prompt(
                    &problem,
                    subject.display_name(),
                    state.context.grade,
                    &state.lesson_content,
                )),
            ];
            let completion = self
                .gateway
                .complete(
                    messages,
                    task_type,
                    state.tenant_id(),
                    CompletionOptions::new(self.temperature, self.max_tokens),
                )
                .await?;
            solved.push(SolvedProblem {
                question_index,
                problem,
                solution: completion.content,
            });
        }

        state.solved_problems = solved;
        Ok(())
    }
}
