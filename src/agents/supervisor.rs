//! Supervisor: plans which specialists run and decides on regeneration.
//!
//! Both decisions come from the model, so the supervisor treats replies as
//! untrusted text. Plans are parsed line by line with a fixed default when
//! nothing usable comes back, and the regeneration decision is fail-closed:
//! anything other than an explicit "yes" stops the loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::analyst::AnalystSpecialist;
use super::content::{ContentSpecialist, ContentSpecialistConfig};
use super::error::AgentResult;
use super::grader::GraderSpecialist;
use super::solver::SolverSpecialist;
use super::specialist::{invoke_specialist, Specialist};
use super::state::AgentState;
use crate::llm::{CompletionOptions, LlmGateway, Message};
use crate::prompts::supervisor::{REGENERATION_SYSTEM_PROMPT, SUPERVISOR_SYSTEM_PROMPT};
use crate::prompts::{build_planning_prompt, build_regeneration_prompt, PlanningContext};

/// A unit of specialist work in an execution plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    ContentGeneration,
    QuizGeneration,
    Solving,
    Grading,
    Analytics,
    QualityCheck,
}

impl Task {
    pub const ALL: [Task; 6] = [
        Task::ContentGeneration,
        Task::QuizGeneration,
        Task::Solving,
        Task::Grading,
        Task::Analytics,
        Task::QualityCheck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Task::ContentGeneration => "content_generation",
            Task::QuizGeneration => "quiz_generation",
            Task::Solving => "solving",
            Task::Grading => "grading",
            Task::Analytics => "analytics",
            Task::QualityCheck => "quality_check",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Task::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| format!("unknown task '{}'", s))
    }
}

/// Plan used when the planner's reply names no known task.
pub fn default_plan() -> Vec<Task> {
    vec![Task::ContentGeneration, Task::QuizGeneration, Task::Solving]
}

/// Parse a numbered plan.
///
/// Only lines starting with a digit are considered; the last token of each
/// such line, stripped of punctuation, names the task.
pub fn parse_plan(reply: &str) -> Vec<Task> {
    let mut plan = Vec::new();
    for line in reply.lines().map(str::trim) {
        if !line.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        let Some(token) = line.split_whitespace().last() else {
            continue;
        };
        let name = token.trim_matches(|c: char| !(c.is_alphanumeric() || c == '_'));
        match name.parse::<Task>() {
            Ok(task) => plan.push(task),
            Err(e) => tracing::warn!(line = %line, error = %e, "Skipping unknown plan entry"),
        }
    }

    if plan.is_empty() {
        tracing::warn!("Plan reply had no known tasks, using default plan");
        return default_plan();
    }
    plan
}

/// Specialists bound to tasks. Tasks without a binding are skipped at
/// execution time.
#[derive(Default, Clone)]
pub struct SpecialistRegistry {
    bindings: HashMap<Task, Arc<dyn Specialist>>,
}

impl fmt::Debug for SpecialistRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bound: Vec<_> = self.bindings.iter().map(|(t, s)| (t.as_str(), s.name())).collect();
        bound.sort_unstable();
        f.debug_struct("SpecialistRegistry").field("bindings", &bound).finish()
    }
}

impl SpecialistRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The production bindings. `quality_check` stays unbound because
    /// validation runs outside the plan.
    pub fn standard(gateway: Arc<dyn LlmGateway>, content_config: ContentSpecialistConfig) -> Self {
        let content: Arc<dyn Specialist> = Arc::new(ContentSpecialist::new(gateway.clone(), content_config));
        let solver: Arc<dyn Specialist> = Arc::new(SolverSpecialist::new(gateway.clone()));
        let grader: Arc<dyn Specialist> = Arc::new(GraderSpecialist::new(gateway.clone()));
        let analyst: Arc<dyn Specialist> = Arc::new(AnalystSpecialist::new(gateway));

        let mut registry = Self::new();
        for task in Task::ALL {
            let specialist = match task {
                Task::ContentGeneration | Task::QuizGeneration => Some(content.clone()),
                Task::Solving => Some(solver.clone()),
                Task::Grading => Some(grader.clone()),
                Task::Analytics => Some(analyst.clone()),
                Task::QualityCheck => None,
            };
            if let Some(specialist) = specialist {
                registry = registry.with(task, specialist);
            }
        }
        registry
    }

    pub fn with(mut self, task: Task, specialist: Arc<dyn Specialist>) -> Self {
        self.bindings.insert(task, specialist);
        self
    }

    pub fn get(&self, task: Task) -> Option<&dyn Specialist> {
        self.bindings.get(&task).map(|s| s.as_ref())
    }
}

/// Planning and regeneration decisions, plus plan execution.
#[async_trait]
pub trait Coordinator: Send + Sync {
    async fn plan_execution(&self, state: &AgentState) -> AgentResult<Vec<Task>>;

    async fn execute_plan(&self, state: &mut AgentState, plan: &[Task]);

    async fn should_regenerate(&self, state: &AgentState, max_attempts: u32) -> AgentResult<bool>;
}

pub struct Supervisor {
    gateway: Arc<dyn LlmGateway>,
    registry: SpecialistRegistry,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    pub const AGENT_NAME: &'static str = "supervisor";

    pub fn new(gateway: Arc<dyn LlmGateway>, registry: SpecialistRegistry) -> Self {
        Self { gateway, registry }
    }

    pub fn registry(&self) -> &SpecialistRegistry {
        &self.registry
    }
}

#[async_trait]
impl Coordinator for Supervisor {
    async fn plan_execution(&self, state: &AgentState) -> AgentResult<Vec<Task>> {
        let ctx = &state.context;
        let prompt = build_planning_prompt(&PlanningContext {
            query: &ctx.topic_query,
            subject: ctx.subject.as_str(),
            grade: ctx.grade,
            has_student_answers: state.has_student_answers(),
            current_step: state.step_logs.len(),
        });

        let completion = self
            .gateway
            .complete(
                vec![Message::system(SUPERVISOR_SYSTEM_PROMPT), Message::user(prompt)],
                "supervisor_planning",
                state.tenant_id(),
                CompletionOptions::new(0.3, 500),
            )
            .await?;

        let plan = parse_plan(&completion.content);
        tracing::info!(
            request_id = %ctx.request_id,
            plan = ?plan.iter().map(Task::as_str).collect::<Vec<_>>(),
            "Execution plan created"
        );
        Ok(plan)
    }

    async fn execute_plan(&self, state: &mut AgentState, plan: &[Task]) {
        for &task in plan {
            match self.registry.get(task) {
                Some(specialist) => {
                    invoke_specialist(task, specialist, state).await;
                }
                None => {
                    tracing::error!(
                        request_id = %state.context.request_id,
                        task = %task,
                        "No specialist bound to task, skipping"
                    );
                }
            }
        }
    }

    async fn should_regenerate(&self, state: &AgentState, max_attempts: u32) -> AgentResult<bool> {
        if state.feedback.valid {
            return Ok(false);
        }

        let feedback = serde_json::to_string_pretty(&state.feedback)?;
        let completion = self
            .gateway
            .complete(
                vec![
                    Message::system(REGENERATION_SYSTEM_PROMPT),
                    Message::user(build_regeneration_prompt(
                        &feedback,
                        state.regeneration_count,
                        max_attempts,
                    )),
                ],
                "supervisor_decision",
                state.tenant_id(),
                CompletionOptions::new(0.1, 10),
            )
            .await?;

        let decision = is_affirmative(&completion.content);
        tracing::info!(
            request_id = %state.context.request_id,
            attempt = state.regeneration_count,
            reply = %completion.content.trim(),
            regenerate = decision,
            "Regeneration decision"
        );
        Ok(decision)
    }
}

/// True only for an explicit "yes" (`ТАК` or `YES`, any case).
pub fn is_affirmative(reply: &str) -> bool {
    let upper = reply.to_uppercase();
    upper.contains("ТАК") || upper.contains("YES")
}
