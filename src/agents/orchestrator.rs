//! Multi-agent orchestrator for tutoring requests.
//!
//! One request runs as a single sequential pipeline over an owned
//! [`AgentState`]:
//!
//! 1. **Retrieve**: fetch grounding documents for the topic
//! 2. **Plan**: ask the supervisor which specialists to run
//! 3. **Execute**: run the plan; specialist failures are recorded, not fatal
//! 4. **Validate**: review the content with the QA validator
//! 5. **Regenerate**: while invalid and under the attempt cap, ask the
//!    supervisor whether to try again, then re-plan, re-execute, re-validate
//!
//! Planning, validation and decision errors abort the pipeline; the
//! partial state is still returned with the error recorded. The whole
//! pipeline runs under a request deadline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::content::{ContentSpecialistConfig, DEFAULT_MAX_QUIZ_QUESTIONS};
use super::error::AgentResult;
use super::quality::{QaValidator, QualityValidator};
use super::state::{AgentState, TutorRequest};
use super::supervisor::{Coordinator, SpecialistRegistry, Supervisor};
use crate::llm::LlmGateway;
use crate::metrics::{NoopTelemetry, RequestOutcome, TelemetrySink};
use crate::retrieval::{ContextRetriever, RetrievalFilter};

/// Default number of regeneration rounds.
pub const DEFAULT_MAX_REGENERATION_ATTEMPTS: u32 = 3;

/// Default number of grounding documents retrieved per request.
pub const DEFAULT_RETRIEVAL_LIMIT: usize = 5;

/// Default request deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_regeneration_attempts: u32,
    pub retrieval_limit: usize,
    pub request_timeout: Duration,
    pub max_quiz_questions: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_regeneration_attempts: DEFAULT_MAX_REGENERATION_ATTEMPTS,
            retrieval_limit: DEFAULT_RETRIEVAL_LIMIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_quiz_questions: DEFAULT_MAX_QUIZ_QUESTIONS,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_max_regeneration_attempts(mut self, attempts: u32) -> Self {
        self.max_regeneration_attempts = attempts;
        self
    }

    pub fn with_retrieval_limit(mut self, limit: usize) -> Self {
        self.retrieval_limit = limit;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_quiz_questions(mut self, max: usize) -> Self {
        self.max_quiz_questions = max;
        self
    }
}

pub struct MultiAgentOrchestrator {
    coordinator: Arc<dyn Coordinator>,
    validator: Arc<dyn QualityValidator>,
    retriever: Arc<dyn ContextRetriever>,
    telemetry: Arc<dyn TelemetrySink>,
    config: OrchestratorConfig,
}

impl std::fmt::Debug for MultiAgentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiAgentOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MultiAgentOrchestrator {
    /// Orchestrator with the standard supervisor, specialists and QA
    /// validator, all sharing `gateway`.
    pub fn new(
        gateway: Arc<dyn LlmGateway>,
        retriever: Arc<dyn ContextRetriever>,
        config: OrchestratorConfig,
    ) -> Self {
        let registry = SpecialistRegistry::standard(
            gateway.clone(),
            ContentSpecialistConfig::default().with_max_quiz_questions(config.max_quiz_questions),
        );
        Self {
            coordinator: Arc::new(Supervisor::new(gateway.clone(), registry)),
            validator: Arc::new(QaValidator::new(gateway)),
            retriever,
            telemetry: Arc::new(NoopTelemetry),
            config,
        }
    }

    pub fn with_coordinator(mut self, coordinator: Arc<dyn Coordinator>) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn QualityValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Validate a request, then process it.
    pub async fn process_request(&self, request: TutorRequest) -> AgentResult<AgentState> {
        let state = AgentState::from_request(request)?;
        Ok(self.process(state).await)
    }

    /// Run the full pipeline. Never fails: errors and timeouts are recorded
    /// in `state.errors` and the partial state is returned.
    pub async fn process(&self, mut state: AgentState) -> AgentState {
        let started = Instant::now();
        let timeout = self.config.request_timeout;
        tracing::info!(
            request_id = %state.context.request_id,
            subject = %state.context.subject,
            grade = state.context.grade,
            "Processing request"
        );

        let outcome = tokio::time::timeout(timeout, self.run_pipeline(&mut state)).await;
        match outcome {
            Ok(Ok(())) => {
                tracing::info!(
                    request_id = %state.context.request_id,
                    valid = state.validation_passed,
                    regenerations = state.regeneration_count,
                    "Request processing completed"
                );
            }
            Ok(Err(e)) => state.record_error(format!("Processing failed: {}", e)),
            Err(_) => state.record_error(format!("Processing timed out after {}s", timeout.as_secs())),
        }

        self.telemetry.record_request(&RequestOutcome {
            request_id: state.context.request_id.clone(),
            subject: state.context.subject.as_str().to_string(),
            validation_passed: state.validation_passed,
            regeneration_count: state.regeneration_count,
            error_count: state.errors.len(),
            duration_secs: started.elapsed().as_secs_f64(),
        });
        state
    }

    async fn run_pipeline(&self, state: &mut AgentState) -> AgentResult<()> {
        self.retrieve_context(state).await;

        let plan = self.coordinator.plan_execution(state).await?;
        self.coordinator.execute_plan(state, &plan).await;
        state.feedback = self.validator.validate(state).await?;

        let max_attempts = self.config.max_regeneration_attempts;
        while !state.feedback.valid && state.regeneration_count < max_attempts {
            state.regeneration_count += 1;
            tracing::info!(
                request_id = %state.context.request_id,
                attempt = state.regeneration_count,
                issues = ?state.feedback.issues,
                "Regenerating content"
            );

            if !self.coordinator.should_regenerate(state, max_attempts).await? {
                break;
            }

            let plan = self.coordinator.plan_execution(state).await?;
            self.coordinator.execute_plan(state, &plan).await;
            state.feedback = self.validator.validate(state).await?;
        }

        state.validation_passed = state.feedback.valid;
        Ok(())
    }

    async fn retrieve_context(&self, state: &mut AgentState) {
        let ctx = &state.context;
        let mut filter = RetrievalFilter::new(ctx.subject, ctx.grade);
        if !state.matched_topics.is_empty() {
            filter = filter.with_topics(state.matched_topics.clone());
        }

        let docs = self
            .retriever
            .retrieve(&ctx.topic_query, &filter, self.config.retrieval_limit)
            .await;
        tracing::info!(count = docs.len(), "Context retrieved");
        state.log_step(format!("Retrieved {} documents", docs.len()));
        state.retrieved_docs = docs;
    }
}
