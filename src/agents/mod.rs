//! Tutoring agents: the supervisor, its specialists, the QA validator and
//! the orchestrator that drives them over one request's state.

pub mod analyst;
pub mod content;
pub mod error;
pub mod grader;
pub mod orchestrator;
pub mod quality;
pub mod solver;
pub mod specialist;
pub mod state;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_support;

pub use analyst::AnalystSpecialist;
pub use content::{parse_quiz, ContentSpecialist, ContentSpecialistConfig, DEFAULT_MAX_QUIZ_QUESTIONS};
pub use error::{AgentError, AgentResult};
pub use grader::{extract_score, GraderSpecialist, NEUTRAL_SCORE, PASSING_SCORE};
pub use orchestrator::{
    MultiAgentOrchestrator, OrchestratorConfig, DEFAULT_MAX_REGENERATION_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_RETRIEVAL_LIMIT,
};
pub use quality::{scan_review, QaValidator, QualityValidator, ReviewVerdict};
pub use solver::{is_problem, SolverSpecialist};
pub use specialist::{invoke_specialist, Specialist};
pub use state::{
    AgentState, Feedback, Grade, GradingRecord, GradingResult, QuestionType, QuizQuestion, Recommendations,
    RequestContext, SolvedProblem, StudentAnalysis, Subject, TutorRequest,
};
pub use supervisor::{default_plan, is_affirmative, parse_plan, Coordinator, SpecialistRegistry, Supervisor, Task};
