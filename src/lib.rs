//! vyvchai: multi-agent AI tutoring backend.
//!
//! A supervisor plans work for specialist agents (lesson and quiz content,
//! step-by-step solving, grading, student analytics), a quality validator
//! reviews the result, and the orchestrator regenerates rejected content
//! within a bounded number of attempts. All model access goes through a
//! task-routed LLM gateway with response caching, cost tracking and
//! backend fallback.

pub mod agents;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod prompts;
pub mod retrieval;
pub mod utils;

// Re-export commonly used types
pub use agents::{AgentError, AgentState, MultiAgentOrchestrator, OrchestratorConfig, TutorRequest};
pub use config::{ConfigError, TutorConfig};
pub use error::LlmError;
pub use llm::{CacheError, LlmGateway, RoutedGateway};
pub use retrieval::RetrievalError;
