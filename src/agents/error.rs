//! Error types for the tutoring agents.

use thiserror::Error;

use crate::error::LlmError;

/// Errors that can occur during agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Gateway failure after retries and fallback.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Error parsing LLM response.
    #[error("Failed to parse LLM response: {0}")]
    ResponseParseError(String),

    /// The inbound request failed validation.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Timeout during agent operation.
    #[error("Agent operation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;
