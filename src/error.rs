//! Error types shared across vyvchai subsystems.
//!
//! Agent-level failures live in [`crate::agents::error`]; this module holds the
//! errors raised at the LLM gateway boundary, which every other layer wraps.

use thiserror::Error;

/// Errors that can occur during LLM operations.
///
/// The gateway surfaces exactly one of these after its own retries and
/// backend fallback have been exhausted.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key for backend '{0}'")]
    MissingApiKey(String),

    #[error("Missing API base URL for backend '{0}'")]
    MissingApiBase(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("No backend configured for '{0}'")]
    BackendUnavailable(String),

    #[error("Empty completion from model '{0}'")]
    EmptyCompletion(String),
}

impl LlmError {
    /// Whether the failure is worth retrying against the same backend.
    ///
    /// Connection problems, timeouts, rate limits, 5xx responses and
    /// malformed or empty bodies are transient; 4xx errors and missing
    /// configuration are not.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::RequestFailed(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("timeout")
                    || msg.contains("timed out")
                    || msg.contains("connection")
                    || msg.contains("temporarily")
                    || msg.contains("connect")
            }
            LlmError::RateLimited(_) | LlmError::ParseError(_) | LlmError::EmptyCompletion(_) => true,
            LlmError::ApiError { code, .. } => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}
