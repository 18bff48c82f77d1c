//! Telemetry seam between the core and whatever records it.
//!
//! Recording is synchronous and infallible: a sink must never slow down or
//! fail the request that emits the event.

use serde::Serialize;

/// Outcome of one backend call made by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmCallEvent {
    /// "local" or "cloud".
    pub provider: String,
    pub model: String,
    /// Task type the call was made for (e.g. "content_generation").
    pub purpose: String,
    pub tenant: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// "success", "error" or "cache_hit".
    pub status: String,
    pub cost_cents: f64,
    pub latency_secs: f64,
}

/// Summary of one processed tutoring request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestOutcome {
    pub request_id: String,
    pub subject: String,
    pub validation_passed: bool,
    pub regeneration_count: u32,
    pub error_count: usize,
    pub duration_secs: f64,
}

impl RequestOutcome {
    pub fn status(&self) -> &'static str {
        if self.validation_passed {
            "passed"
        } else if self.error_count > 0 {
            "error"
        } else {
            "failed"
        }
    }
}

/// Receiver of telemetry events.
pub trait TelemetrySink: Send + Sync {
    fn record_llm_call(&self, event: &LlmCallEvent);

    fn record_request(&self, outcome: &RequestOutcome);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn record_llm_call(&self, _event: &LlmCallEvent) {}

    fn record_request(&self, _outcome: &RequestOutcome) {}
}
