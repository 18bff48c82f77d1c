//! Prometheus-backed [`TelemetrySink`].
//!
//! `MetricsCollector` wraps the raw metric statics and keeps labeling
//! consistent. Recording before `init_metrics()` is a silent no-op.

use super::prometheus::{
    LLM_CALLS_TOTAL, LLM_COST_CENTS, LLM_LATENCY, LLM_TOKENS_TOTAL, REGENERATIONS,
    REQUESTS_TOTAL, REQUEST_DURATION, REQUEST_ERRORS_TOTAL,
};
use super::sink::{LlmCallEvent, RequestOutcome, TelemetrySink};

#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    /// Metrics must be initialized with `init_metrics()` for anything to be recorded.
    pub fn new() -> Self {
        Self
    }
}

impl TelemetrySink for MetricsCollector {
    fn record_llm_call(&self, event: &LlmCallEvent) {
        if let Some(calls) = LLM_CALLS_TOTAL.get() {
            calls
                .with_label_values(&[
                    event.provider.as_str(),
                    event.model.as_str(),
                    event.purpose.as_str(),
                    event.status.as_str(),
                ])
                .inc();
        }

        if let Some(latency) = LLM_LATENCY.get() {
            latency
                .with_label_values(&[event.provider.as_str()])
                .observe(event.latency_secs);
        }

        if let Some(tokens) = LLM_TOKENS_TOTAL.get() {
            tokens
                .with_label_values(&[event.model.as_str(), "input"])
                .inc_by(event.input_tokens as f64);
            tokens
                .with_label_values(&[event.model.as_str(), "output"])
                .inc_by(event.output_tokens as f64);
        }

        if event.cost_cents > 0.0 {
            if let Some(cost) = LLM_COST_CENTS.get() {
                cost.with_label_values(&[event.provider.as_str(), event.model.as_str()])
                    .inc_by(event.cost_cents);
            }
        }

        tracing::trace!(
            provider = %event.provider,
            model = %event.model,
            purpose = %event.purpose,
            status = %event.status,
            "Recorded LLM call metric"
        );
    }

    fn record_request(&self, outcome: &RequestOutcome) {
        let subject = outcome.subject.as_str();

        if let Some(requests) = REQUESTS_TOTAL.get() {
            requests.with_label_values(&[subject, outcome.status()]).inc();
        }

        if let Some(regenerations) = REGENERATIONS.get() {
            regenerations.observe(outcome.regeneration_count as f64);
        }

        if outcome.error_count > 0 {
            if let Some(errors) = REQUEST_ERRORS_TOTAL.get() {
                errors
                    .with_label_values(&[subject])
                    .inc_by(outcome.error_count as f64);
            }
        }

        if let Some(duration) = REQUEST_DURATION.get() {
            duration
                .with_label_values(&[subject])
                .observe(outcome.duration_secs);
        }

        tracing::trace!(
            request_id = %outcome.request_id,
            status = outcome.status(),
            regenerations = outcome.regeneration_count,
            "Recorded request metric"
        );
    }
}
