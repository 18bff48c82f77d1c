//! Prometheus metrics registration and export.

use prometheus::{CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all vyvchai metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Gateway calls, labeled by provider, model, purpose (task type) and status.
pub static LLM_CALLS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Gateway call latency in seconds, labeled by provider.
pub static LLM_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Tokens used, labeled by model and type (input/output).
pub static LLM_TOKENS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Spend in cents, labeled by provider and model.
pub static LLM_COST_CENTS: OnceLock<CounterVec> = OnceLock::new();

/// Tutoring requests, labeled by subject and status (passed/failed/error).
pub static REQUESTS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Regeneration cycles consumed per request.
pub static REGENERATIONS: OnceLock<Histogram> = OnceLock::new();

/// Errors recorded in request state, labeled by subject.
pub static REQUEST_ERRORS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Request processing time in seconds, labeled by subject.
pub static REQUEST_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize all metrics and register them with the global registry.
///
/// Safe to call more than once; later calls leave the first registry in place.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric construction or registration fails.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let registry = Registry::new();

    let llm_calls_total = CounterVec::new(
        Opts::new("vyvchai_llm_calls_total", "Total gateway calls"),
        &["provider", "model", "purpose", "status"],
    )?;

    let llm_latency = HistogramVec::new(
        HistogramOpts::new("vyvchai_llm_latency_seconds", "Gateway call latency in seconds")
            .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["provider"],
    )?;

    let llm_tokens_total = CounterVec::new(
        Opts::new("vyvchai_llm_tokens_total", "Total tokens used"),
        &["model", "type"],
    )?;

    let llm_cost_cents = CounterVec::new(
        Opts::new("vyvchai_llm_cost_cents", "LLM spend in cents"),
        &["provider", "model"],
    )?;

    let requests_total = CounterVec::new(
        Opts::new("vyvchai_requests_total", "Total tutoring requests processed"),
        &["subject", "status"],
    )?;

    let regenerations = Histogram::with_opts(
        HistogramOpts::new(
            "vyvchai_regenerations",
            "Regeneration cycles consumed per request",
        )
        .buckets(vec![0.0, 1.0, 2.0, 3.0, 5.0, 10.0]),
    )?;

    let request_errors_total = CounterVec::new(
        Opts::new("vyvchai_request_errors_total", "Errors recorded during request processing"),
        &["subject"],
    )?;

    let request_duration = HistogramVec::new(
        HistogramOpts::new(
            "vyvchai_request_duration_seconds",
            "Request processing time in seconds",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]),
        &["subject"],
    )?;

    registry.register(Box::new(llm_calls_total.clone()))?;
    registry.register(Box::new(llm_latency.clone()))?;
    registry.register(Box::new(llm_tokens_total.clone()))?;
    registry.register(Box::new(llm_cost_cents.clone()))?;
    registry.register(Box::new(requests_total.clone()))?;
    registry.register(Box::new(regenerations.clone()))?;
    registry.register(Box::new(request_errors_total.clone()))?;
    registry.register(Box::new(request_duration.clone()))?;

    // Already-set statics mean a previous call won; keep it.
    let _ = REGISTRY.set(registry);
    let _ = LLM_CALLS_TOTAL.set(llm_calls_total);
    let _ = LLM_LATENCY.set(llm_latency);
    let _ = LLM_TOKENS_TOTAL.set(llm_tokens_total);
    let _ = LLM_COST_CENTS.set(llm_cost_cents);
    let _ = REQUESTS_TOTAL.set(requests_total);
    let _ = REGENERATIONS.set(regenerations);
    let _ = REQUEST_ERRORS_TOTAL.set(request_errors_total);
    let _ = REQUEST_DURATION.set(request_duration);

    tracing::info!("Prometheus metrics initialized successfully");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
