//! Task-routed gateway over the local and cloud chat backends.
//!
//! Every agent talks to the model through [`LlmGateway`]. The production
//! implementation, [`RoutedGateway`], picks a backend from a static
//! task-type table (or an explicit override), consults the response cache,
//! prices the call, emits one telemetry event per backend call and, when
//! enabled, retries exactly once on the alternate backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use super::cache::ResponseCache;
use super::cost::{CostTracker, ModelPricing};
use super::types::{GenerationRequest, LlmProvider, Message};
use crate::error::LlmError;
use crate::metrics::{LlmCallEvent, NoopTelemetry, TelemetrySink};

/// Which side of the gateway served a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Self-hosted model server.
    Local,
    /// Commercial cloud provider.
    Cloud,
}

impl Backend {
    pub fn alternate(self) -> Backend {
        match self {
            Backend::Local => Backend::Cloud,
            Backend::Cloud => Backend::Local,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Local => "local",
            Backend::Cloud => "cloud",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "lapa" => Ok(Backend::Local),
            "cloud" | "openai" => Ok(Backend::Cloud),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

/// Token counts for one completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// Result of a gateway call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    pub usage: TokenUsage,
    pub finish_reason: String,
    pub model: String,
    pub backend: Backend,
    /// True when served from the response cache.
    #[serde(default)]
    pub cached: bool,
}

/// Sampling parameters and optional backend override for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f64,
    pub max_tokens: u32,
    pub provider: Option<Backend>,
}

impl CompletionOptions {
    pub fn new(temperature: f64, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
            provider: None,
        }
    }

    /// Force a backend regardless of the routing table.
    pub fn with_provider(mut self, provider: Backend) -> Self {
        self.provider = Some(provider);
        self
    }
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self::new(0.7, 1024)
    }
}

/// The single entry point agents use to reach a model.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Complete a chat.
    ///
    /// `task_type` drives routing and telemetry; `tenant_id` attributes spend.
    async fn complete(
        &self,
        messages: Vec<Message>,
        task_type: &str,
        tenant_id: &str,
        options: CompletionOptions,
    ) -> Result<Completion, LlmError>;
}

/// A configured backend and its price.
#[derive(Clone)]
pub struct BackendSlot {
    provider: Arc<dyn LlmProvider>,
    pricing: ModelPricing,
}

impl BackendSlot {
    pub fn new(provider: Arc<dyn LlmProvider>, pricing: ModelPricing) -> Self {
        Self { provider, pricing }
    }
}

/// Default routing table: quality checks go to the cloud, everything else
/// stays on the local model.
pub fn default_routes() -> HashMap<String, Backend> {
    [
        ("topic_routing", Backend::Local),
        ("content_generation", Backend::Local),
        ("quiz_generation", Backend::Local),
        ("solver_algebra", Backend::Local),
        ("solver_general", Backend::Local),
        ("grading", Backend::Local),
        ("analytics", Backend::Local),
        ("recommendation", Backend::Local),
        ("supervisor_planning", Backend::Local),
        ("supervisor_decision", Backend::Local),
        ("quality_check", Backend::Cloud),
    ]
    .into_iter()
    .map(|(task, backend)| (task.to_string(), backend))
    .collect()
}

/// Production gateway with routing, caching, cost tracking and fallback.
pub struct RoutedGateway {
    local: Option<BackendSlot>,
    cloud: Option<BackendSlot>,
    routes: HashMap<String, Backend>,
    default_backend: Backend,
    fallback_to_alternate: bool,
    cache: Option<ResponseCache>,
    cost_tracker: Arc<CostTracker>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl Default for RoutedGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutedGateway {
    /// Create a gateway with no backends, the default routing table and
    /// fallback disabled.
    pub fn new() -> Self {
        Self {
            local: None,
            cloud: None,
            routes: default_routes(),
            default_backend: Backend::Local,
            fallback_to_alternate: false,
            cache: None,
            cost_tracker: Arc::new(CostTracker::new()),
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    pub fn with_local(mut self, provider: Arc<dyn LlmProvider>, pricing: ModelPricing) -> Self {
        self.local = Some(BackendSlot::new(provider, pricing));
        self
    }

    pub fn with_cloud(mut self, provider: Arc<dyn LlmProvider>, pricing: ModelPricing) -> Self {
        self.cloud = Some(BackendSlot::new(provider, pricing));
        self
    }

    pub fn with_route(mut self, task_type: impl Into<String>, backend: Backend) -> Self {
        self.routes.insert(task_type.into(), backend);
        self
    }

    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_to_alternate = enabled;
        self
    }

    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cost_tracker(mut self, cost_tracker: Arc<CostTracker>) -> Self {
        self.cost_tracker = cost_tracker;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn cost_tracker(&self) -> &Arc<CostTracker> {
        &self.cost_tracker
    }

    /// Backend a call would be sent to first.
    pub fn route_for(&self, task_type: &str, provider: Option<Backend>) -> Backend {
        provider.unwrap_or_else(|| {
            self.routes
                .get(task_type)
                .copied()
                .unwrap_or(self.default_backend)
        })
    }

    fn slot(&self, backend: Backend) -> Option<&BackendSlot> {
        match backend {
            Backend::Local => self.local.as_ref(),
            Backend::Cloud => self.cloud.as_ref(),
        }
    }

    async fn call_backend(
        &self,
        backend: Backend,
        messages: &[Message],
        task_type: &str,
        tenant_id: &str,
        options: &CompletionOptions,
    ) -> Result<Completion, LlmError> {
        let slot = self
            .slot(backend)
            .ok_or_else(|| LlmError::BackendUnavailable(backend.to_string()))?;
        let model = slot.provider.default_model().to_string();

        let cache_key = self
            .cache
            .as_ref()
            .map(|_| ResponseCache::cache_key(messages, &model, options.temperature));

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(mut hit) = cache.get::<Completion>(key).await {
                hit.cached = true;
                self.emit(backend, &hit.model, task_type, tenant_id, hit.usage, "cache_hit", 0.0, 0.0);
                return Ok(hit);
            }
        }

        let request = GenerationRequest::new(model.clone(), messages.to_vec())
            .with_temperature(options.temperature)
            .with_max_tokens(options.max_tokens);

        let started = Instant::now();
        let result = slot.provider.generate(request).await;
        let latency = started.elapsed().as_secs_f64();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.emit(backend, &model, task_type, tenant_id, TokenUsage::default(), "error", 0.0, latency);
                return Err(e);
            }
        };

        let Some(content) = response.first_content().map(str::to_string) else {
            self.emit(backend, &model, task_type, tenant_id, TokenUsage::default(), "error", 0.0, latency);
            return Err(LlmError::EmptyCompletion(model));
        };

        let served_model = if response.model.is_empty() {
            model
        } else {
            response.model.clone()
        };
        let usage = TokenUsage {
            input_tokens: response.usage.prompt_tokens,
            output_tokens: response.usage.completion_tokens,
            total_tokens: response.usage.total_tokens,
        };
        let cost_cents = self.cost_tracker.record(
            tenant_id,
            &served_model,
            usage.input_tokens,
            usage.output_tokens,
            slot.pricing,
        );

        self.emit(backend, &served_model, task_type, tenant_id, usage, "success", cost_cents, latency);

        let completion = Completion {
            content,
            usage,
            finish_reason: response
                .first_finish_reason()
                .unwrap_or("stop")
                .to_string(),
            model: served_model,
            backend,
            cached: false,
        };

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            cache.set(key, &completion).await;
        }

        Ok(completion)
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        backend: Backend,
        model: &str,
        task_type: &str,
        tenant_id: &str,
        usage: TokenUsage,
        status: &str,
        cost_cents: f64,
        latency_secs: f64,
    ) {
        self.telemetry.record_llm_call(&LlmCallEvent {
            provider: backend.to_string(),
            model: model.to_string(),
            purpose: task_type.to_string(),
            tenant: tenant_id.to_string(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            status: status.to_string(),
            cost_cents,
            latency_secs,
        });
    }
}

#[async_trait]
impl LlmGateway for RoutedGateway {
    async fn complete(
        &self,
        messages: Vec<Message>,
        task_type: &str,
        tenant_id: &str,
        options: CompletionOptions,
    ) -> Result<Completion, LlmError> {
        let backend = self.route_for(task_type, options.provider);

        tracing::debug!(
            task_type = task_type,
            tenant = tenant_id,
            backend = %backend,
            temperature = options.temperature,
            max_tokens = options.max_tokens,
            "Routing LLM call"
        );

        match self
            .call_backend(backend, &messages, task_type, tenant_id, &options)
            .await
        {
            Ok(completion) => Ok(completion),
            Err(e) if self.fallback_to_alternate && self.slot(backend.alternate()).is_some() => {
                let alternate = backend.alternate();
                tracing::warn!(
                    task_type = task_type,
                    backend = %backend,
                    fallback = %alternate,
                    error = %e,
                    "Backend failed, falling back to alternate"
                );
                self.call_backend(alternate, &messages, task_type, tenant_id, &options)
                    .await
            }
            Err(e) => {
                tracing::error!(
                    task_type = task_type,
                    backend = %backend,
                    error = %e,
                    "LLM call failed"
                );
                Err(e)
            }
        }
    }
}

impl fmt::Debug for RoutedGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutedGateway")
            .field("has_local", &self.local.is_some())
            .field("has_cloud", &self.cloud.is_some())
            .field("fallback_to_alternate", &self.fallback_to_alternate)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
