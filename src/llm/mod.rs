//! LLM access for vyvchai.
//!
//! Agents never call a model directly; they go through [`LlmGateway`].
//!
//! ```ignore
//! use vyvchai::llm::{CompletionOptions, LlmGateway, Message, ModelPricing, OpenAiCompatibleClient, RoutedGateway};
//! use std::sync::Arc;
//!
//! let local = Arc::new(OpenAiCompatibleClient::new("http://localhost:8000/v1", None, "lapa-v0.1.2")?);
//! let gateway = RoutedGateway::new().with_local(local, ModelPricing::FREE);
//!
//! let completion = gateway
//!     .complete(vec![Message::user("Привіт")], "content_generation", "class-1", CompletionOptions::new(0.7, 256))
//!     .await?;
//! ```
//!
//! # Response caching
//!
//! Identical requests are served from a [`ResponseCache`] backed by Redis or
//! process memory. Cache problems degrade to misses and never fail a call.
//!
//! # Cost tracking
//!
//! [`CostTracker`] accumulates spend per tenant and per model from each
//! backend's [`ModelPricing`].

pub mod cache;
pub mod cost;
pub mod gateway;
pub mod providers;
pub mod types;

pub use cache::{
    CacheBackend, CacheError, InMemoryCacheBackend, RedisCacheBackend, ResponseCache,
    CACHE_KEY_PREFIX,
};
pub use cost::{CostReport, CostTracker, ModelPricing, UsageRecord};
pub use gateway::{
    default_routes, Backend, BackendSlot, Completion, CompletionOptions, LlmGateway,
    RoutedGateway, TokenUsage,
};
pub use providers::OpenAiCompatibleClient;
pub use types::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};
