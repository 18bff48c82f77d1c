//! Spend tracking for gateway calls.
//!
//! Costs are accumulated per tenant (class) and per model in micro-dollars so
//! that the sub-cent price of a single short call is not truncated away.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

const MICROS_PER_CENT: f64 = 10_000.0;

/// Price of a model in dollars per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_1m: f64,
    pub output_per_1m: f64,
}

impl ModelPricing {
    pub const FREE: ModelPricing = ModelPricing {
        input_per_1m: 0.0,
        output_per_1m: 0.0,
    };

    pub fn new(input_per_1m: f64, output_per_1m: f64) -> Self {
        Self {
            input_per_1m,
            output_per_1m,
        }
    }

    /// Cost of a call in cents.
    pub fn cost_cents(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        let dollars = (input_tokens as f64 / 1_000_000.0) * self.input_per_1m
            + (output_tokens as f64 / 1_000_000.0) * self.output_per_1m;
        dollars * 100.0
    }
}

/// One priced gateway call.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub tenant_id: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_cents: f64,
}

/// Snapshot of accumulated spend.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CostReport {
    pub total_cents: f64,
    pub by_tenant: HashMap<String, f64>,
    pub by_model: HashMap<String, f64>,
    pub calls: usize,
}

/// Thread-safe accumulator shared by every request through the gateway.
#[derive(Debug, Default)]
pub struct CostTracker {
    total_micros: AtomicU64,
    by_tenant: RwLock<HashMap<String, u64>>,
    by_model: RwLock<HashMap<String, u64>>,
    history: RwLock<Vec<UsageRecord>>,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call and return its cost in cents.
    pub fn record(
        &self,
        tenant_id: &str,
        model: &str,
        input_tokens: u32,
        output_tokens: u32,
        pricing: ModelPricing,
    ) -> f64 {
        let cost_cents = pricing.cost_cents(input_tokens, output_tokens);
        let micros = cents_to_micros(cost_cents);

        self.total_micros.fetch_add(micros, Ordering::SeqCst);
        {
            let mut by_tenant = self.by_tenant.write().unwrap_or_else(|e| e.into_inner());
            *by_tenant.entry(tenant_id.to_string()).or_insert(0) += micros;
        }
        {
            let mut by_model = self.by_model.write().unwrap_or_else(|e| e.into_inner());
            *by_model.entry(model.to_string()).or_insert(0) += micros;
        }
        {
            let mut history = self.history.write().unwrap_or_else(|e| e.into_inner());
            history.push(UsageRecord {
                timestamp: Utc::now(),
                tenant_id: tenant_id.to_string(),
                model: model.to_string(),
                input_tokens,
                output_tokens,
                cost_cents,
            });
        }

        tracing::debug!(
            tenant = tenant_id,
            model = model,
            input_tokens = input_tokens,
            output_tokens = output_tokens,
            cost_cents = cost_cents,
            "Recorded LLM usage"
        );

        cost_cents
    }

    pub fn total_cents(&self) -> f64 {
        micros_to_cents(self.total_micros.load(Ordering::SeqCst))
    }

    pub fn tenant_cents(&self, tenant_id: &str) -> f64 {
        let by_tenant = self.by_tenant.read().unwrap_or_else(|e| e.into_inner());
        by_tenant.get(tenant_id).copied().map(micros_to_cents).unwrap_or(0.0)
    }

    pub fn usage_count(&self) -> usize {
        self.history.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn report(&self) -> CostReport {
        let by_tenant = self
            .by_tenant
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(k, v)| (k.clone(), micros_to_cents(*v)))
            .collect();
        let by_model = self
            .by_model
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(k, v)| (k.clone(), micros_to_cents(*v)))
            .collect();

        CostReport {
            total_cents: self.total_cents(),
            by_tenant,
            by_model,
            calls: self.usage_count(),
        }
    }
}

fn cents_to_micros(cents: f64) -> u64 {
    (cents * MICROS_PER_CENT).round().max(0.0) as u64
}

fn micros_to_cents(micros: u64) -> f64 {
    micros as f64 / MICROS_PER_CENT
}
