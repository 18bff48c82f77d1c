//! Telemetry for gateway calls and tutoring requests.
//!
//! The core only talks to the [`TelemetrySink`] trait. [`MetricsCollector`]
//! records into Prometheus; [`NoopTelemetry`] is used when metrics are off.
//!
//! # Example
//!
//! ```ignore
//! use vyvchai::metrics::{init_metrics, export_metrics, MetricsCollector};
//!
//! init_metrics()?;
//! let sink = Arc::new(MetricsCollector::new());
//! // ... hand `sink` to the gateway and orchestrator ...
//! println!("{}", export_metrics());
//! ```

pub mod collectors;
pub mod prometheus;
pub mod sink;

pub use collectors::MetricsCollector;
pub use prometheus::{export_metrics, init_metrics};
pub use sink::{LlmCallEvent, NoopTelemetry, RequestOutcome, TelemetrySink};
