//! Telemetry for the co-signing agent.
//!
//! Metrics live on an explicit [`MetricsRegistry`] handed to whoever needs
//! it; there is no process-wide registry.

pub mod http;
pub mod metrics;
pub mod registry;
pub mod types;

pub use http::{BoundMetricsServer, MetricsServer};
pub use metrics::{operation, CosignerMetrics};
pub use registry::MetricsRegistry;
pub use types::{MetricError, MetricResult};
