//! Thin wrapper around a Prometheus registry owned by the process.

use prometheus::{core::Collector, proto::MetricFamily, Encoder, Registry, TextEncoder};

use crate::types::{MetricError, MetricResult};

/// Metrics registry shared between the agent and the metrics endpoint
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    registry: Registry,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a reference to the underlying Prometheus registry
    pub fn inner(&self) -> &Registry {
        &self.registry
    }

    /// Register a metric collector
    pub fn register_collector(&self, collector: Box<dyn Collector>) -> MetricResult<()> {
        self.registry
            .register(collector)
            .map_err(|e| MetricError::RegistrationFailed(e.to_string()))
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Encode metrics in Prometheus text format
    pub fn encode_to_string(&self) -> MetricResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.gather();

        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricError::EncodingFailed(e.to_string()))?;

        String::from_utf8(buffer).map_err(|e| MetricError::EncodingFailed(e.to_string()))
    }
}
