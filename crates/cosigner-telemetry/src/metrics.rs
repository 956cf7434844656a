//! Counters and gauges for the poll loop and the co-signing state machine.

use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts};

use crate::{registry::MetricsRegistry, types::MetricResult};

/// Remote operations tracked by `cosigner_remote_errors_total`
pub mod operation {
    pub const LIST_OUTPUTS: &str = "list_outputs";
    pub const OPEN_SESSION: &str = "open_session";
    pub const ADD_SIGNATURE: &str = "add_signature";
    pub const BROADCAST: &str = "broadcast";
}

/// Metrics handle passed to the engine
#[derive(Clone)]
pub struct CosignerMetrics {
    pub outputs_fetched: IntCounter,
    pub outputs_skipped: IntCounter,
    pub signatures_added: IntCounter,
    pub broadcasts: IntCounter,
    pub remote_errors: IntCounterVec,
    pub batches_aborted: IntCounter,
    /// Unix seconds of the poll cursor
    pub poll_cursor_seconds: IntGauge,
}

impl CosignerMetrics {
    /// Create the metrics and register them on `registry`
    pub fn register(registry: &MetricsRegistry) -> MetricResult<Self> {
        let metrics = Self::unregistered()?;

        registry.register_collector(Box::new(metrics.outputs_fetched.clone()))?;
        registry.register_collector(Box::new(metrics.outputs_skipped.clone()))?;
        registry.register_collector(Box::new(metrics.signatures_added.clone()))?;
        registry.register_collector(Box::new(metrics.broadcasts.clone()))?;
        registry.register_collector(Box::new(metrics.remote_errors.clone()))?;
        registry.register_collector(Box::new(metrics.batches_aborted.clone()))?;
        registry.register_collector(Box::new(metrics.poll_cursor_seconds.clone()))?;

        Ok(metrics)
    }

    /// Metrics that are counted but never exported
    pub fn unregistered() -> MetricResult<Self> {
        Ok(Self {
            outputs_fetched: IntCounter::new(
                "cosigner_outputs_fetched_total",
                "Candidate outputs returned by the custody service",
            )?,
            outputs_skipped: IntCounter::new(
                "cosigner_outputs_skipped_total",
                "Outputs skipped because they were not in signed state",
            )?,
            signatures_added: IntCounter::new(
                "cosigner_signatures_added_total",
                "Signatures this agent added to multisig requests",
            )?,
            broadcasts: IntCounter::new(
                "cosigner_broadcasts_total",
                "Fully signed transactions submitted to the network",
            )?,
            remote_errors: IntCounterVec::new(
                Opts::new(
                    "cosigner_remote_errors_total",
                    "Failed calls to the custody service",
                ),
                &["operation"],
            )?,
            batches_aborted: IntCounter::new(
                "cosigner_batches_aborted_total",
                "Batches abandoned after a per-output failure",
            )?,
            poll_cursor_seconds: IntGauge::new(
                "cosigner_poll_cursor_seconds",
                "Update time of the last examined output, unix seconds",
            )?,
        })
    }

    pub fn remote_error(&self, operation: &str) {
        self.remote_errors.with_label_values(&[operation]).inc();
    }
}
