//! Cursor-driven poll loop.
//!
//! Each tick fetches the group's outputs updated after the cursor, oldest
//! first, and drains them in order. The cursor moves to an output's update
//! time before the output is inspected, so an output that can never be
//! finished is not fetched again unless it changes.

use crate::{
    cosign::{CosignError, CosignOutcome, Cosigner},
    cursor::PollCursor,
};
use chrono::{DateTime, Utc};
use cosigner_client::{CandidateOutput, ClientError, CustodyClient, OutputQuery, UtxoState};
use cosigner_config::{GroupPolicy, PollConfig};
use cosigner_telemetry::{operation, CosignerMetrics};
use std::{future::Future, time::Duration};
use tracing::{debug, error, info, warn};

/// Static inputs of the poll loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub members: Vec<String>,
    pub threshold: u8,
    pub batch_limit: usize,
    pub interval: Duration,
}

impl PollerConfig {
    pub fn new(policy: &GroupPolicy, poll: &PollConfig) -> Self {
        Self {
            members: policy.members.clone(),
            threshold: policy.threshold,
            batch_limit: poll.batch_limit,
            interval: poll.interval(),
        }
    }
}

/// Result of inspecting one output
#[derive(Debug)]
pub enum OutputDisposition {
    /// Not in signed state
    Skipped,
    Handled(CosignOutcome),
    /// Abandon the rest of the batch
    Fatal(CosignError),
}

/// Summary of one drain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub fetched: usize,
    pub skipped: usize,
    pub handled: usize,
    pub aborted: bool,
    pub cursor: DateTime<Utc>,
}

pub struct Poller<C> {
    client: C,
    cosigner: Cosigner,
    config: PollerConfig,
    cursor: PollCursor,
    metrics: CosignerMetrics,
}

impl<C: CustodyClient> Poller<C> {
    pub fn new(
        client: C,
        cosigner: Cosigner,
        config: PollerConfig,
        cursor: PollCursor,
        metrics: CosignerMetrics,
    ) -> Self {
        metrics.poll_cursor_seconds.set(cursor.offset().timestamp());
        Self {
            client,
            cosigner,
            config,
            cursor,
            metrics,
        }
    }

    pub fn cursor(&self) -> DateTime<Utc> {
        self.cursor.offset()
    }

    /// Fetch one batch and drain it.
    ///
    /// A listing failure leaves the cursor where it was.
    pub async fn poll_once(&mut self) -> Result<BatchReport, ClientError> {
        let query = OutputQuery {
            members: self.config.members.clone(),
            threshold: self.config.threshold,
            offset: self.cursor.offset(),
            limit: self.config.batch_limit,
        };

        let outputs = match self.client.list_candidate_outputs(&query).await {
            Ok(outputs) => outputs,
            Err(e) => {
                self.metrics.remote_error(operation::LIST_OUTPUTS);
                warn!(offset = %query.offset, error = %e, "listing outputs failed");
                return Err(e);
            }
        };

        self.metrics.outputs_fetched.inc_by(outputs.len() as u64);
        debug!(offset = %query.offset, count = outputs.len(), "fetched outputs");

        let mut report = BatchReport {
            fetched: outputs.len(),
            skipped: 0,
            handled: 0,
            aborted: false,
            cursor: self.cursor.offset(),
        };

        for output in &outputs {
            match self.process(output).await {
                OutputDisposition::Skipped => report.skipped += 1,
                OutputDisposition::Handled(outcome) => {
                    report.handled += 1;
                    if outcome.signed {
                        self.metrics.signatures_added.inc();
                    }
                    if outcome.broadcast.is_some() {
                        self.metrics.broadcasts.inc();
                    }
                }
                OutputDisposition::Fatal(e) => {
                    self.metrics.remote_error(e.operation());
                    self.metrics.batches_aborted.inc();
                    error!(
                        utxo_id = %e.utxo_id(),
                        state = %output.state,
                        threshold = self.config.threshold,
                        sign_threshold = self.cosigner.sign_threshold(),
                        error = %e,
                        "abandoning batch"
                    );
                    report.aborted = true;
                    break;
                }
            }
        }

        report.cursor = self.cursor.offset();
        Ok(report)
    }

    async fn process(&mut self, output: &CandidateOutput) -> OutputDisposition {
        if self.cursor.advance(output.updated_at) {
            self.metrics
                .poll_cursor_seconds
                .set(self.cursor.offset().timestamp());
        }

        if output.state != UtxoState::Signed {
            self.metrics.outputs_skipped.inc();
            debug!(utxo_id = %output.utxo_id, state = %output.state, "skipping output");
            return OutputDisposition::Skipped;
        }

        match self.cosigner.handle(&self.client, output).await {
            Ok(outcome) => OutputDisposition::Handled(outcome),
            Err(e) => OutputDisposition::Fatal(e),
        }
    }

    /// Poll every tick until `shutdown` resolves.
    ///
    /// Shutdown is only observed between ticks; a drain in progress finishes first.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            offset = %self.cursor.offset(),
            members = self.config.members.len(),
            threshold = self.config.threshold,
            sign_threshold = self.cosigner.sign_threshold(),
            "poller started"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }

            if let Ok(report) = self.poll_once().await {
                if report.fetched > 0 {
                    info!(
                        offset = %report.cursor,
                        fetched = report.fetched,
                        skipped = report.skipped,
                        handled = report.handled,
                        aborted = report.aborted,
                        "batch drained"
                    );
                }
            }
        }

        info!(offset = %self.cursor.offset(), "poller stopped");
    }
}
