//! Per-output co-signing decisions.
//!
//! Every pass re-reads the signing session from the custody service and
//! decides from that snapshot alone. Nothing is remembered between passes,
//! so re-running a pass after a partial failure converges on the same state.

use cosigner_client::{
    CandidateOutput, ClientError, CustodyClient, SigningSession, TransactionHash,
};
use cosigner_telemetry::operation;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, instrument};
use zeroize::Zeroizing;

/// A remote failure while processing one output
#[derive(Error, Debug)]
pub enum CosignError {
    #[error("open signing session for output {utxo_id}: {source}")]
    OpenSession {
        utxo_id: String,
        #[source]
        source: ClientError,
    },

    #[error("add signature to request {request_id} for output {utxo_id}: {source}")]
    AddSignature {
        utxo_id: String,
        request_id: String,
        #[source]
        source: ClientError,
    },

    #[error("broadcast request {request_id} for output {utxo_id}: {source}")]
    Broadcast {
        utxo_id: String,
        request_id: String,
        #[source]
        source: ClientError,
    },
}

impl CosignError {
    pub fn utxo_id(&self) -> &str {
        match self {
            CosignError::OpenSession { utxo_id, .. }
            | CosignError::AddSignature { utxo_id, .. }
            | CosignError::Broadcast { utxo_id, .. } => utxo_id,
        }
    }

    /// Name of the remote operation that failed, as used in metrics labels
    pub fn operation(&self) -> &'static str {
        match self {
            CosignError::OpenSession { .. } => operation::OPEN_SESSION,
            CosignError::AddSignature { .. } => operation::ADD_SIGNATURE,
            CosignError::Broadcast { .. } => operation::BROADCAST,
        }
    }
}

/// What one pass over an output did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CosignOutcome {
    pub request_id: String,
    /// Signers on the last session snapshot
    pub signers: usize,
    /// Signatures the session requires
    pub threshold: u8,
    /// Whether this agent signed during the pass
    pub signed: bool,
    pub broadcast: Option<TransactionHash>,
}

impl CosignOutcome {
    /// Still short of the session threshold
    pub fn is_pending(&self) -> bool {
        self.signers < usize::from(self.threshold)
    }
}

/// Quorum gate: sign only when absent and at least `sign_threshold` peers signed
pub fn should_sign(session: &SigningSession, agent_id: &str, sign_threshold: u8) -> bool {
    !session.has_signer(agent_id) && session.signer_count() >= usize::from(sign_threshold)
}

pub fn is_fully_signed(session: &SigningSession) -> bool {
    session.signer_count() >= usize::from(session.threshold)
}

/// Co-signing state machine for one group member
pub struct Cosigner {
    agent_id: String,
    pin: Zeroizing<String>,
    sign_threshold: u8,
}

impl Cosigner {
    pub fn new(agent_id: impl Into<String>, pin: impl Into<String>, sign_threshold: u8) -> Self {
        Self {
            agent_id: agent_id.into(),
            pin: Zeroizing::new(pin.into()),
            sign_threshold,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn sign_threshold(&self) -> u8 {
        self.sign_threshold
    }

    /// Run one pass over an output in signed state.
    ///
    /// Broadcasts at most once; a failed broadcast is not retried in the pass.
    #[instrument(skip_all, fields(utxo_id = %output.utxo_id))]
    pub async fn handle<C>(
        &self,
        client: &C,
        output: &CandidateOutput,
    ) -> Result<CosignOutcome, CosignError>
    where
        C: CustodyClient + ?Sized,
    {
        let mut session = client
            .open_signing_session(&output.signed_tx)
            .await
            .map_err(|source| CosignError::OpenSession {
                utxo_id: output.utxo_id.clone(),
                source,
            })?;

        let mut signed = false;
        if should_sign(&session, &self.agent_id, self.sign_threshold) {
            session = client
                .add_signature(&session.request_id, &self.pin)
                .await
                .map_err(|source| CosignError::AddSignature {
                    utxo_id: output.utxo_id.clone(),
                    request_id: session.request_id.clone(),
                    source,
                })?;
            signed = true;

            info!(
                request_id = %session.request_id,
                signers = session.signer_count(),
                threshold = session.threshold,
                "signature added"
            );
        } else {
            debug!(
                request_id = %session.request_id,
                signers = session.signer_count(),
                sign_threshold = self.sign_threshold,
                self_signed = session.has_signer(&self.agent_id),
                "not signing"
            );
        }

        if !is_fully_signed(&session) {
            debug!(
                request_id = %session.request_id,
                signers = session.signer_count(),
                threshold = session.threshold,
                "waiting for more signatures"
            );
            return Ok(outcome(&session, signed, None));
        }

        let hash = client
            .broadcast_transaction(&session.raw_transaction)
            .await
            .map_err(|source| CosignError::Broadcast {
                utxo_id: output.utxo_id.clone(),
                request_id: session.request_id.clone(),
                source,
            })?;

        info!(request_id = %session.request_id, hash = %hash, "transaction broadcast");

        Ok(outcome(&session, signed, Some(hash)))
    }
}

fn outcome(
    session: &SigningSession,
    signed: bool,
    broadcast: Option<TransactionHash>,
) -> CosignOutcome {
    CosignOutcome {
        request_id: session.request_id.clone(),
        signers: session.signer_count(),
        threshold: session.threshold,
        signed,
        broadcast,
    }
}

impl fmt::Debug for Cosigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cosigner")
            .field("agent_id", &self.agent_id)
            .field("sign_threshold", &self.sign_threshold)
            .finish_non_exhaustive()
    }
}
