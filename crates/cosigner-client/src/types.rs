//! Wire types returned by the custody service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::fmt;

/// Lifecycle of a multisig output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UtxoState {
    Unspent,
    Pending,
    /// At least one member has signed the spending transaction
    Signed,
    Spent,
    #[serde(other)]
    Unknown,
}

impl UtxoState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UtxoState::Unspent => "unspent",
            UtxoState::Pending => "pending",
            UtxoState::Signed => "signed",
            UtxoState::Spent => "spent",
            UtxoState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for UtxoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A multisig output owned by the group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateOutput {
    pub utxo_id: String,
    #[serde(default)]
    pub asset_id: String,
    #[serde(default)]
    pub amount: String,
    pub state: UtxoState,
    /// Raw spending transaction, present once the output is signed
    #[serde(default)]
    pub signed_tx: String,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of a multisig signing request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigningSession {
    pub request_id: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub state: String,
    pub raw_transaction: String,
    #[serde(default)]
    pub signers: Vec<String>,
    /// Signatures the network requires
    pub threshold: u8,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

impl SigningSession {
    pub fn signer_count(&self) -> usize {
        self.signers.len()
    }

    pub fn has_signer(&self, client_id: &str) -> bool {
        self.signers.iter().any(|signer| signer == client_id)
    }
}

/// Parameters for listing multisig outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputQuery {
    pub members: Vec<String>,
    pub threshold: u8,
    /// Only outputs updated strictly after this instant
    pub offset: DateTime<Utc>,
    pub limit: usize,
}

/// Hash of a broadcast transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHash(pub String);

impl fmt::Display for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identify a member set the way the service indexes it: SHA3-256 over the
/// sorted ids concatenated without separators, hex encoded.
pub fn members_hash(members: &[String]) -> String {
    let mut sorted: Vec<&str> = members.iter().map(String::as_str).collect();
    sorted.sort_unstable();

    let mut hasher = Sha3_256::new();
    for member in sorted {
        hasher.update(member.as_bytes());
    }
    hex::encode(hasher.finalize())
}
