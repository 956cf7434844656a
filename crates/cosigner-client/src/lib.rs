//! Client library for the multisig custody service.
//!
//! The co-signing engine talks to the service through the [`CustodyClient`]
//! trait. [`HttpCustodyClient`] implements it over the service's JSON API,
//! authenticating each request with a session-signed JWT.

pub mod auth;
pub mod http;
pub mod types;

pub use auth::RequestSigner;
pub use http::{ClientConfig, HttpCustodyClient};
pub use types::{
    members_hash, CandidateOutput, OutputQuery, SigningSession, TransactionHash, UtxoState,
};

use async_trait::async_trait;
use cosigner_crypto::CryptoError;
use std::sync::Arc;
use thiserror::Error;

/// Client error types
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request error
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("json parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Error envelope returned by the service
    #[error("api error {status}/{code}: {description}")]
    Api {
        status: u16,
        code: i64,
        description: String,
    },

    /// Invalid response
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Request could not be authenticated
    #[error("auth error: {0}")]
    Auth(String),

    /// PIN encryption error
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Operations the co-signer needs from the custody service
#[async_trait]
pub trait CustodyClient: Send + Sync {
    /// List the group's outputs updated after `query.offset`, oldest first
    async fn list_candidate_outputs(&self, query: &OutputQuery) -> Result<Vec<CandidateOutput>>;

    /// Open (or reopen) a signing request for a raw transaction
    async fn open_signing_session(&self, raw_transaction: &str) -> Result<SigningSession>;

    /// Add this member's signature, authorized by `pin`
    async fn add_signature(&self, request_id: &str, pin: &str) -> Result<SigningSession>;

    /// Submit a fully signed transaction to the network
    async fn broadcast_transaction(&self, raw_transaction: &str) -> Result<TransactionHash>;
}

#[async_trait]
impl<C: CustodyClient + ?Sized> CustodyClient for Arc<C> {
    async fn list_candidate_outputs(&self, query: &OutputQuery) -> Result<Vec<CandidateOutput>> {
        (**self).list_candidate_outputs(query).await
    }

    async fn open_signing_session(&self, raw_transaction: &str) -> Result<SigningSession> {
        (**self).open_signing_session(raw_transaction).await
    }

    async fn add_signature(&self, request_id: &str, pin: &str) -> Result<SigningSession> {
        (**self).add_signature(request_id, pin).await
    }

    async fn broadcast_transaction(&self, raw_transaction: &str) -> Result<TransactionHash> {
        (**self).broadcast_transaction(raw_transaction).await
    }
}
