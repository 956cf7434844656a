//! Request authentication
//!
//! Each request carries a short-lived EdDSA JWT signed with the session key.
//! The `sig` claim binds the token to one request:
//! `hex(sha256(method || path?query || body))`.

use crate::{ClientError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey, KEYPAIR_LENGTH};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Token lifetime in seconds
pub const TOKEN_TTL_SECS: i64 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub uid: String,
    pub sid: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    pub sig: String,
    pub scp: String,
}

/// Signs bearer tokens for one client session
pub struct RequestSigner {
    client_id: String,
    session_id: String,
    signing_key: SigningKey,
}

impl RequestSigner {
    /// `keypair` is the 64-byte `seed || public key` session key
    pub fn new(client_id: &str, session_id: &str, keypair: &[u8]) -> Result<Self> {
        let bytes: &[u8; KEYPAIR_LENGTH] = keypair.try_into().map_err(|_| {
            ClientError::Auth(format!(
                "session key must be {KEYPAIR_LENGTH} bytes, got {}",
                keypair.len()
            ))
        })?;
        let signing_key = SigningKey::from_keypair_bytes(bytes)
            .map_err(|e| ClientError::Auth(format!("inconsistent session keypair:: {e}")))?;

        Ok(Self {
            client_id: client_id.to_string(),
            session_id: session_id.to_string(),
            signing_key,
        })
    }

    /// Token for a request issued now
    pub fn sign_token(&self, method: &str, uri: &str, body: &[u8]) -> Result<String> {
        let jti = Uuid::new_v4().to_string();
        self.sign_token_at(method, uri, body, Utc::now().timestamp(), &jti)
    }

    pub fn sign_token_at(
        &self,
        method: &str,
        uri: &str,
        body: &[u8],
        issued_at: i64,
        jti: &str,
    ) -> Result<String> {
        let claims = Claims {
            uid: self.client_id.clone(),
            sid: self.session_id.clone(),
            iat: issued_at,
            exp: issued_at + TOKEN_TTL_SECS,
            jti: jti.to_string(),
            sig: request_digest(method, uri, body),
            scp: "FULL".to_string(),
        };

        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"EdDSA","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let signing_input = format!("{header}.{payload}");
        let signature = self.signing_key.sign(signing_input.as_bytes());

        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }
}

/// Hex SHA-256 over `method || uri || body`
pub fn request_digest(method: &str, uri: &str, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(uri.as_bytes());
    hasher.update(body);
    hex::encode(hasher.finalize())
}
