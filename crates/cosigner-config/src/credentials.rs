//! Agent credentials composed from the `dapp` section
//!
//! Seeds take precedence over pre-derived secrets:
//! - `private_key_seed`: the session keypair is `seed || derived_public_key`
//! - `server_public_key`: the PIN token is its Montgomery form
//! - `pin_seed`: the PIN is the hex private scalar derived from it

use crate::{ConfigError, DappConfig};
use base64::{engine::general_purpose, Engine as _};
use cosigner_crypto::{
    derive_signing_key_from_hex_seed, ed25519_public_key_to_montgomery, KEY_LENGTH,
};
use std::fmt;
use zeroize::Zeroizing;

/// Length of an ed25519 keypair in its `seed || public key` form
pub const KEYPAIR_LENGTH: usize = 64;

/// Everything the agent needs to authenticate and authorize signing
#[derive(Clone)]
pub struct AgentCredentials {
    client_id: String,
    session_id: String,
    private_key: Zeroizing<Vec<u8>>,
    pin_token: [u8; KEY_LENGTH],
    pin: Zeroizing<String>,
}

impl AgentCredentials {
    /// Compose credentials from the dapp section, deriving from seeds when present
    pub fn from_dapp(dapp: &DappConfig) -> Result<Self, ConfigError> {
        let private_key = if !dapp.private_key_seed.is_empty() {
            let seed = dapp.private_key_seed.trim();
            let key = derive_signing_key_from_hex_seed(seed)?;
            let keypair_hex = Zeroizing::new(format!("{seed}{}", key.public_key_hex()));
            Zeroizing::new(hex::decode(keypair_hex.as_str()).map_err(|e| {
                ConfigError::Credentials(format!("private_key_seed is not hex:: {e}"))
            })?)
        } else if !dapp.private_key.is_empty() {
            Zeroizing::new(decode_base64(&dapp.private_key).ok_or_else(|| {
                ConfigError::Credentials("private_key is not valid base64".to_string())
            })?)
        } else {
            return Err(ConfigError::Credentials(
                "private_key or private_key_seed is required".to_string(),
            ));
        };

        if private_key.len() != KEYPAIR_LENGTH {
            return Err(ConfigError::Credentials(format!(
                "session private key must be {KEYPAIR_LENGTH} bytes, got {}",
                private_key.len()
            )));
        }

        let pin_token: [u8; KEY_LENGTH] = if !dapp.server_public_key.is_empty() {
            let public_key = hex::decode(dapp.server_public_key.trim()).map_err(|e| {
                ConfigError::Credentials(format!("server_public_key is not hex:: {e}"))
            })?;
            if public_key.len() != KEY_LENGTH {
                return Err(ConfigError::Credentials(format!(
                    "server_public_key must be {KEY_LENGTH} bytes, got {}",
                    public_key.len()
                )));
            }
            ed25519_public_key_to_montgomery(&public_key)?
        } else if !dapp.pin_token.is_empty() {
            let raw = decode_base64(&dapp.pin_token).ok_or_else(|| {
                ConfigError::Credentials("pin_token is not valid base64".to_string())
            })?;
            raw.as_slice().try_into().map_err(|_| {
                ConfigError::Credentials(format!(
                    "pin_token must be {KEY_LENGTH} bytes, got {}",
                    raw.len()
                ))
            })?
        } else {
            return Err(ConfigError::Credentials(
                "pin_token or server_public_key is required".to_string(),
            ));
        };

        let pin = if !dapp.pin_seed.is_empty() {
            derive_signing_key_from_hex_seed(&dapp.pin_seed)?.private_key_hex()
        } else if !dapp.pin.is_empty() {
            dapp.pin.clone()
        } else {
            return Err(ConfigError::Credentials(
                "pin or pin_seed is required".to_string(),
            ));
        };

        Ok(Self {
            client_id: dapp.client_id.trim().to_string(),
            session_id: dapp.session_id.trim().to_string(),
            private_key,
            pin_token,
            pin: Zeroizing::new(pin),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Session keypair bytes (`seed || public key`)
    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    pub fn pin_token(&self) -> &[u8; KEY_LENGTH] {
        &self.pin_token
    }

    /// PIN-equivalent value
    pub fn pin(&self) -> &str {
        &self.pin
    }
}

impl fmt::Debug for AgentCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentCredentials")
            .field("client_id", &self.client_id)
            .field("session_id", &self.session_id)
            .field("pin_token", &hex::encode(self.pin_token))
            .finish_non_exhaustive()
    }
}

/// Keystores in the wild carry both padded standard and unpadded URL-safe base64
fn decode_base64(value: &str) -> Option<Vec<u8>> {
    let value = value.trim();
    [
        general_purpose::STANDARD,
        general_purpose::STANDARD_NO_PAD,
        general_purpose::URL_SAFE,
        general_purpose::URL_SAFE_NO_PAD,
    ]
    .iter()
    .find_map(|engine| engine.decode(value).ok())
}
