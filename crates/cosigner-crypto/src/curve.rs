//! Edwards to Montgomery conversion
//!
//! The custody service publishes an ed25519 public key. Mapping it onto the
//! Montgomery curve (u = (1 + y) / (1 - y)) yields an X25519 public key that
//! can be used for Diffie-Hellman without a separate key exchange.

use crate::{CryptoError, Result, KEY_LENGTH};
use curve25519_dalek::edwards::CompressedEdwardsY;

/// Convert a compressed ed25519 public key into its Montgomery u-coordinate.
pub fn ed25519_public_key_to_montgomery(public_key: &[u8]) -> Result<[u8; KEY_LENGTH]> {
    let bytes: [u8; KEY_LENGTH] = public_key
        .try_into()
        .map_err(|_| CryptoError::InvalidLength {
            expected: KEY_LENGTH,
            actual: public_key.len(),
        })?;

    let point = CompressedEdwardsY(bytes)
        .decompress()
        .ok_or(CryptoError::InvalidPoint)?;

    Ok(point.to_montgomery().to_bytes())
}
