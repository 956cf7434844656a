//! Deterministic key derivation from seeds
//!
//! A seed is hashed with SHA-512, the low half is clamped the way ed25519
//! clamps secret scalars and then reduced modulo the group order. The reduced
//! scalar is the private key and `scalar * B` is the public key, so the public
//! half matches the RFC 8032 public key for the same seed.
//!
//! Reference: https://www.rfc-editor.org/rfc/rfc8032#section-5.1.5

use crate::{CryptoError, Result, KEY_LENGTH};
use curve25519_dalek::{EdwardsPoint, Scalar};
use sha2::{Digest, Sha512};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A keypair derived from a seed
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    /// Canonical scalar bytes (little endian)
    private_key: [u8; KEY_LENGTH],
    /// Compressed Edwards point
    #[zeroize(skip)]
    public_key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    /// Raw private scalar bytes
    pub fn private_key_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.private_key
    }

    /// Raw compressed public key bytes
    pub fn public_key_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.public_key
    }

    /// Canonical string form of the private key
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.private_key)
    }

    /// Canonical string form of the public key
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key)
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

impl PartialEq for DerivedKey {
    fn eq(&self, other: &Self) -> bool {
        self.private_key == other.private_key && self.public_key == other.public_key
    }
}

impl Eq for DerivedKey {}

/// Clamp a 32-byte scalar: clear the low 3 bits, clear the top bit and set
/// the second-highest bit.
pub fn clamp_scalar(mut bytes: [u8; KEY_LENGTH]) -> [u8; KEY_LENGTH] {
    bytes[0] &= 248;
    bytes[31] &= 63;
    bytes[31] |= 64;
    bytes
}

/// Derive a keypair from raw seed bytes. Only the first 32 bytes are used.
pub fn derive_signing_key(seed: &[u8]) -> Result<DerivedKey> {
    if seed.len() < KEY_LENGTH {
        return Err(CryptoError::InvalidSeed(format!(
            "seed must be at least {KEY_LENGTH} bytes, got {}",
            seed.len()
        )));
    }

    let digest = Sha512::digest(&seed[..KEY_LENGTH]);
    let mut low = [0u8; KEY_LENGTH];
    low.copy_from_slice(&digest[..KEY_LENGTH]);

    // The high half of the wide input is zero, so a wide reduction is the
    // same as reducing the clamped low half on its own.
    let mut clamped = clamp_scalar(low);
    let scalar = Scalar::from_bytes_mod_order(clamped);
    low.zeroize();
    clamped.zeroize();

    let public_key = EdwardsPoint::mul_base(&scalar).compress().to_bytes();

    Ok(DerivedKey {
        private_key: scalar.to_bytes(),
        public_key,
    })
}

/// Derive a keypair from a hex encoded seed
pub fn derive_signing_key_from_hex_seed(seed: &str) -> Result<DerivedKey> {
    let mut bytes = hex::decode(seed.trim())
        .map_err(|e| CryptoError::InvalidSeed(format!("malformed hex:: {e}")))?;
    let key = derive_signing_key(&bytes);
    bytes.zeroize();
    key
}
