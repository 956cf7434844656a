//! Cryptographic primitives for the co-signer
//!
//! This crate derives the agent's secrets from operator-supplied seeds and
//! encrypts the PIN-equivalent value for the custody service. Everything here
//! is a pure function of its inputs; curve arithmetic comes from the
//! `curve25519-dalek` implementation.

use thiserror::Error;

pub mod curve;
pub mod keys;
pub mod pin;

pub use curve::ed25519_public_key_to_montgomery;
pub use keys::{clamp_scalar, derive_signing_key, derive_signing_key_from_hex_seed, DerivedKey};
pub use pin::{encrypt_pin, encrypt_pin_with, PinEnvelope};

/// Length of every key, seed prefix and curve point handled by this crate.
pub const KEY_LENGTH: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid seed:: {0}")]
    InvalidSeed(String),

    #[error("invalid curve point")]
    InvalidPoint,

    #[error("invalid key length:: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Result type alias for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;
