//! PIN encryption under the PIN token
//!
//! The session key and the service's PIN token agree on an X25519 secret,
//! which keys AES-256-CBC over `pin || unix_seconds || iterator`. The
//! iterator must increase between calls for the same session.

use crate::{CryptoError, Result, KEY_LENGTH};
use aes::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use curve25519_dalek::montgomery::MontgomeryPoint;
use rand::RngCore;
use sha2::{Digest, Sha512};
use std::time::{SystemTime, UNIX_EPOCH};
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

/// AES block size, also the IV length
pub const IV_LENGTH: usize = 16;

/// Per-encryption inputs that are not secret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinEnvelope {
    /// Unix seconds
    pub timestamp: u64,
    /// Monotonic counter, nanoseconds since the epoch by convention
    pub iterator: u64,
    pub iv: [u8; IV_LENGTH],
}

impl PinEnvelope {
    /// Envelope stamped with the current time and a random IV
    pub fn now() -> Self {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let mut iv = [0u8; IV_LENGTH];
        rand::thread_rng().fill_bytes(&mut iv);

        Self {
            timestamp: elapsed.as_secs(),
            iterator: elapsed.as_nanos() as u64,
            iv,
        }
    }
}

/// Encrypt a PIN for the custody service using a fresh envelope
pub fn encrypt_pin(pin: &str, pin_token: &[u8; KEY_LENGTH], session_seed: &[u8]) -> Result<String> {
    encrypt_pin_with(pin, pin_token, session_seed, &PinEnvelope::now())
}

/// Encrypt a PIN with an explicit envelope.
///
/// `session_seed` is the ed25519 seed of the session key; a full 64-byte
/// keypair is accepted as well since only the first 32 bytes are read.
pub fn encrypt_pin_with(
    pin: &str,
    pin_token: &[u8; KEY_LENGTH],
    session_seed: &[u8],
    envelope: &PinEnvelope,
) -> Result<String> {
    if session_seed.len() < KEY_LENGTH {
        return Err(CryptoError::InvalidLength {
            expected: KEY_LENGTH,
            actual: session_seed.len(),
        });
    }

    let digest = Sha512::digest(&session_seed[..KEY_LENGTH]);
    let mut scalar = Zeroizing::new([0u8; KEY_LENGTH]);
    scalar.copy_from_slice(&digest[..KEY_LENGTH]);

    let shared = Zeroizing::new(MontgomeryPoint(*pin_token).mul_clamped(*scalar).to_bytes());

    let mut plaintext = Zeroizing::new(pin_bytes(pin));
    plaintext.extend_from_slice(&envelope.timestamp.to_le_bytes());
    plaintext.extend_from_slice(&envelope.iterator.to_le_bytes());

    let ciphertext = Aes256CbcEnc::new(&(*shared).into(), &envelope.iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(&plaintext);

    let mut out = Vec::with_capacity(IV_LENGTH + ciphertext.len());
    out.extend_from_slice(&envelope.iv);
    out.extend_from_slice(&ciphertext);
    Ok(URL_SAFE_NO_PAD.encode(out))
}

/// A derived PIN is the hex form of a 32-byte key and travels as raw bytes;
/// anything else is a plain numeric PIN.
fn pin_bytes(pin: &str) -> Vec<u8> {
    if pin.len() == KEY_LENGTH * 2 {
        if let Ok(raw) = hex::decode(pin) {
            return raw;
        }
    }
    pin.as_bytes().to_vec()
}
