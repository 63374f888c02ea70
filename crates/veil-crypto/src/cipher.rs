//! Message encryption using AES-256-GCM
//!
//! Envelope wire format (JSON):
//!
//! ```text
//! { "ciphertext": base64(ciphertext || tag), "iv": base64(12-byte nonce) }
//! ```

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::{CryptoError, SymmetricKey};

/// AES-GCM nonce size (96 bits)
pub const IV_SIZE: usize = 12;

/// GCM authentication tag size (16 bytes)
const TAG_SIZE: usize = 16;

/// Transport record stored server-side in place of plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// Base64 ciphertext including the 16-byte tag
    pub ciphertext: String,
    /// Base64 12-byte IV
    pub iv: String,
}

/// Encrypt a UTF-8 message.
///
/// # Security
///
/// - A fresh random IV is drawn on every call; identical plaintexts under the
///   same key never share an IV
/// - Caller MUST provide cryptographically secure random bytes in production
pub fn encrypt(
    plaintext: &str,
    key: &SymmetricKey,
    rng: &mut impl CryptoRngCore,
) -> Result<EncryptedEnvelope, CryptoError> {
    let mut iv = [0u8; IV_SIZE];
    rng.fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let ciphertext = cipher.encrypt(Nonce::from_slice(&iv), plaintext.as_bytes()).map_err(|_| {
        CryptoError::EncryptionFailed { reason: format!("{} byte plaintext", plaintext.len()) }
    })?;

    Ok(EncryptedEnvelope { ciphertext: STANDARD.encode(ciphertext), iv: STANDARD.encode(iv) })
}

/// Decrypt an envelope.
///
/// # Errors
///
/// - `DecryptionFailed`: malformed base64, wrong IV size, truncated
///   ciphertext, authentication failure (tamper or wrong key), or non-UTF-8
///   plaintext. No partial plaintext is ever returned.
pub fn decrypt(envelope: &EncryptedEnvelope, key: &SymmetricKey) -> Result<String, CryptoError> {
    let iv = STANDARD
        .decode(&envelope.iv)
        .map_err(|e| decryption_failed(format!("iv is not base64: {e}")))?;

    if iv.len() != IV_SIZE {
        return Err(decryption_failed(format!("iv must be {IV_SIZE} bytes, got {}", iv.len())));
    }

    let ciphertext = STANDARD
        .decode(&envelope.ciphertext)
        .map_err(|e| decryption_failed(format!("ciphertext is not base64: {e}")))?;

    if ciphertext.len() < TAG_SIZE {
        return Err(decryption_failed("ciphertext shorter than authentication tag"));
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), ciphertext.as_slice())
        .map_err(|_| decryption_failed("authentication failed"))?;

    String::from_utf8(plaintext).map_err(|e| {
        let mut bytes = e.into_bytes();
        bytes.zeroize();
        decryption_failed("plaintext is not UTF-8")
    })
}

impl EncryptedEnvelope {
    /// Plaintext length in bytes, if the ciphertext field is well-formed.
    pub fn plaintext_len(&self) -> Option<usize> {
        let decoded = STANDARD.decode(&self.ciphertext).ok()?;
        decoded.len().checked_sub(TAG_SIZE)
    }
}

fn decryption_failed(reason: impl Into<String>) -> CryptoError {
    CryptoError::DecryptionFailed { reason: reason.into() }
}
