//! Error types for veil cryptographic operations.

use thiserror::Error;

/// Errors that can occur in the cryptographic layer.
///
/// Variants carry a human-readable `reason` that never contains key material
/// or plaintext.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key material from a room link or local storage could not be parsed.
    #[error("invalid key format: {reason}")]
    InvalidKeyFormat {
        /// Why the key was rejected
        reason: String,
    },

    /// Peer public key is malformed, off-curve, or for the wrong curve.
    #[error("invalid peer key: {reason}")]
    InvalidPeerKey {
        /// Why the key was rejected
        reason: String,
    },

    /// Envelope is malformed or failed authentication.
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Why decryption failed
        reason: String,
    },

    /// AEAD refused to encrypt (plaintext exceeds the GCM length limit).
    #[error("encryption failed: {reason}")]
    EncryptionFailed {
        /// Why encryption failed
        reason: String,
    },
}

impl CryptoError {
    /// Returns true if the error concerns key material rather than a single
    /// message.
    ///
    /// Key-material errors are fatal for the session that hit them; a
    /// per-message decryption failure is not.
    pub fn is_key_material(&self) -> bool {
        matches!(self, Self::InvalidKeyFormat { .. } | Self::InvalidPeerKey { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_errors_are_key_material() {
        assert!(CryptoError::InvalidKeyFormat { reason: "x".into() }.is_key_material());
        assert!(CryptoError::InvalidPeerKey { reason: "x".into() }.is_key_material());
    }

    #[test]
    fn message_errors_are_not_key_material() {
        assert!(!CryptoError::DecryptionFailed { reason: "x".into() }.is_key_material());
        assert!(!CryptoError::EncryptionFailed { reason: "x".into() }.is_key_material());
    }
}
