//! Room key codec.
//!
//! A room key is a random AES-256-GCM key shared by everyone holding the room
//! link. It travels base64url-encoded in the URL fragment, so unlike identity
//! keys it is extractable by construction.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand_core::CryptoRngCore;
use zeroize::Zeroizing;

use crate::{CryptoError, KEY_SIZE, SymmetricKey};

/// Symmetric key scoped to one link-shared room.
#[derive(Clone)]
pub struct RoomKey {
    key: SymmetricKey,
}

impl RoomKey {
    /// Generate a fresh 256-bit room key.
    ///
    /// Caller MUST provide a cryptographically secure RNG in production.
    pub fn generate(rng: &mut impl CryptoRngCore) -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
        rng.fill_bytes(bytes.as_mut_slice());
        Self { key: SymmetricKey::new(bytes) }
    }

    /// Encode the raw key as unpadded base64url, suitable for a URL fragment.
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.key.as_bytes())
    }

    /// Decode a key produced by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// - `InvalidKeyFormat`: not base64url, wrong length, or all-zero bytes
    pub fn decode(encoded: &str) -> Result<Self, CryptoError> {
        let decoded = Zeroizing::new(URL_SAFE_NO_PAD.decode(encoded).map_err(|e| {
            CryptoError::InvalidKeyFormat { reason: format!("room key is not base64url: {e}") }
        })?);

        if decoded.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyFormat {
                reason: format!("room key must be {KEY_SIZE} bytes, got {}", decoded.len()),
            });
        }

        if decoded.iter().all(|&b| b == 0) {
            return Err(CryptoError::InvalidKeyFormat {
                reason: "room key is all zeroes".to_string(),
            });
        }

        let mut bytes = Zeroizing::new([0u8; KEY_SIZE]);
        bytes.copy_from_slice(&decoded);
        Ok(Self { key: SymmetricKey::new(bytes) })
    }

    /// AES-GCM key for the cipher pipeline.
    pub fn key(&self) -> &SymmetricKey {
        &self.key
    }
}

impl fmt::Debug for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RoomKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    #[test]
    fn encoded_key_is_url_safe() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        for _ in 0..64 {
            let encoded = RoomKey::generate(&mut rng).encode();
            assert_eq!(encoded.len(), 43);
            assert!(encoded.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn decode_restores_same_bytes() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let key = RoomKey::generate(&mut rng);

        let decoded = RoomKey::decode(&key.encode()).unwrap();

        assert_eq!(decoded.key().as_bytes(), key.key().as_bytes());
    }

    #[test]
    fn generated_keys_differ() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let a = RoomKey::generate(&mut rng);
        let b = RoomKey::generate(&mut rng);

        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn decode_rejects_invalid_alphabet() {
        let result = RoomKey::decode("not-base64!!");
        assert!(matches!(result, Err(CryptoError::InvalidKeyFormat { .. })));
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let short = URL_SAFE_NO_PAD.encode([7u8; 16]);
        let result = RoomKey::decode(&short);

        assert!(matches!(
            result,
            Err(CryptoError::InvalidKeyFormat { reason }) if reason.contains("32 bytes")
        ));
    }

    #[test]
    fn decode_rejects_empty_and_zero_keys() {
        assert!(RoomKey::decode("").is_err());

        let zero = URL_SAFE_NO_PAD.encode([0u8; KEY_SIZE]);
        assert!(matches!(RoomKey::decode(&zero), Err(CryptoError::InvalidKeyFormat { .. })));
    }

    #[test]
    fn decode_rejects_padded_input() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let padded = format!("{}=", RoomKey::generate(&mut rng).encode());

        assert!(RoomKey::decode(&padded).is_err());
    }
}
