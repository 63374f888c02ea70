//! Long-lived identity key pairs (NIST P-256).
//!
//! Extractability is tracked in the type system. A freshly generated pair is
//! a [`GeneratedKeyPair`], which can export its material once for
//! persistence. Everything else works with [`IdentityKeyPair`], which has no
//! export operation at all.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use p256::{PublicKey, SecretKey, elliptic_curve::sec1::ToEncodedPoint};
use rand_core::CryptoRngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::CryptoError;

/// Scalar size of a P-256 private key.
const SECRET_KEY_SIZE: usize = 32;

/// Base64-encoded uncompressed SEC1 public key.
///
/// The only identity material the server may hold. Construction does not
/// validate; parsing happens at use and fails with
/// [`CryptoError::InvalidPeerKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedPublicKey(String);

impl EncodedPublicKey {
    /// Wrap an encoded key received from a directory or user input.
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Encoded form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_public_key(public: &PublicKey) -> Self {
        Self(STANDARD.encode(public.to_encoded_point(false).as_bytes()))
    }

    /// Parse into a curve point.
    ///
    /// # Errors
    ///
    /// - `InvalidPeerKey`: not base64, or not a valid P-256 point
    pub(crate) fn to_public_key(&self) -> Result<PublicKey, CryptoError> {
        let bytes = STANDARD.decode(&self.0).map_err(|e| CryptoError::InvalidPeerKey {
            reason: format!("public key is not base64: {e}"),
        })?;

        PublicKey::from_sec1_bytes(&bytes).map_err(|_| CryptoError::InvalidPeerKey {
            reason: format!("{} bytes do not encode a P-256 point", bytes.len()),
        })
    }
}

impl fmt::Display for EncodedPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persistable identity material: both halves, base64-encoded.
///
/// Only produced by [`GeneratedKeyPair::export`] and only consumed by
/// [`IdentityKeyPair::import`].
#[derive(Clone)]
pub struct StoredKeyMaterial {
    /// Base64 of the 32-byte private scalar.
    pub private_key: Zeroizing<String>,
    /// Base64 of the uncompressed SEC1 public point.
    pub public_key: String,
}

impl fmt::Debug for StoredKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredKeyMaterial")
            .field("private_key", &"..")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Device identity key pair, non-extractable.
///
/// The private half never leaves this type; it is only reachable by the key
/// agreement engine inside this crate.
pub struct IdentityKeyPair {
    secret: SecretKey,
    public: EncodedPublicKey,
}

impl IdentityKeyPair {
    /// Generate a fresh key pair.
    ///
    /// Caller MUST provide a cryptographically secure RNG in production.
    pub fn generate(rng: &mut impl CryptoRngCore) -> GeneratedKeyPair {
        let secret = SecretKey::random(rng);
        let public = EncodedPublicKey::from_public_key(&secret.public_key());
        GeneratedKeyPair { key_pair: Self { secret, public } }
    }

    /// Import persisted material.
    ///
    /// The result cannot be exported again.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyFormat`: either half unparsable, or the public half does
    ///   not belong to the private half
    pub fn import(material: &StoredKeyMaterial) -> Result<Self, CryptoError> {
        let secret_bytes = Zeroizing::new(STANDARD.decode(material.private_key.as_str()).map_err(
            |e| CryptoError::InvalidKeyFormat { reason: format!("private key is not base64: {e}") },
        )?);

        if secret_bytes.len() != SECRET_KEY_SIZE {
            return Err(CryptoError::InvalidKeyFormat {
                reason: format!(
                    "private key must be {SECRET_KEY_SIZE} bytes, got {}",
                    secret_bytes.len()
                ),
            });
        }

        let secret = SecretKey::from_slice(&secret_bytes).map_err(|_| {
            CryptoError::InvalidKeyFormat { reason: "private key is not a P-256 scalar".into() }
        })?;

        let stored_public = EncodedPublicKey::new(material.public_key.clone())
            .to_public_key()
            .map_err(|e| CryptoError::InvalidKeyFormat { reason: e.to_string() })?;

        if secret.public_key() != stored_public {
            return Err(CryptoError::InvalidKeyFormat {
                reason: "public key does not belong to private key".into(),
            });
        }

        let public = EncodedPublicKey::from_public_key(&stored_public);
        Ok(Self { secret, public })
    }

    /// Encoded public half, safe to publish.
    pub fn public_key(&self) -> &EncodedPublicKey {
        &self.public
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

impl fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// A key pair that has just been generated and may still be exported.
#[derive(Debug)]
pub struct GeneratedKeyPair {
    key_pair: IdentityKeyPair,
}

impl GeneratedKeyPair {
    /// Export both halves for persistence.
    pub fn export(&self) -> StoredKeyMaterial {
        let secret_bytes = self.key_pair.secret.to_bytes();
        StoredKeyMaterial {
            private_key: Zeroizing::new(STANDARD.encode(secret_bytes.as_slice())),
            public_key: self.key_pair.public.as_str().to_string(),
        }
    }

    /// Encoded public half.
    pub fn public_key(&self) -> &EncodedPublicKey {
        self.key_pair.public_key()
    }

    /// Drop extractability.
    pub fn into_key_pair(self) -> IdentityKeyPair {
        self.key_pair
    }
}
