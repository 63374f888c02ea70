//! Veil Cryptographic Primitives
//!
//! Cryptographic building blocks for veil's end-to-end encryption. Functions
//! are pure apart from entropy, which the caller supplies through a
//! [`rand_core::CryptoRngCore`]. Production callers pass the OS generator;
//! tests pass a seeded generator for reproducible runs.
//!
//! # Key Distribution
//!
//! Two models produce the [`SymmetricKey`] consumed by the cipher pipeline:
//!
//! ```text
//! Room mode                         Conversation mode
//!
//! CSPRNG → RoomKey                  IdentityKeyPair (ours)
//!          │                                 │ ECDH
//!          │ encode (URL fragment)           │◄──── EncodedPublicKey (theirs)
//!          ▼                                 ▼
//!      SymmetricKey                 HKDF-SHA256 → SymmetricKey
//!          │                                 │
//!          └──────────────┬──────────────────┘
//!                         ▼
//!            AES-256-GCM → EncryptedEnvelope { ciphertext, iv }
//! ```
//!
//! # Security
//!
//! Confidentiality and integrity:
//! - AES-256-GCM with a fresh random 96-bit IV on every call
//! - Authentication tag mismatch -> [`CryptoError::DecryptionFailed`], never
//!   partial plaintext
//!
//! Key hygiene:
//! - Symmetric keys and private scalars are zeroized on drop
//! - Imported identity key pairs expose no export operation
//! - Conversation keys are derived per operation and never cached here
//!
//! Key agreement:
//! - ECDH over NIST P-256; both parties derive the same key from
//!   `(own private, peer public)`
//! - Malformed or off-curve peer keys -> [`CryptoError::InvalidPeerKey`]

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod agreement;
mod cipher;
mod error;
mod identity;
mod key;
mod room_key;

pub use agreement::derive_shared_key;
pub use cipher::{EncryptedEnvelope, IV_SIZE, decrypt, encrypt};
pub use error::CryptoError;
pub use identity::{EncodedPublicKey, GeneratedKeyPair, IdentityKeyPair, StoredKeyMaterial};
pub use key::{KEY_SIZE, SymmetricKey};
pub use room_key::RoomKey;
