//! Pairwise key agreement using ECDH over P-256 and HKDF-SHA256.

use hkdf::Hkdf;
use p256::ecdh::diffie_hellman;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{CryptoError, EncodedPublicKey, IdentityKeyPair, KEY_SIZE, SymmetricKey};

/// Label used for conversation key derivation
const CONVERSATION_KEY_LABEL: &[u8] = b"veilConversationV1";

/// Derive the symmetric key shared with a peer.
///
/// Both parties obtain the same key: `derive(A.priv, B.pub)` and
/// `derive(B.priv, A.pub)` agree, so either side can decrypt what the other
/// encrypted.
///
/// Nothing is cached. Callers derive per operation so a leaked derived key
/// only covers the operation that produced it.
///
/// # Errors
///
/// - `InvalidPeerKey`: peer key is malformed or not on P-256. Callers must
///   not fall back to any other key.
pub fn derive_shared_key(
    my_key_pair: &IdentityKeyPair,
    their_public_key: &EncodedPublicKey,
) -> Result<SymmetricKey, CryptoError> {
    let their_public = their_public_key.to_public_key()?;

    let shared = diffie_hellman(my_key_pair.secret().to_nonzero_scalar(), their_public.as_affine());

    // The raw x-coordinate is not uniformly distributed; run it through HKDF
    let hkdf = Hkdf::<Sha256>::new(None, shared.raw_secret_bytes().as_slice());

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    let Ok(()) = hkdf.expand(CONVERSATION_KEY_LABEL, key.as_mut_slice()) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    Ok(SymmetricKey::new(key))
}
