//! Ready-to-use AES-256-GCM key handle.

use std::fmt;

use zeroize::Zeroizing;

/// Symmetric key size in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// AES-256-GCM key.
///
/// The cipher pipeline does not care how the key was obtained: room keys and
/// ECDH-derived conversation keys both end up here. Bytes are zeroized on
/// drop and never exposed outside this crate.
#[derive(Clone)]
pub struct SymmetricKey {
    bytes: Zeroizing<[u8; KEY_SIZE]>,
}

impl SymmetricKey {
    pub(crate) fn new(bytes: Zeroizing<[u8; KEY_SIZE]>) -> Self {
        Self { bytes }
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}
