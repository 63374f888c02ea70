//! Identity Key Store.
//!
//! One long-lived P-256 key pair per device, persisted as two base64 slots in
//! a [`KeyValueStore`]. Loading never writes; creating writes both slots in
//! one `put_many`.
//!
//! Stored material that cannot be read back is reported as
//! [`SessionError::IdentityCorrupt`]. The store never mints a replacement on
//! its own: doing so would make every existing conversation undecryptable.
//! [`IdentityStore::replace`] is the explicit way out.

use std::sync::Arc;

use veil_crypto::{EncodedPublicKey, IdentityKeyPair, StoredKeyMaterial};
use zeroize::Zeroizing;

use crate::{env::Environment, error::SessionError, storage::KeyValueStore};

/// Slot holding the base64 private scalar.
pub const PRIVATE_KEY_SLOT: &str = "identity.private_key";

/// Slot holding the base64 SEC1 public point.
pub const PUBLIC_KEY_SLOT: &str = "identity.public_key";

/// How an [`Identity`] came to be returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityOrigin {
    /// Generated and persisted by this call.
    Created,
    /// Read back from storage unchanged.
    Loaded,
}

/// The device identity for the current session.
///
/// Cheap to clone; the key pair is shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Identity {
    key_pair: Arc<IdentityKeyPair>,
    origin: IdentityOrigin,
}

impl Identity {
    /// Key pair used for agreement. Not exportable.
    pub fn key_pair(&self) -> &IdentityKeyPair {
        &self.key_pair
    }

    /// Public half, as published to the identity directory.
    pub fn public_key(&self) -> &EncodedPublicKey {
        self.key_pair.public_key()
    }

    /// Whether this identity was just created.
    pub fn origin(&self) -> IdentityOrigin {
        self.origin
    }
}

/// Loads, creates and replaces the device identity.
#[derive(Clone)]
pub struct IdentityStore<S: KeyValueStore> {
    storage: S,
}

impl<S: KeyValueStore> IdentityStore<S> {
    /// Wrap a slot store.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Underlying slot store.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Read the persisted identity, if any.
    ///
    /// # Errors
    ///
    /// - `IdentityCorrupt` if exactly one slot is present, or the material
    ///   does not parse, or the halves do not belong together
    /// - `Storage` if the slot store fails
    pub fn load(&self) -> Result<Option<Identity>, SessionError> {
        let private_key = self.storage.get(PRIVATE_KEY_SLOT)?.map(Zeroizing::new);
        let public_key = self.storage.get(PUBLIC_KEY_SLOT)?;

        let material = match (private_key, public_key) {
            (None, None) => return Ok(None),
            (Some(private_key), Some(public_key)) => StoredKeyMaterial { private_key, public_key },
            (Some(_), None) => return Err(corrupt("public key slot missing")),
            (None, Some(_)) => return Err(corrupt("private key slot missing")),
        };

        let key_pair =
            IdentityKeyPair::import(&material).map_err(|err| corrupt(err.to_string()))?;

        tracing::debug!(public_key = %key_pair.public_key(), "identity loaded");

        Ok(Some(Identity { key_pair: Arc::new(key_pair), origin: IdentityOrigin::Loaded }))
    }

    /// Return the persisted identity, creating one on first use.
    ///
    /// Idempotent once an identity exists: later calls load it and write
    /// nothing.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`]. A corrupt identity is returned as an error,
    /// never regenerated.
    pub fn load_or_create<E: Environment>(&self, env: &E) -> Result<Identity, SessionError> {
        match self.load()? {
            Some(identity) => Ok(identity),
            None => self.create(env),
        }
    }

    /// Discard whatever is stored and persist a brand new identity.
    ///
    /// Conversations keyed to the old identity can no longer be decrypted.
    ///
    /// # Errors
    ///
    /// `Storage` if the slot store fails.
    pub fn replace<E: Environment>(&self, env: &E) -> Result<Identity, SessionError> {
        tracing::warn!("replacing device identity; previous conversations become unreadable");
        self.create(env)
    }

    fn create<E: Environment>(&self, env: &E) -> Result<Identity, SessionError> {
        let generated = IdentityKeyPair::generate(&mut env.rng());
        let material = generated.export();

        self.storage.put_many(&[
            (PRIVATE_KEY_SLOT, material.private_key.as_str()),
            (PUBLIC_KEY_SLOT, material.public_key.as_str()),
        ])?;
        drop(material);

        let key_pair = generated.into_key_pair();
        tracing::info!(public_key = %key_pair.public_key(), "identity created");

        Ok(Identity { key_pair: Arc::new(key_pair), origin: IdentityOrigin::Created })
    }
}

fn corrupt(reason: impl Into<String>) -> SessionError {
    SessionError::IdentityCorrupt { reason: reason.into() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SystemEnv, storage::MemoryKeyStore};

    #[test]
    fn first_call_creates_and_writes_once() {
        let storage = MemoryKeyStore::new();
        let store = IdentityStore::new(storage.clone());

        let identity = store.load_or_create(&SystemEnv::new()).unwrap();

        assert_eq!(identity.origin(), IdentityOrigin::Created);
        assert_eq!(storage.slot_count().unwrap(), 2);
        assert_eq!(storage.write_count().unwrap(), 1);
    }

    #[test]
    fn second_call_loads_same_identity_without_writing() {
        let storage = MemoryKeyStore::new();
        let store = IdentityStore::new(storage.clone());
        let env = SystemEnv::new();

        let first = store.load_or_create(&env).unwrap();
        let second = store.load_or_create(&env).unwrap();

        assert_eq!(second.origin(), IdentityOrigin::Loaded);
        assert_eq!(first.public_key(), second.public_key());
        assert_eq!(storage.write_count().unwrap(), 1);
    }

    #[test]
    fn garbage_private_key_is_corrupt_not_regenerated() {
        let storage = MemoryKeyStore::new();
        let store = IdentityStore::new(storage.clone());
        let original = store.load_or_create(&SystemEnv::new()).unwrap();

        storage.put(PRIVATE_KEY_SLOT, "not-base64!!").unwrap();

        let result = store.load_or_create(&SystemEnv::new());
        assert!(matches!(result, Err(SessionError::IdentityCorrupt { .. })));
        assert_eq!(
            storage.get(PUBLIC_KEY_SLOT).unwrap().as_deref(),
            Some(original.public_key().as_str())
        );
    }

    #[test]
    fn half_written_identity_is_corrupt() {
        let storage = MemoryKeyStore::new();
        let store = IdentityStore::new(storage.clone());
        store.load_or_create(&SystemEnv::new()).unwrap();

        storage.remove(PUBLIC_KEY_SLOT).unwrap();

        let err = store.load().unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, SessionError::IdentityCorrupt { .. }));
    }

    #[test]
    fn replace_recovers_from_corruption() {
        let storage = MemoryKeyStore::new();
        let store = IdentityStore::new(storage.clone());
        let env = SystemEnv::new();
        let original = store.load_or_create(&env).unwrap();
        storage.put(PUBLIC_KEY_SLOT, "AAAA").unwrap();

        let replaced = store.replace(&env).unwrap();
        let loaded = store.load_or_create(&env).unwrap();

        assert_ne!(replaced.public_key(), original.public_key());
        assert_eq!(loaded.public_key(), replaced.public_key());
        assert_eq!(loaded.origin(), IdentityOrigin::Loaded);
    }
}
