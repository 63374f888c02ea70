//! Veil Core
//!
//! Device-side building blocks shared by every veil client: the
//! [`Environment`] abstraction over time and entropy, local persistent
//! storage, the identity key store, room links, the wire model, and the
//! contracts of the external collaborators (message store and identity
//! directory).
//!
//! # Error Taxonomy
//!
//! - [`SessionError::IdentityCorrupt`]: local identity unreadable. Fatal; the
//!   caller decides whether to [`IdentityStore::replace`] it.
//! - [`SessionError::Crypto`] with `InvalidKeyFormat` / `InvalidPeerKey`: bad
//!   key material from a link or the directory. Fatal for the session.
//! - [`TransportError`]: network failure or timeout. Recoverable.
//!
//! Per-message decryption failures are not session errors; the sync layer
//! renders them in place.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
mod error;
mod identity;
mod link;
mod model;
pub mod storage;
mod system_env;
mod transport;

pub use env::{EnvRng, Environment};
pub use error::{SessionError, TransportError};
pub use identity::{Identity, IdentityOrigin, IdentityStore, PRIVATE_KEY_SLOT, PUBLIC_KEY_SLOT};
pub use link::{LinkError, RoomLink};
pub use model::{ChannelId, ConversationId, MessageId, RoomId, StoredMessage, UserId};
pub use system_env::SystemEnv;
pub use transport::{IdentityDirectory, MessageStore, with_timeout};
