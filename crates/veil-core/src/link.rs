//! Room links.
//!
//! A room is shared as `{base_url}/room/{room_id}#{key}`. The room key lives
//! in the URL fragment only, which browsers and HTTP clients never send to the
//! server. Parsing refuses links that put anything in the query string, so a
//! key pasted there is rejected rather than silently leaked.

use std::fmt;

use thiserror::Error;
use veil_crypto::{CryptoError, RoomKey};

use crate::{env::Environment, model::RoomId};

const ROOM_SEGMENT: &str = "/room/";

/// Errors from parsing a room link. All of them are fatal for room entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// No fragment, or an empty one.
    #[error("room link has no key fragment")]
    MissingKey,

    /// No `/room/` path segment.
    #[error("room link has no room id")]
    MissingRoomId,

    /// Room id is not 32 hex digits.
    #[error("invalid room id: {reason}")]
    InvalidRoomId {
        /// What was wrong
        reason: String,
    },

    /// Link carries a query string.
    #[error("room link must not carry a query string")]
    UnexpectedQuery,

    /// Fragment is not a valid room key.
    #[error(transparent)]
    Key(#[from] CryptoError),
}

/// A shareable room: where it lives and the key that opens it.
#[derive(Clone)]
pub struct RoomLink {
    base_url: String,
    room_id: RoomId,
    key: RoomKey,
}

impl RoomLink {
    /// Assemble a link from its parts. Trailing slashes on `base_url` are
    /// dropped.
    pub fn new(base_url: &str, room_id: RoomId, key: RoomKey) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_string(), room_id, key }
    }

    /// Mint a new room with a random id and a fresh key.
    pub fn create<E: Environment>(base_url: &str, env: &E) -> Self {
        let room_id = env.random_u128();
        let key = RoomKey::generate(&mut env.rng());
        tracing::debug!(room_id = %format_args!("{room_id:032x}"), "room created");
        Self::new(base_url, room_id, key)
    }

    /// Parse a link produced by [`Self::to_url`].
    ///
    /// # Errors
    ///
    /// - `MissingKey` if there is no fragment or it is empty
    /// - `UnexpectedQuery` if a query string is present
    /// - `MissingRoomId` / `InvalidRoomId` for a bad path
    /// - `Key(InvalidKeyFormat)` if the fragment is not a room key
    pub fn parse(url: &str) -> Result<Self, LinkError> {
        let (location, fragment) = url.split_once('#').ok_or(LinkError::MissingKey)?;
        if fragment.is_empty() {
            return Err(LinkError::MissingKey);
        }
        if location.contains('?') {
            return Err(LinkError::UnexpectedQuery);
        }

        let (base_url, id) = location.rsplit_once(ROOM_SEGMENT).ok_or(LinkError::MissingRoomId)?;
        let id = id.trim_end_matches('/');
        if id.len() != 32 || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(LinkError::InvalidRoomId {
                reason: format!("expected 32 hex digits, got {id:?}"),
            });
        }
        let room_id = RoomId::from_str_radix(id, 16)
            .map_err(|err| LinkError::InvalidRoomId { reason: err.to_string() })?;

        let key = RoomKey::decode(fragment)?;

        Ok(Self::new(base_url, room_id, key))
    }

    /// Full shareable URL including the key fragment.
    pub fn to_url(&self) -> String {
        format!("{}#{}", self.path(), self.key.encode())
    }

    /// URL without the fragment. This is the only part a server ever sees.
    pub fn path(&self) -> String {
        format!("{}{ROOM_SEGMENT}{:032x}", self.base_url, self.room_id)
    }

    /// Room identifier.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Room key.
    pub fn key(&self) -> &RoomKey {
        &self.key
    }
}

impl fmt::Debug for RoomLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomLink")
            .field("path", &self.path())
            .field("key", &"<redacted>")
            .finish()
    }
}
