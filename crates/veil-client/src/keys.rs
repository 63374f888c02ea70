//! Key resolution per channel mode.

use std::time::Duration;

use veil_core::{
    ChannelId, ConversationId, Identity, IdentityDirectory, RoomLink, SessionError, UserId,
    with_timeout,
};
use veil_crypto::{RoomKey, SymmetricKey, derive_shared_key};

/// Where a channel's key comes from.
#[derive(Debug, Clone)]
pub enum ChannelKeys {
    /// Symmetric key carried in the room link fragment.
    Room(RoomKey),
    /// ECDH between our identity and the peer's published key.
    Conversation {
        /// Counterpart whose public key is looked up in the directory
        peer: UserId,
    },
}

/// A channel a view can be attached to, with its key source.
#[derive(Debug, Clone)]
pub struct Channel {
    id: ChannelId,
    keys: ChannelKeys,
}

impl Channel {
    /// Room opened from a link.
    pub fn room(link: &RoomLink) -> Self {
        Self { id: ChannelId::Room(link.room_id()), keys: ChannelKeys::Room(link.key().clone()) }
    }

    /// Two-party conversation with `peer`.
    pub fn conversation(id: ConversationId, peer: UserId) -> Self {
        Self { id: ChannelId::Conversation(id), keys: ChannelKeys::Conversation { peer } }
    }

    /// Channel identifier.
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Key source.
    pub fn keys(&self) -> &ChannelKeys {
        &self.keys
    }
}

/// Produce the symmetric key for one batch or one send.
///
/// Conversation keys are re-derived on every call from the peer key the
/// directory returns right now.
///
/// # Errors
///
/// - `PeerKeyMissing` if the peer never published a key
/// - `Crypto(InvalidPeerKey)` if the published key is malformed
/// - `Transport` if the directory lookup fails or times out
pub async fn resolve_key<D: IdentityDirectory + ?Sized>(
    keys: &ChannelKeys,
    identity: &Identity,
    directory: &D,
    timeout: Duration,
) -> Result<SymmetricKey, SessionError> {
    match keys {
        ChannelKeys::Room(room_key) => Ok(room_key.key().clone()),
        ChannelKeys::Conversation { peer } => {
            let peer_key = with_timeout(timeout, directory.public_key(*peer))
                .await?
                .ok_or(SessionError::PeerKeyMissing { user_id: *peer })?;

            Ok(derive_shared_key(identity.key_pair(), &peer_key)?)
        },
    }
}

/// Publish our public key so peers can open conversations with us.
///
/// # Errors
///
/// `Transport` if the directory rejects the key or times out.
pub async fn publish_identity<D: IdentityDirectory + ?Sized>(
    directory: &D,
    identity: &Identity,
    timeout: Duration,
) -> Result<(), SessionError> {
    with_timeout(timeout, directory.publish_public_key(identity.public_key().clone())).await?;
    tracing::info!(public_key = %identity.public_key(), "identity published");
    Ok(())
}
