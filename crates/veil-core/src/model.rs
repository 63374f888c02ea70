//! Wire model shared with the message store.

use std::fmt;

use serde::{Deserialize, Serialize};
use veil_crypto::EncryptedEnvelope;

/// Registered user identifier.
pub type UserId = u64;

/// Server-assigned message identifier.
pub type MessageId = u64;

/// 128-bit link-shared room identifier.
pub type RoomId = u128;

/// 128-bit identity-based conversation identifier.
pub type ConversationId = u128;

/// The thing a view is attached to: a room or a conversation.
///
/// Every poll and decrypt batch is tagged with the channel it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    /// Link-shared room (symmetric key from the URL fragment).
    Room(RoomId),
    /// Two-party conversation (ECDH-derived key).
    Conversation(ConversationId),
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Room(id) => write!(f, "room:{id:032x}"),
            Self::Conversation(id) => write!(f, "conversation:{id:032x}"),
        }
    }
}

/// Message as held by the server. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    /// Server-assigned ID.
    pub id: MessageId,
    /// Author.
    pub sender_id: UserId,
    /// Ciphertext and IV.
    #[serde(flatten)]
    pub envelope: EncryptedEnvelope,
    /// Creation time (Unix milliseconds), assigned by the server.
    pub created_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_message_wire_shape() {
        let message = StoredMessage {
            id: 3,
            sender_id: 9,
            envelope: EncryptedEnvelope { ciphertext: "Y3Q=".into(), iv: "aXY=".into() },
            created_at: 1_700_000_000_000,
        };

        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "id": 3,
                "senderId": 9,
                "ciphertext": "Y3Q=",
                "iv": "aXY=",
                "createdAt": 1_700_000_000_000u64,
            })
        );
    }

    #[test]
    fn channel_display_distinguishes_modes() {
        assert_eq!(ChannelId::Room(1).to_string(), format!("room:{:032x}", 1));
        assert_ne!(ChannelId::Room(1).to_string(), ChannelId::Conversation(1).to_string());
    }
}
