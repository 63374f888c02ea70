//! Error types for veil sessions.
//!
//! Strongly-typed errors separate fatal key-material problems from
//! recoverable transport failures so the caller can pick the right policy:
//! redirect to a safe landing state, or keep the view and let the user retry.

use std::time::Duration;

use thiserror::Error;
use veil_crypto::CryptoError;

use crate::{link::LinkError, model::UserId, storage::StorageError};

/// Errors from network collaborators (message store, identity directory).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Client-side timeout elapsed before the collaborator answered.
    #[error("request timed out after {after:?}")]
    Timeout {
        /// Configured timeout
        after: Duration,
    },

    /// Collaborator unreachable or connection dropped.
    #[error("collaborator unavailable: {reason}")]
    Unavailable {
        /// Underlying failure
        reason: String,
    },

    /// Collaborator answered with an error.
    #[error("request rejected ({status}): {reason}")]
    Rejected {
        /// Status code reported by the collaborator
        status: u16,
        /// Error message from the collaborator
        reason: String,
    },
}

impl TransportError {
    /// Returns true if the same request may succeed later.
    ///
    /// Rejections in the 4xx range are never transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Unavailable { .. } => true,
            Self::Rejected { status, .. } => *status >= 500,
        }
    }
}

/// Errors that end or interrupt a client session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Local identity slots are present but unreadable.
    ///
    /// Never resolved by silently minting a new identity: that would orphan
    /// every existing conversation.
    #[error("identity corrupt: {reason}")]
    IdentityCorrupt {
        /// What was wrong with the stored material
        reason: String,
    },

    /// Key material or cipher failure.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Room link is unusable.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// The directory has no public key for the conversation peer.
    #[error("no public key published for user {user_id}")]
    PeerKeyMissing {
        /// Peer whose key is missing
        user_id: UserId,
    },

    /// Local persistent storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Network failure or timeout.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl SessionError {
    /// Returns true if the session must be abandoned for a safe landing
    /// state.
    ///
    /// Key-material errors are never retried with weaker defaults. Transport
    /// failures and per-operation cipher failures leave the session usable.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::IdentityCorrupt { .. }
            | Self::Link(_)
            | Self::PeerKeyMissing { .. }
            | Self::Storage(_) => true,
            Self::Crypto(e) => e.is_key_material(),
            Self::Transport(_) => false,
        }
    }
}
