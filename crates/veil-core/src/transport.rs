//! Contracts of the external collaborators.
//!
//! The server only ever sees envelopes and public keys. It performs no
//! cryptographic validation, so everything it returns is treated as
//! untrusted input by the sync layer.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use veil_crypto::{EncodedPublicKey, EncryptedEnvelope};

use crate::{
    error::TransportError,
    model::{ChannelId, StoredMessage, UserId},
};

/// Server-side message log.
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    /// All messages of a channel, ordered by creation time ascending.
    async fn list(&self, channel: ChannelId) -> Result<Vec<StoredMessage>, TransportError>;

    /// Append an envelope. Returns the stored record with its server ID.
    async fn create(
        &self,
        channel: ChannelId,
        envelope: EncryptedEnvelope,
    ) -> Result<StoredMessage, TransportError>;
}

/// Server-side directory of identity public keys.
#[async_trait]
pub trait IdentityDirectory: Send + Sync + 'static {
    /// Published key of a user. `None` if the user never published one.
    async fn public_key(&self, user_id: UserId)
    -> Result<Option<EncodedPublicKey>, TransportError>;

    /// Publish the calling device's public key.
    async fn publish_public_key(&self, key: EncodedPublicKey) -> Result<(), TransportError>;
}

/// Bound a collaborator call by a client-side timeout.
///
/// Elapsed time surfaces as [`TransportError::Timeout`], never as a
/// decryption error.
pub async fn with_timeout<T>(
    after: Duration,
    request: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    tokio::time::timeout(after, request).await.unwrap_or(Err(TransportError::Timeout { after }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn slow_request_times_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, TransportError>(1)
        };

        let result = with_timeout(Duration::from_secs(10), slow).await;

        assert_eq!(result, Err(TransportError::Timeout { after: Duration::from_secs(10) }));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_request_passes_through() {
        let fast = async { Ok::<_, TransportError>(7) };
        assert_eq!(with_timeout(Duration::from_secs(10), fast).await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn request_errors_are_preserved() {
        let failing =
            async { Err::<u8, _>(TransportError::Unavailable { reason: "refused".into() }) };

        let result = with_timeout(Duration::from_secs(10), failing).await;
        assert!(matches!(result, Err(TransportError::Unavailable { .. })));
    }
}
