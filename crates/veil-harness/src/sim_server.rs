//! In-memory collaborator server.
//!
//! One [`SimServer`] holds the message log and the identity directory. Each
//! user talks to it through a [`SimSession`], which implements both
//! collaborator traits and stamps the user's id on what it creates.
//!
//! Fault injection:
//! - fixed latency on every request, plus extra latency per channel
//! - taking the server offline
//! - failing the next N creates
//! - corrupting a stored envelope's IV
//! - delivering every message twice

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;
use veil_core::{
    ChannelId, IdentityDirectory, MessageId, MessageStore, StoredMessage, TransportError, UserId,
};
use veil_crypto::{EncodedPublicKey, EncryptedEnvelope};

/// First `created_at` handed out (Unix milliseconds).
const EPOCH_MILLIS: u64 = 1_700_000_000_000;

#[derive(Default)]
struct ServerState {
    messages: HashMap<ChannelId, Vec<StoredMessage>>,
    directory: HashMap<UserId, EncodedPublicKey>,
    next_id: MessageId,
    clock: u64,
    offline: bool,
    failing_creates: usize,
    duplicate_delivery: bool,
    latency: Duration,
    channel_latency: HashMap<ChannelId, Duration>,
    request_log: Vec<String>,
    list_calls: HashMap<ChannelId, usize>,
}

/// Shared in-memory server.
#[derive(Clone, Default)]
pub struct SimServer {
    state: Arc<Mutex<ServerState>>,
}

impl SimServer {
    /// Empty server with no latency and no faults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collaborator handle acting as `user_id`.
    pub fn session(&self, user_id: UserId) -> SimSession {
        SimSession { server: self.clone(), user_id }
    }

    /// Latency added to every request.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.lock().await.latency = latency;
    }

    /// Extra latency for requests touching one channel.
    pub async fn set_channel_latency(&self, channel: ChannelId, latency: Duration) {
        self.state.lock().await.channel_latency.insert(channel, latency);
    }

    /// While offline every request fails with `Unavailable`.
    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }

    /// Make the next `count` creates fail with a 503.
    pub async fn fail_next_creates(&self, count: usize) {
        self.state.lock().await.failing_creates = count;
    }

    /// Return every message twice from `list`.
    pub async fn set_duplicate_delivery(&self, enabled: bool) {
        self.state.lock().await.duplicate_delivery = enabled;
    }

    /// Overwrite the IV of a stored message with a valid-looking wrong one.
    ///
    /// Returns false if no such message exists.
    pub async fn corrupt_iv(&self, channel: ChannelId, id: MessageId) -> bool {
        let mut state = self.state.lock().await;
        let Some(message) =
            state.messages.get_mut(&channel).and_then(|log| log.iter_mut().find(|m| m.id == id))
        else {
            return false;
        };
        message.envelope.iv = "AAAAAAAAAAAAAAAA".to_string();
        true
    }

    /// Insert a message as if another client had sent it.
    pub async fn inject(
        &self,
        channel: ChannelId,
        sender_id: UserId,
        envelope: EncryptedEnvelope,
    ) -> StoredMessage {
        let mut state = self.state.lock().await;
        store_message(&mut state, channel, sender_id, envelope)
    }

    /// Stored messages of a channel, in creation order.
    pub async fn messages(&self, channel: ChannelId) -> Vec<StoredMessage> {
        self.state.lock().await.messages.get(&channel).cloned().unwrap_or_default()
    }

    /// Every request body received, as JSON, in arrival order.
    pub async fn request_log(&self) -> Vec<String> {
        self.state.lock().await.request_log.clone()
    }

    /// How many times `list` was called for a channel.
    pub async fn list_calls(&self, channel: ChannelId) -> usize {
        self.state.lock().await.list_calls.get(&channel).copied().unwrap_or(0)
    }

    /// Published key of a user.
    pub async fn published_key(&self, user_id: UserId) -> Option<EncodedPublicKey> {
        self.state.lock().await.directory.get(&user_id).cloned()
    }

    /// Apply configured latency, then fail if offline.
    async fn admit(&self, channel: Option<ChannelId>) -> Result<(), TransportError> {
        let delay = {
            let state = self.state.lock().await;
            let extra = channel.and_then(|c| state.channel_latency.get(&c).copied());
            state.latency + extra.unwrap_or_default()
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.state.lock().await.offline {
            return Err(TransportError::Unavailable { reason: "server offline".into() });
        }
        Ok(())
    }
}

fn store_message(
    state: &mut ServerState,
    channel: ChannelId,
    sender_id: UserId,
    envelope: EncryptedEnvelope,
) -> StoredMessage {
    state.next_id += 1;
    state.clock += 1_000;

    let message = StoredMessage {
        id: state.next_id,
        sender_id,
        envelope,
        created_at: EPOCH_MILLIS + state.clock,
    };
    state.messages.entry(channel).or_default().push(message.clone());
    message
}

/// A user's connection to the [`SimServer`].
#[derive(Clone)]
pub struct SimSession {
    server: SimServer,
    user_id: UserId,
}

impl SimSession {
    /// User this session acts as.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

#[async_trait]
impl MessageStore for SimSession {
    async fn list(&self, channel: ChannelId) -> Result<Vec<StoredMessage>, TransportError> {
        self.server.admit(Some(channel)).await?;

        let mut state = self.server.state.lock().await;
        *state.list_calls.entry(channel).or_default() += 1;

        let mut messages = state.messages.get(&channel).cloned().unwrap_or_default();
        messages.sort_by_key(|m| (m.created_at, m.id));
        if state.duplicate_delivery {
            let again = messages.clone();
            messages.extend(again);
        }
        Ok(messages)
    }

    async fn create(
        &self,
        channel: ChannelId,
        envelope: EncryptedEnvelope,
    ) -> Result<StoredMessage, TransportError> {
        self.server.admit(Some(channel)).await?;

        let mut state = self.server.state.lock().await;
        let body = serde_json::to_string(&envelope)
            .map_err(|e| TransportError::Rejected { status: 400, reason: e.to_string() })?;
        state.request_log.push(body);

        if state.failing_creates > 0 {
            state.failing_creates -= 1;
            return Err(TransportError::Rejected { status: 503, reason: "injected failure".into() });
        }

        let message = store_message(&mut state, channel, self.user_id, envelope);
        tracing::trace!(%channel, message_id = message.id, "sim server stored message");
        Ok(message)
    }
}

#[async_trait]
impl IdentityDirectory for SimSession {
    async fn public_key(
        &self,
        user_id: UserId,
    ) -> Result<Option<EncodedPublicKey>, TransportError> {
        self.server.admit(None).await?;
        Ok(self.server.state.lock().await.directory.get(&user_id).cloned())
    }

    async fn publish_public_key(&self, key: EncodedPublicKey) -> Result<(), TransportError> {
        self.server.admit(None).await?;

        let mut state = self.server.state.lock().await;
        state.request_log.push(format!("{{\"publicKey\":\"{key}\"}}"));
        state.directory.insert(self.user_id, key);
        Ok(())
    }
}
