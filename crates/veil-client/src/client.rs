//! Sequential chat client.
//!
//! Drives a [`SyncSession`] one request at a time. Each call awaits its
//! collaborator requests to completion before returning.

use std::sync::Arc;

use veil_core::{
    ConversationId, Environment, Identity, IdentityDirectory, MessageId, MessageStore, RoomLink,
    SessionError, UserId, with_timeout,
};
use veil_crypto::encrypt;

use crate::{
    composer::Composer,
    keys::{Channel, resolve_key},
    sync::{PollTicket, SyncConfig, SyncSession, decrypt_batch},
    timeline::{MessageBody, Timeline, TimelineEntry},
};

/// Handles to the server-side collaborators.
///
/// Cheap to clone; both are shared behind `Arc`.
pub struct Collaborators<S, D> {
    /// Message log
    pub store: Arc<S>,
    /// Public key directory
    pub directory: Arc<D>,
}

impl<S, D> Clone for Collaborators<S, D> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store), directory: Arc::clone(&self.directory) }
    }
}

impl<S: MessageStore, D: IdentityDirectory> Collaborators<S, D> {
    /// Bundle a store and a directory.
    pub fn new(store: Arc<S>, directory: Arc<D>) -> Self {
        Self { store, directory }
    }
}

/// Chat client for one device identity.
pub struct ChatClient<E: Environment, S, D> {
    env: E,
    identity: Identity,
    collaborators: Collaborators<S, D>,
    config: SyncConfig,
    session: SyncSession,
    composer: Composer,
}

impl<E, S, D> ChatClient<E, S, D>
where
    E: Environment,
    S: MessageStore,
    D: IdentityDirectory,
{
    /// Create a client with no channel open.
    pub fn new(
        env: E,
        identity: Identity,
        collaborators: Collaborators<S, D>,
        config: SyncConfig,
    ) -> Self {
        Self {
            env,
            identity,
            collaborators,
            config,
            session: SyncSession::new(),
            composer: Composer::new(),
        }
    }

    /// Device identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Open a link-shared room.
    pub fn open_room(&mut self, link: &RoomLink) {
        self.session.open(Channel::room(link));
    }

    /// Open a conversation with `peer`.
    pub fn open_conversation(&mut self, id: ConversationId, peer: UserId) {
        self.session.open(Channel::conversation(id, peer));
    }

    /// Rendered messages of the active channel.
    pub fn timeline(&self) -> &Timeline {
        self.session.timeline()
    }

    /// Sync state (phase, generation, active channel).
    pub fn session(&self) -> &SyncSession {
        &self.session
    }

    /// Input draft.
    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    /// Input draft, for typing.
    pub fn composer_mut(&mut self) -> &mut Composer {
        &mut self.composer
    }

    /// Fetch and decrypt anything new. Returns how many entries were added.
    ///
    /// No-op (returns 0) if no channel is open.
    ///
    /// # Errors
    ///
    /// - `Transport` if the fetch or key lookup fails; the timeline is kept
    /// - `PeerKeyMissing` / `Crypto(InvalidPeerKey)` if the conversation key
    ///   cannot be derived
    pub async fn poll_once(&mut self) -> Result<usize, SessionError> {
        let Some(ticket) = self.session.begin_poll() else {
            return Ok(0);
        };

        match self.fetch_and_decrypt(ticket).await {
            Ok(added) => Ok(added),
            Err(err) => {
                self.session.on_poll_failed(ticket);
                Err(err)
            },
        }
    }

    async fn fetch_and_decrypt(&mut self, ticket: PollTicket) -> Result<usize, SessionError> {
        let timeout = self.config.request_timeout;
        let batch = with_timeout(timeout, self.collaborators.store.list(ticket.channel())).await?;

        let Some(pending) = self.session.on_fetched(ticket, batch) else {
            return Ok(0);
        };
        if pending.is_empty() {
            return Ok(0);
        }

        let Some(channel) = self.session.active() else {
            return Ok(0);
        };
        let key = resolve_key(
            channel.keys(),
            &self.identity,
            self.collaborators.directory.as_ref(),
            timeout,
        )
        .await?;
        let batch = decrypt_batch(&key, pending);

        Ok(self.session.on_decrypted(ticket, batch.entries).unwrap_or(0))
    }

    /// Send the composer's draft to the active channel.
    ///
    /// Returns the server id of the stored message, or `None` if the draft is
    /// blank or no channel is open (the draft is left as is).
    ///
    /// # Errors
    ///
    /// Any failure restores the draft to the composer before returning. A
    /// retry encrypts again with a fresh IV.
    pub async fn send(&mut self) -> Result<Option<MessageId>, SessionError> {
        let (Some(ticket), Some(channel)) =
            (self.session.current_ticket(), self.session.active().cloned())
        else {
            return Ok(None);
        };
        let Some(plaintext) = self.composer.take() else {
            return Ok(None);
        };

        match self.deliver(&channel, &plaintext).await {
            Ok(entry) => {
                let id = entry.id;
                self.session.on_sent(ticket, entry);
                Ok(Some(id))
            },
            Err(err) => {
                tracing::warn!(
                    channel = %ticket.channel(),
                    error = %err,
                    "send failed; draft restored"
                );
                self.composer.restore(plaintext);
                Err(err)
            },
        }
    }

    /// Set the draft to `text` and send it.
    pub async fn send_text(&mut self, text: &str) -> Result<Option<MessageId>, SessionError> {
        self.composer.set(text);
        self.send().await
    }

    async fn deliver(
        &self,
        channel: &Channel,
        plaintext: &str,
    ) -> Result<TimelineEntry, SessionError> {
        let timeout = self.config.request_timeout;

        let key = resolve_key(
            channel.keys(),
            &self.identity,
            self.collaborators.directory.as_ref(),
            timeout,
        )
        .await?;
        let envelope = encrypt(plaintext, &key, &mut self.env.rng())?;
        drop(key);

        let stored =
            with_timeout(timeout, self.collaborators.store.create(channel.id(), envelope)).await?;

        tracing::debug!(channel = %channel.id(), message_id = stored.id, "message sent");

        Ok(TimelineEntry {
            id: stored.id,
            sender_id: stored.sender_id,
            created_at: stored.created_at,
            body: MessageBody::Decrypted { plaintext: plaintext.to_string() },
        })
    }
}
