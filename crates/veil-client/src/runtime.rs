//! Background sync loop.
//!
//! A tokio task owning one [`SyncSession`]. It polls once immediately when a
//! channel is opened or focused, then every [`SyncConfig::poll_interval`].
//! Fetches, decrypt batches and sends run concurrently in a
//! `FuturesUnordered`; each carries the [`PollTicket`] it was issued with, and
//! the session discards anything that completes after a view switch.

use std::time::Duration;

use futures::{FutureExt, StreamExt, future::BoxFuture, stream::FuturesUnordered};
use tokio::sync::mpsc;
use veil_core::{
    ChannelId, Environment, Identity, IdentityDirectory, MessageId, MessageStore, SessionError,
    StoredMessage, TransportError, with_timeout,
};
use veil_crypto::encrypt;

use crate::{
    client::Collaborators,
    keys::{Channel, resolve_key},
    sync::{DecryptedBatch, PollTicket, SyncConfig, SyncSession, decrypt_batch},
    timeline::{MessageBody, TimelineEntry},
};

const CHANNEL_CAPACITY: usize = 32;

/// Requests from the view to the loop.
#[derive(Debug)]
pub enum SyncCommand {
    /// Attach to a channel and poll immediately.
    Open(Channel),
    /// View regained focus; poll now.
    Focus,
    /// Encrypt and send a message to the active channel.
    Send {
        /// Message text
        plaintext: String,
    },
    /// Detach from the current channel.
    Close,
}

/// Notifications from the loop to the view.
#[derive(Debug, Clone)]
pub enum SyncUpdate {
    /// Timeline of the active channel changed. Full snapshot.
    Timeline {
        /// Channel the snapshot belongs to
        channel: ChannelId,
        /// Ordered entries
        entries: Vec<TimelineEntry>,
    },
    /// Message stored by the server.
    Sent {
        /// Channel it was sent to
        channel: ChannelId,
        /// Server-assigned id
        id: MessageId,
    },
    /// Send failed. The view should restore `plaintext` to its input.
    SendFailed {
        /// Channel it was meant for; `None` if no channel was open
        channel: Option<ChannelId>,
        /// The unsent text
        plaintext: String,
        /// What went wrong
        error: SessionError,
    },
    /// Key material problem. The view should leave the channel.
    Fatal {
        /// Affected channel
        channel: ChannelId,
        /// What went wrong
        error: SessionError,
    },
    /// Poll failed on the network. The loop retries on the next tick.
    TransportFailure {
        /// Affected channel
        channel: ChannelId,
        /// What went wrong
        error: TransportError,
    },
}

/// Handle to a running [`SyncLoop`].
pub struct SyncHandle {
    /// Send commands to the loop.
    pub commands: mpsc::Sender<SyncCommand>,
    /// Receive updates from the loop.
    pub updates: mpsc::Receiver<SyncUpdate>,
    abort_handle: tokio::task::AbortHandle,
}

impl SyncHandle {
    /// Stop the loop. In-flight requests are dropped.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }
}

enum Completion {
    Fetched { ticket: PollTicket, result: Result<Vec<StoredMessage>, SessionError> },
    Decrypted { ticket: PollTicket, result: Result<DecryptedBatch, SessionError> },
    Sent { ticket: PollTicket, plaintext: String, result: Result<StoredMessage, SessionError> },
}

/// Background driver for a [`SyncSession`].
pub struct SyncLoop<E: Environment, S, D> {
    env: E,
    identity: Identity,
    collaborators: Collaborators<S, D>,
    config: SyncConfig,
    session: SyncSession,
    in_flight: FuturesUnordered<BoxFuture<'static, Completion>>,
    updates: mpsc::Sender<SyncUpdate>,
    last_poll: Option<E::Instant>,
}

impl<E, S, D> SyncLoop<E, S, D>
where
    E: Environment,
    S: MessageStore,
    D: IdentityDirectory,
{
    /// Spawn the loop on the current tokio runtime.
    pub fn spawn(
        env: E,
        identity: Identity,
        collaborators: Collaborators<S, D>,
        config: SyncConfig,
    ) -> SyncHandle {
        let (commands_tx, commands_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (updates_tx, updates_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let sync_loop = Self {
            env,
            identity,
            collaborators,
            config,
            session: SyncSession::new(),
            in_flight: FuturesUnordered::new(),
            updates: updates_tx,
            last_poll: None,
        };
        let task = tokio::spawn(sync_loop.run(commands_rx));

        SyncHandle { commands: commands_tx, updates: updates_rx, abort_handle: task.abort_handle() }
    }

    /// Run until the command channel closes or the update receiver is dropped.
    async fn run(mut self, mut commands: mpsc::Receiver<SyncCommand>) {
        let env = self.env.clone();

        loop {
            let until_poll = self.until_next_poll();
            let has_timer = until_poll.is_some();

            let keep_going = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => false,
                },

                Some(done) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.handle_completion(done).await
                }

                () = env.sleep(until_poll.unwrap_or(Duration::ZERO)), if has_timer => {
                    self.poll();
                    true
                }
            };

            if !keep_going {
                break;
            }
        }

        tracing::debug!("sync loop stopped");
    }

    fn until_next_poll(&self) -> Option<Duration> {
        let last_poll = self.last_poll?;
        let elapsed = self.env.now() - last_poll;
        Some(self.config.poll_interval.saturating_sub(elapsed))
    }

    async fn handle_command(&mut self, command: SyncCommand) -> bool {
        match command {
            SyncCommand::Open(channel) => {
                let id = channel.id();
                self.session.open(channel);
                self.poll();
                self.publish_timeline(id).await
            },
            SyncCommand::Focus => {
                self.poll();
                true
            },
            SyncCommand::Send { plaintext } => self.send(plaintext).await,
            SyncCommand::Close => {
                self.session.close();
                self.last_poll = None;
                true
            },
        }
    }

    /// Start a poll if none is in flight, and schedule the next tick.
    fn poll(&mut self) {
        if self.session.active().is_none() {
            self.last_poll = None;
            return;
        }
        self.last_poll = Some(self.env.now());

        let Some(ticket) = self.session.begin_poll() else {
            return;
        };

        let store = self.collaborators.store.clone();
        let timeout = self.config.request_timeout;
        self.in_flight.push(
            async move {
                let result = with_timeout(timeout, store.list(ticket.channel()))
                    .await
                    .map_err(SessionError::from);
                Completion::Fetched { ticket, result }
            }
            .boxed(),
        );
    }

    async fn send(&mut self, plaintext: String) -> bool {
        let (Some(ticket), Some(channel)) =
            (self.session.current_ticket(), self.session.active().cloned())
        else {
            let error = SessionError::Transport(TransportError::Unavailable {
                reason: "no channel open".into(),
            });
            return self.emit(SyncUpdate::SendFailed { channel: None, plaintext, error }).await;
        };

        let env = self.env.clone();
        let identity = self.identity.clone();
        let collaborators = self.collaborators.clone();
        let timeout = self.config.request_timeout;

        self.in_flight.push(
            async move {
                let result = async {
                    let key = resolve_key(
                        channel.keys(),
                        &identity,
                        collaborators.directory.as_ref(),
                        timeout,
                    )
                    .await?;
                    let envelope = encrypt(&plaintext, &key, &mut env.rng())?;
                    drop(key);
                    let stored =
                        with_timeout(timeout, collaborators.store.create(channel.id(), envelope))
                            .await?;
                    Ok::<_, SessionError>(stored)
                }
                .await;
                Completion::Sent { ticket, plaintext, result }
            }
            .boxed(),
        );
        true
    }

    async fn handle_completion(&mut self, done: Completion) -> bool {
        match done {
            Completion::Fetched { ticket, result } => match result {
                Ok(batch) => {
                    let Some(pending) = self.session.on_fetched(ticket, batch) else {
                        return true;
                    };
                    if !pending.is_empty() {
                        self.decrypt(ticket, pending);
                    }
                    true
                },
                Err(error) => self.poll_failed(ticket, error).await,
            },
            Completion::Decrypted { ticket, result } => match result {
                Ok(batch) => match self.session.on_decrypted(ticket, batch.entries) {
                    Some(added) if added > 0 => self.publish_timeline(ticket.channel()).await,
                    _ => true,
                },
                Err(error) => self.poll_failed(ticket, error).await,
            },
            Completion::Sent { ticket, plaintext, result } => match result {
                Ok(stored) => {
                    let id = stored.id;
                    let entry = TimelineEntry {
                        id,
                        sender_id: stored.sender_id,
                        created_at: stored.created_at,
                        body: MessageBody::Decrypted { plaintext },
                    };
                    let rendered = self.session.on_sent(ticket, entry);

                    if !self.emit(SyncUpdate::Sent { channel: ticket.channel(), id }).await {
                        return false;
                    }
                    if rendered {
                        return self.publish_timeline(ticket.channel()).await;
                    }
                    true
                },
                Err(error) => {
                    tracing::warn!(channel = %ticket.channel(), %error, "send failed");
                    let channel = Some(ticket.channel());
                    self.emit(SyncUpdate::SendFailed { channel, plaintext, error }).await
                },
            },
        }
    }

    fn decrypt(&mut self, ticket: PollTicket, pending: Vec<StoredMessage>) {
        let Some(channel) = self.session.active().cloned() else {
            return;
        };
        let identity = self.identity.clone();
        let directory = self.collaborators.directory.clone();
        let timeout = self.config.request_timeout;

        self.in_flight.push(
            async move {
                let result =
                    resolve_key(channel.keys(), &identity, directory.as_ref(), timeout)
                        .await
                        .map(|key| decrypt_batch(&key, pending));
                Completion::Decrypted { ticket, result }
            }
            .boxed(),
        );
    }

    async fn poll_failed(&mut self, ticket: PollTicket, error: SessionError) -> bool {
        if !self.session.on_poll_failed(ticket) {
            return true;
        }

        let channel = ticket.channel();
        let update = match error {
            SessionError::Transport(error) => {
                tracing::debug!(%channel, %error, "poll failed; retrying on next tick");
                SyncUpdate::TransportFailure { channel, error }
            },
            error => {
                tracing::warn!(%channel, %error, "channel unusable");
                if error.is_fatal() {
                    self.session.close();
                    self.last_poll = None;
                }
                SyncUpdate::Fatal { channel, error }
            },
        };
        self.emit(update).await
    }

    async fn publish_timeline(&mut self, channel: ChannelId) -> bool {
        let entries = self.session.timeline().entries().to_vec();
        self.emit(SyncUpdate::Timeline { channel, entries }).await
    }

    /// Returns false once the view has gone away.
    async fn emit(&mut self, update: SyncUpdate) -> bool {
        self.updates.send(update).await.is_ok()
    }
}
