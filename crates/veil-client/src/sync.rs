//! Message sync state machine.
//!
//! Sans-IO: [`SyncSession`] never awaits. Drivers ask it for a
//! [`PollTicket`], perform the fetch and decryption themselves, and hand the
//! results back together with the ticket. Every view switch bumps a
//! generation counter, so results tagged with an older ticket are discarded
//! on arrival instead of leaking into the newly active channel.
//!
//! ```text
//!        begin_poll          on_fetched (pending)
//! Idle ─────────────► Polling ────────────────► Decrypting
//!  ▲                     │ on_fetched (nothing new)  │
//!  │                     │ on_poll_failed            │ on_decrypted
//!  └─────────────────────┴───────────────────────────┘
//! ```

use std::{collections::HashSet, time::Duration};

use veil_core::{ChannelId, StoredMessage};
use veil_crypto::{SymmetricKey, decrypt};

use crate::{
    keys::Channel,
    timeline::{MessageBody, Timeline, TimelineEntry},
};

/// Timing knobs for the sync drivers.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Interval between background polls.
    pub poll_interval: Duration,
    /// Client-side bound on every collaborator request.
    pub request_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_secs(2), request_timeout: Duration::from_secs(10) }
    }
}

/// Where the session is in its poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No poll in flight.
    Idle,
    /// Waiting for the message store.
    Polling,
    /// Waiting for a decrypt batch.
    Decrypting,
}

/// Tag tying an in-flight request to the view it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTicket {
    channel: ChannelId,
    generation: u64,
}

impl PollTicket {
    /// Channel the request was issued for.
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// View generation the request was issued in.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Result of decrypting one batch.
#[derive(Debug, Clone, Default)]
pub struct DecryptedBatch {
    /// One entry per input message, in input order.
    pub entries: Vec<TimelineEntry>,
    /// Messages that decrypted.
    pub decrypted: usize,
    /// Messages rendered as failures.
    pub failed: usize,
}

/// Decrypt every message of a batch with one key.
///
/// A failure is confined to its own message: it becomes
/// [`MessageBody::Failed`] and the rest of the batch proceeds.
pub fn decrypt_batch(key: &SymmetricKey, pending: Vec<StoredMessage>) -> DecryptedBatch {
    let mut batch =
        DecryptedBatch { entries: Vec::with_capacity(pending.len()), ..Default::default() };

    for message in pending {
        let body = match decrypt(&message.envelope, key) {
            Ok(plaintext) => {
                batch.decrypted += 1;
                MessageBody::Decrypted { plaintext }
            },
            Err(err) => {
                batch.failed += 1;
                tracing::debug!(message_id = message.id, error = %err, "message failed to decrypt");
                MessageBody::Failed { reason: err.to_string() }
            },
        };

        batch.entries.push(TimelineEntry {
            id: message.id,
            sender_id: message.sender_id,
            created_at: message.created_at,
            body,
        });
    }

    tracing::debug!(decrypted = batch.decrypted, failed = batch.failed, "batch decrypted");
    batch
}

/// Per-view sync state.
#[derive(Debug)]
pub struct SyncSession {
    active: Option<Channel>,
    generation: u64,
    phase: SyncPhase,
    timeline: Timeline,
}

impl Default for SyncSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncSession {
    /// Session with no channel open.
    pub fn new() -> Self {
        Self { active: None, generation: 0, phase: SyncPhase::Idle, timeline: Timeline::new() }
    }

    /// Attach the view to `channel`.
    ///
    /// Bumps the generation, which invalidates every outstanding ticket, and
    /// clears the timeline. Returns the new generation.
    pub fn open(&mut self, channel: Channel) -> u64 {
        self.generation += 1;
        self.phase = SyncPhase::Idle;
        self.timeline.clear();
        tracing::debug!(channel = %channel.id(), generation = self.generation, "view opened");
        self.active = Some(channel);
        self.generation
    }

    /// Detach the view. Outstanding tickets become stale.
    pub fn close(&mut self) {
        self.generation += 1;
        self.phase = SyncPhase::Idle;
        self.timeline.clear();
        self.active = None;
    }

    /// Currently attached channel.
    pub fn active(&self) -> Option<&Channel> {
        self.active.as_ref()
    }

    /// Current phase.
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Rendered messages of the active channel.
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Ticket for the active view without starting a poll (send path).
    pub fn current_ticket(&self) -> Option<PollTicket> {
        let channel = self.active.as_ref()?.id();
        Some(PollTicket { channel, generation: self.generation })
    }

    /// Returns true if `ticket` belongs to the active view.
    pub fn is_current(&self, ticket: PollTicket) -> bool {
        self.current_ticket() == Some(ticket)
    }

    /// Start a poll.
    ///
    /// Returns `None` if no channel is open or a poll for this view is
    /// already in flight.
    pub fn begin_poll(&mut self) -> Option<PollTicket> {
        if self.phase != SyncPhase::Idle {
            return None;
        }

        let ticket = self.current_ticket()?;
        self.phase = SyncPhase::Polling;
        Some(ticket)
    }

    /// Fetch completed. Returns the messages that still need decrypting.
    ///
    /// Already rendered ids and repeats within the batch are dropped. Returns
    /// `None` if the ticket is stale; the batch is then discarded.
    pub fn on_fetched(
        &mut self,
        ticket: PollTicket,
        batch: Vec<StoredMessage>,
    ) -> Option<Vec<StoredMessage>> {
        if !self.accepts(ticket, SyncPhase::Polling) {
            tracing::debug!(channel = %ticket.channel, "discarding stale fetch");
            return None;
        }

        let mut seen = HashSet::new();
        let pending: Vec<_> = batch
            .into_iter()
            .filter(|message| !self.timeline.contains(message.id) && seen.insert(message.id))
            .collect();

        self.phase = if pending.is_empty() { SyncPhase::Idle } else { SyncPhase::Decrypting };
        Some(pending)
    }

    /// Decrypt batch completed. Returns how many entries were new.
    ///
    /// Returns `None` if the ticket is stale; nothing is applied.
    pub fn on_decrypted(
        &mut self,
        ticket: PollTicket,
        entries: Vec<TimelineEntry>,
    ) -> Option<usize> {
        if !self.accepts(ticket, SyncPhase::Decrypting) {
            tracing::debug!(channel = %ticket.channel, "discarding stale decrypt batch");
            return None;
        }

        self.phase = SyncPhase::Idle;
        Some(self.timeline.extend(entries))
    }

    /// Fetch or key resolution failed. Returns true if the failure concerns
    /// the active view (and should be reported).
    pub fn on_poll_failed(&mut self, ticket: PollTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.phase = SyncPhase::Idle;
        true
    }

    /// Own message stored by the server. Returns true if it was rendered.
    pub fn on_sent(&mut self, ticket: PollTicket, entry: TimelineEntry) -> bool {
        self.is_current(ticket) && self.timeline.insert(entry)
    }

    fn accepts(&self, ticket: PollTicket, phase: SyncPhase) -> bool {
        self.is_current(ticket) && self.phase == phase
    }
}

#[cfg(test)]
mod tests {
    use veil_crypto::{EncryptedEnvelope, RoomKey};

    use super::*;

    fn room(id: u128) -> Channel {
        let key = RoomKey::decode("AQIDBAUGBwgJCgsMDQ4PEBESExQVFhcYGRobHB0eHyA").unwrap();
        Channel::room(&veil_core::RoomLink::new("https://veil.example", id, key))
    }

    fn stored(id: u64) -> StoredMessage {
        StoredMessage {
            id,
            sender_id: 9,
            envelope: EncryptedEnvelope { ciphertext: String::new(), iv: String::new() },
            created_at: id * 10,
        }
    }

    fn entry(id: u64) -> TimelineEntry {
        TimelineEntry {
            id,
            sender_id: 9,
            created_at: id * 10,
            body: MessageBody::Decrypted { plaintext: "x".into() },
        }
    }

    #[test]
    fn default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn no_poll_without_channel() {
        let mut session = SyncSession::new();
        assert_eq!(session.begin_poll(), None);
    }

    #[test]
    fn full_cycle() {
        let mut session = SyncSession::new();
        session.open(room(1));

        let ticket = session.begin_poll().unwrap();
        assert_eq!(session.phase(), SyncPhase::Polling);

        let pending = session.on_fetched(ticket, vec![stored(1), stored(2)]).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(session.phase(), SyncPhase::Decrypting);

        assert_eq!(session.on_decrypted(ticket, vec![entry(1), entry(2)]), Some(2));
        assert_eq!(session.phase(), SyncPhase::Idle);
        assert_eq!(session.timeline().len(), 2);
    }

    #[test]
    fn at_most_one_poll_in_flight() {
        let mut session = SyncSession::new();
        session.open(room(1));

        assert!(session.begin_poll().is_some());
        assert_eq!(session.begin_poll(), None);
    }

    #[test]
    fn known_ids_are_not_decrypted_again() {
        let mut session = SyncSession::new();
        session.open(room(1));
        let ticket = session.begin_poll().unwrap();
        session.on_fetched(ticket, vec![stored(1)]).unwrap();
        session.on_decrypted(ticket, vec![entry(1)]).unwrap();

        let ticket = session.begin_poll().unwrap();
        let pending = session.on_fetched(ticket, vec![stored(1), stored(2), stored(2)]).unwrap();

        let ids: Vec<_> = pending.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn nothing_new_returns_to_idle() {
        let mut session = SyncSession::new();
        session.open(room(1));
        let ticket = session.begin_poll().unwrap();

        let pending = session.on_fetched(ticket, Vec::new()).unwrap();

        assert!(pending.is_empty());
        assert_eq!(session.phase(), SyncPhase::Idle);
    }

    #[test]
    fn switch_discards_in_flight_fetch() {
        let mut session = SyncSession::new();
        session.open(room(1));
        let stale = session.begin_poll().unwrap();

        session.open(room(2));

        assert_eq!(session.on_fetched(stale, vec![stored(1)]), None);
        assert!(session.timeline().is_empty());
        assert!(session.begin_poll().is_some());
    }

    #[test]
    fn switch_discards_in_flight_decrypt() {
        let mut session = SyncSession::new();
        session.open(room(1));
        let stale = session.begin_poll().unwrap();
        session.on_fetched(stale, vec![stored(1)]).unwrap();

        session.open(room(2));

        assert_eq!(session.on_decrypted(stale, vec![entry(1)]), None);
        assert!(session.timeline().is_empty());
    }

    #[test]
    fn reopening_same_channel_still_invalidates() {
        let mut session = SyncSession::new();
        session.open(room(1));
        let stale = session.begin_poll().unwrap();

        session.open(room(1));

        assert!(!session.is_current(stale));
        assert!(!session.on_poll_failed(stale));
    }

    #[test]
    fn send_after_switch_is_not_rendered() {
        let mut session = SyncSession::new();
        session.open(room(1));
        let ticket = session.current_ticket().unwrap();
        session.open(room(2));

        assert!(!session.on_sent(ticket, entry(5)));
        assert!(session.timeline().is_empty());
    }

    #[test]
    fn batch_failures_are_isolated() {
        let key = RoomKey::decode("AQIDBAUGBwgJCgsMDQ4PEBESExQVFhcYGRobHB0eHyA").unwrap();
        let mut rng = rand::rngs::OsRng;
        let good = veil_crypto::encrypt("fine", key.key(), &mut rng).unwrap();

        let mut messages = vec![stored(1), stored(2), stored(3)];
        messages[0].envelope = good.clone();
        messages[2].envelope = good;

        let batch = decrypt_batch(key.key(), messages);

        assert_eq!((batch.decrypted, batch.failed), (2, 1));
        assert!(batch.entries[0].body.is_decrypted());
        assert!(!batch.entries[1].body.is_decrypted());
        assert_eq!(batch.entries[2].body.plaintext(), Some("fine"));
    }
}
