//! Veil Client
//!
//! Message sync and send path for rooms and conversations.
//!
//! # Architecture
//!
//! Protocol logic lives in the pure [`SyncSession`] state machine: it hands
//! out [`PollTicket`]s, filters fetched batches against the [`Timeline`], and
//! applies decrypted results only if their ticket is still current. Two
//! drivers feed it:
//!
//! - [`ChatClient`]: sequential API, one await at a time. Used by the CLI and
//!   scenario tests.
//! - [`SyncLoop`]: tokio task that polls on an interval, runs fetches,
//!   decrypt batches and sends concurrently, and reports [`SyncUpdate`]s over
//!   a channel.
//!
//! ```text
//! open(channel) ──► SyncSession ◄── on_fetched / on_decrypted (ticketed)
//!                        │
//!        begin_poll ─────┴──► MessageStore::list ──► decrypt_batch
//! ```
//!
//! Keys are resolved per batch and per send by [`resolve_key`]; conversation
//! keys are derived afresh every time and never cached.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod composer;
mod keys;
mod runtime;
mod sync;
mod timeline;

pub use client::{ChatClient, Collaborators};
pub use composer::Composer;
pub use keys::{Channel, ChannelKeys, publish_identity, resolve_key};
pub use runtime::{SyncCommand, SyncHandle, SyncLoop, SyncUpdate};
pub use sync::{DecryptedBatch, PollTicket, SyncConfig, SyncPhase, SyncSession, decrypt_batch};
pub use timeline::{MessageBody, Timeline, TimelineEntry};
