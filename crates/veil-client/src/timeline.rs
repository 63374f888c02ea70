//! Ordered, de-duplicated view of a channel's messages.

use std::{collections::HashSet, fmt};

use veil_core::{MessageId, UserId};

/// Outcome of decrypting one message.
#[derive(Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Authenticated plaintext.
    Decrypted {
        /// Message text
        plaintext: String,
    },
    /// Rendered as an explicit "could not decrypt" marker.
    Failed {
        /// Why decryption failed (never contains plaintext)
        reason: String,
    },
}

impl MessageBody {
    /// Plaintext, if decryption succeeded.
    pub fn plaintext(&self) -> Option<&str> {
        match self {
            Self::Decrypted { plaintext } => Some(plaintext),
            Self::Failed { .. } => None,
        }
    }

    /// Returns true if decryption succeeded.
    pub fn is_decrypted(&self) -> bool {
        matches!(self, Self::Decrypted { .. })
    }
}

impl fmt::Debug for MessageBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decrypted { plaintext } => {
                f.debug_struct("Decrypted").field("len", &plaintext.len()).finish()
            },
            Self::Failed { reason } => f.debug_struct("Failed").field("reason", reason).finish(),
        }
    }
}

/// One rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    /// Server-assigned ID
    pub id: MessageId,
    /// Author
    pub sender_id: UserId,
    /// Creation time (Unix milliseconds)
    pub created_at: u64,
    /// Decrypted text or failure marker
    pub body: MessageBody,
}

/// Messages of the active channel in receipt order.
///
/// # Invariants
///
/// - Entries are sorted by `(created_at, id)` ascending
/// - No two entries share an id
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
    ids: HashSet<MessageId>,
}

impl Timeline {
    /// Empty timeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if a message with this id is already rendered.
    pub fn contains(&self, id: MessageId) -> bool {
        self.ids.contains(&id)
    }

    /// Insert an entry at its ordered position.
    ///
    /// Returns false (and changes nothing) if the id is already present.
    pub fn insert(&mut self, entry: TimelineEntry) -> bool {
        if !self.ids.insert(entry.id) {
            return false;
        }

        let key = (entry.created_at, entry.id);
        let position = self.entries.partition_point(|e| (e.created_at, e.id) < key);
        self.entries.insert(position, entry);
        true
    }

    /// Insert several entries. Returns how many were new.
    pub fn extend(&mut self, entries: impl IntoIterator<Item = TimelineEntry>) -> usize {
        let mut added = 0;
        for entry in entries {
            if self.insert(entry) {
                added += 1;
            }
        }
        added
    }

    /// Entries in order.
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been rendered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop everything (view switched to another channel).
    pub fn clear(&mut self) {
        self.entries.clear();
        self.ids.clear();
    }
}
