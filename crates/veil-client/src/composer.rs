//! Input draft for the send path.

/// Text the user is typing.
///
/// Sending takes the draft; a failed send hands it back through
/// [`Composer::restore`] so nothing typed is ever lost.
#[derive(Debug, Default, Clone)]
pub struct Composer {
    draft: String,
}

impl Composer {
    /// Empty composer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current draft.
    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Replace the draft.
    pub fn set(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Append typed text.
    pub fn push_str(&mut self, text: &str) {
        self.draft.push_str(text);
    }

    /// Take the draft for sending, leaving the composer empty.
    ///
    /// Returns `None` (and keeps the draft) if it is only whitespace.
    pub fn take(&mut self) -> Option<String> {
        if self.draft.trim().is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.draft))
    }

    /// Put an unsent message back in front of anything typed since.
    pub fn restore(&mut self, unsent: String) {
        let typed_since = std::mem::replace(&mut self.draft, unsent);
        self.draft.push_str(&typed_since);
    }
}
