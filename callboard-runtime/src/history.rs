//! Persisted history truncation.

use crate::types::{Message, Role};
use tracing::{debug, info};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Keeps the most recent `max_messages` entries of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryPolicy {
    max_messages: usize,
}

impl HistoryPolicy {
    pub fn new(max_messages: usize) -> Self {
        Self { max_messages }
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    /// Truncate `messages` to the limit.
    ///
    /// The result never starts with a tool result whose originating tool-call
    /// message was cut away.
    pub fn apply(&self, mut messages: Vec<Message>) -> Vec<Message> {
        if messages.len() <= self.max_messages {
            debug!(
                "History length {} within limit {}",
                messages.len(),
                self.max_messages
            );
            return messages;
        }

        let original = messages.len();
        let mut kept = messages.split_off(original - self.max_messages);
        let orphans = kept.iter().take_while(|m| m.role == Role::Tool).count();
        kept.drain(..orphans);

        crate::metrics::increment_history_truncation_count();
        info!("Truncated history from {} to {} messages", original, kept.len());
        kept
    }
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
