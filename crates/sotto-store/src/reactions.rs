//! Idempotent reaction merging.
//!
//! The index is `message_id -> key -> set of senders`; merging the same
//! triple twice is a set union, so idempotence falls out of the structure
//! rather than duplicate checks. The key is an opaque string: the relay
//! indexes the base64 token of the encrypted emoji, clients index the
//! decrypted emoji itself.

use std::collections::{BTreeMap, BTreeSet};

use sotto_shared::types::MessageId;

/// Outcome of a merge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    /// The triple was new and has been added.
    Changed,
    /// The triple was already present; the index is unchanged.
    Unchanged,
}

#[derive(Debug, Clone, Default)]
pub struct ReactionIndex {
    entries: BTreeMap<MessageId, BTreeMap<String, BTreeSet<String>>>,
}

impl ReactionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a `(message_id, key, sender)` triple.
    pub fn add(&mut self, message_id: MessageId, key: &str, sender: &str) -> Merge {
        let senders = self
            .entries
            .entry(message_id)
            .or_default()
            .entry(key.to_string())
            .or_default();

        if senders.insert(sender.to_string()) {
            Merge::Changed
        } else {
            Merge::Unchanged
        }
    }

    /// Current reaction state for one message. Empty map if none.
    pub fn snapshot(&self, message_id: MessageId) -> BTreeMap<String, BTreeSet<String>> {
        self.entries.get(&message_id).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
