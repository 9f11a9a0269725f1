//! Local decrypted view of the conversation.
//!
//! [`ChatState`] is a pure state machine: it consumes [`ServerFrame`]s and
//! produces [`ClientEvent`]s, decrypting inline with the explicitly-passed
//! key. A failed decryption never tears anything down; the entry is kept
//! as [`Body::Unreadable`] so the UI can show that the password does not
//! match. Reconnecting builds a fresh `ChatState` from replay; nothing
//! carries over.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use sotto_shared::crypto::{self, aad, SymmetricKey};
use sotto_shared::protocol::{MessageRecord, ReactionRecord, ServerFrame};
use sotto_shared::types::MessageId;
use sotto_store::ReactionIndex;

use crate::events::ClientEvent;

/// Decrypted message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    /// Wrong key, corrupted bytes, or a tampered envelope.
    Unreadable,
}

/// One message as the client sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub id: MessageId,
    pub sender: String,
    pub body: Body,
    pub timestamp: DateTime<Utc>,
    pub unread: bool,
}

pub struct ChatState {
    key: SymmetricKey,
    messages: Vec<ChatEntry>,
    /// Emoji-keyed local view; the relay only ever saw opaque tokens.
    reactions: ReactionIndex,
    replay_done: bool,
}

impl ChatState {
    pub fn new(key: SymmetricKey) -> Self {
        Self {
            key,
            messages: Vec::new(),
            reactions: ReactionIndex::new(),
            replay_done: false,
        }
    }

    /// Feed one frame from the relay; returns the event to surface, if any.
    /// Replayed messages are absorbed silently until the replay marker.
    pub fn apply(&mut self, frame: ServerFrame) -> Option<ClientEvent> {
        match frame {
            ServerFrame::Hello { message_count } => {
                debug!(message_count, "Relay greeting");
                None
            }
            ServerFrame::Message { message, unread } => {
                let entry = self.ingest_message(message, unread);
                if self.replay_done {
                    Some(ClientEvent::Message {
                        id: entry.id,
                        sender: entry.sender,
                        body: entry.body,
                        timestamp: entry.timestamp,
                        unread: entry.unread,
                    })
                } else {
                    None
                }
            }
            ServerFrame::Reaction { record } => {
                let emoji = self.ingest_reaction(&record);
                if self.replay_done {
                    Some(ClientEvent::Reaction {
                        message_id: record.message_id,
                        sender: record.sender,
                        emoji,
                    })
                } else {
                    None
                }
            }
            ServerFrame::ReactionRejected { message_id } => {
                Some(ClientEvent::ReactionRejected { message_id })
            }
            ServerFrame::ReplayDone { count } => {
                self.replay_done = true;
                Some(ClientEvent::HistoryReplayed { count })
            }
            ServerFrame::Rejected { reason } => {
                Some(ClientEvent::Rejected { reason })
            }
        }
    }

    fn ingest_message(&mut self, record: MessageRecord, unread: bool) -> ChatEntry {
        let body = match crypto::open(
            &self.key,
            &record.envelope,
            &aad::message(&record.sender),
        ) {
            Ok(plaintext) => match String::from_utf8(plaintext) {
                Ok(text) => Body::Text(text),
                Err(_) => Body::Unreadable,
            },
            Err(_) => Body::Unreadable,
        };

        for reaction in &record.reactions {
            self.ingest_reaction(reaction);
        }

        let entry = ChatEntry {
            id: record.id,
            sender: record.sender,
            body,
            timestamp: record.timestamp,
            unread,
        };
        self.messages.push(entry.clone());
        entry
    }

    /// Decrypt a reaction and merge it into the emoji view. Returns the
    /// emoji, or `None` if the envelope would not open.
    fn ingest_reaction(&mut self, record: &ReactionRecord) -> Option<String> {
        let plaintext = crypto::open(
            &self.key,
            &record.envelope,
            &aad::reaction(&record.sender),
        )
        .ok()?;
        let emoji = String::from_utf8(plaintext).ok()?;

        self.reactions.add(record.message_id, &emoji, &record.sender);
        Some(emoji)
    }

    pub fn messages(&self) -> &[ChatEntry] {
        &self.messages
    }

    /// `emoji -> senders` for one message, like the relay's snapshot but
    /// keyed by the decrypted emoji.
    pub fn reactions_for(&self, id: MessageId) -> BTreeMap<String, BTreeSet<String>> {
        self.reactions.snapshot(id)
    }

    pub fn replay_complete(&self) -> bool {
        self.replay_done
    }
}
