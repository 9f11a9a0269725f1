//! Events the client core hands to its consumer (typically a UI).

use chrono::{DateTime, Utc};

use sotto_shared::types::MessageId;

use crate::state::Body;

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// History replay finished; the local state now mirrors the relay.
    HistoryReplayed { count: usize },

    /// A live message arrived and was decrypted (or marked unreadable).
    Message {
        id: MessageId,
        sender: String,
        body: Body,
        timestamp: DateTime<Utc>,
        unread: bool,
    },

    /// A reaction was merged. `emoji` is `None` when the reaction envelope
    /// could not be decrypted; such reactions are not merged into the view.
    Reaction {
        message_id: MessageId,
        sender: String,
        emoji: Option<String>,
    },

    /// The relay does not know the referenced message id.
    ReactionRejected { message_id: MessageId },

    /// The relay refused admission (conversation at capacity).
    Rejected { reason: String },
}
