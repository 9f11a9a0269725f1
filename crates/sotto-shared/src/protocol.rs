//! Wire protocol frames exchanged between client and relay.
//!
//! Frames are JSON objects tagged by a `type` field; binary fields (nonce,
//! ciphertext) are base64. The relay re-encodes frame metadata but never
//! inspects or alters envelope bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::Envelope;
use crate::types::MessageId;

/// Frames sent client → relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Announces the display name for this session.
    Join { sender: String },

    /// An encrypted chat message. No id on this leg; the relay assigns one.
    Message {
        sender: String,
        #[serde(flatten)]
        envelope: Envelope,
        timestamp: DateTime<Utc>,
    },

    /// An encrypted reaction to a previously relayed message. The emoji is
    /// inside the envelope, authenticated like message text.
    Reaction {
        message_id: MessageId,
        sender: String,
        #[serde(flatten)]
        envelope: Envelope,
    },
}

/// Frames sent relay → client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// First frame after admission.
    Hello { message_count: usize },

    /// A relayed message, during history replay or live. `unread` is a
    /// per-recipient delivery annotation and is never persisted.
    Message {
        message: MessageRecord,
        unread: bool,
    },

    /// A merged reaction, broadcast to every session so UIs converge.
    Reaction { record: ReactionRecord },

    /// The referenced message id does not exist. Sent to the originator only.
    ReactionRejected { message_id: MessageId },

    /// End of history replay.
    ReplayDone { count: usize },

    /// Admission refused (conversation at capacity); the relay closes after
    /// sending this.
    Rejected { reason: String },
}

/// One relayed message as stored and replayed. Immutable once assigned,
/// except for its attached reaction set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageRecord {
    pub id: MessageId,
    pub sender: String,
    #[serde(flatten)]
    pub envelope: Envelope,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<ReactionRecord>,
}

/// One merged reaction. The envelope holds the encrypted emoji; the relay
/// indexes it only by its opaque token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReactionRecord {
    pub message_id: MessageId,
    pub sender: String,
    #[serde(flatten)]
    pub envelope: Envelope,
}

impl ReactionRecord {
    /// Opaque merge key: identical logical reactions produce identical
    /// envelopes (deterministic nonce), so identical tokens.
    pub fn token(&self) -> String {
        use base64::Engine;
        let mut bytes =
            Vec::with_capacity(self.envelope.nonce.len() + self.envelope.ciphertext.len());
        bytes.extend_from_slice(&self.envelope.nonce);
        bytes.extend_from_slice(&self.envelope.ciphertext);
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }
}

/// Serde helper: `Vec<u8>` as standard base64.
pub mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    const ENGINE: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ENGINE.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        ENGINE
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
