use serde::{Deserialize, Serialize};

use sotto_shared::protocol::{MessageRecord, ReactionRecord};

/// One line of the append-only history log.
///
/// Messages are persisted without their reaction sets; reactions follow as
/// separate records in merge order, so replaying the log front to back
/// reconstructs the exact public state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogRecord {
    Message(MessageRecord),
    Reaction(ReactionRecord),
}
