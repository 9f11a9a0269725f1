use thiserror::Error;

use sotto_shared::types::MessageId;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Generic I/O error (opening or appending to the log).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A log line could not be parsed.
    #[error("Corrupt history record at line {line}: {source}")]
    CorruptRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Record serialization failure.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A reaction referenced a message id the store has never assigned.
    #[error("Unknown message id: {0}")]
    UnknownMessage(MessageId),

    /// A persisted message id was not strictly ascending during load.
    #[error("Out-of-order message id in history log: {0}")]
    OutOfOrderId(MessageId),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
