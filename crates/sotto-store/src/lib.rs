//! # sotto-store
//!
//! Durable history for the sotto relay.
//!
//! The store is an append-only JSON-Lines log: one record per line, either a
//! message or a reaction, in exact append order. Loading replays the log to
//! rebuild the in-memory message list, the reaction index, and the next
//! message id (`max(persisted ids) + 1`). Everything the store holds is
//! ciphertext; it never has the means to read any of it.

pub mod history;
pub mod models;
pub mod reactions;

mod error;

pub use error::{Result, StoreError};
pub use history::HistoryStore;
pub use reactions::{Merge, ReactionIndex};
