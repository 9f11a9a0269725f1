//! # sotto-client
//!
//! Client core for sotto conversations.
//!
//! This crate owns everything between the socket and the screen: deriving
//! the shared key from the pre-shared password, sealing outgoing text,
//! decrypting incoming envelopes, replay handling, the local reaction view,
//! and reconnect with backoff. Terminal rendering, argument parsing, and
//! config files live outside; they hand this crate explicit parameters and
//! consume [`ClientEvent`]s.

pub mod backoff;
pub mod connection;
pub mod events;
pub mod state;

mod error;

pub use connection::{ChatClient, ClientConfig, Connection};
pub use error::ClientError;
pub use events::ClientEvent;
pub use state::{Body, ChatEntry, ChatState};
