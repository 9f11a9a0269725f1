//! # sotto-server
//!
//! Relay server for sotto conversations.
//!
//! The relay admits at most two sessions, assigns monotonic ids to their
//! encrypted messages, persists everything to an append-only history log,
//! and forwards envelopes verbatim. It holds no key material and cannot
//! read anything it relays.

pub mod config;
pub mod idle;
pub mod relay;

mod error;

pub use config::ServerConfig;
pub use error::ServerError;
pub use relay::RelayServer;
