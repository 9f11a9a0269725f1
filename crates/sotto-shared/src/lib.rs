//! # sotto-shared
//!
//! Types and crypto shared between the sotto relay server and client.
//!
//! The relay only ever sees opaque envelopes: both participants derive the
//! same symmetric key from a pre-shared password and salt, and every message
//! or reaction body is sealed with XChaCha20-Poly1305 before it touches the
//! wire. This crate holds the key derivation, the envelope format, the wire
//! protocol frames, and the length-prefixed frame codec.

pub mod constants;
pub mod crypto;
pub mod framing;
pub mod protocol;
pub mod types;

mod error;

pub use error::{CryptoError, ProtocolError};
