//! Socket handling: join, send, receive, reconnect.
//!
//! The key is derived once from the password and salt and passed explicitly
//! into every envelope call; it never leaves the process and is never
//! written anywhere. A lost connection surfaces as
//! [`ClientError::ConnectionLost`]; reconnecting is a fresh session join
//! that replays history into a fresh [`ChatState`](crate::ChatState).

use std::net::SocketAddr;

use chrono::Utc;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{info, warn};

use sotto_shared::crypto::{self, aad, derive_key, KdfParams, SymmetricKey};
use sotto_shared::framing::{FrameReader, FrameWriter};
use sotto_shared::protocol::{ClientFrame, ServerFrame};
use sotto_shared::types::MessageId;

use crate::backoff;
use crate::error::ClientError;
use crate::state::ChatState;

/// Everything the core needs; ownership of where these values come from
/// (flags, config file, prompt) is outside this crate.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: SocketAddr,
    pub display_name: String,
    pub password: String,
    pub salt: String,
    pub kdf: KdfParams,
}

/// One live session with the relay.
pub struct Connection {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
    name: String,
    key: SymmetricKey,
}

impl Connection {
    /// Connect and announce the display name.
    pub async fn connect(
        addr: SocketAddr,
        name: &str,
        key: SymmetricKey,
    ) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();

        let mut connection = Self {
            reader: FrameReader::new(read_half),
            writer: FrameWriter::new(write_half),
            name: name.to_string(),
            key,
        };
        connection
            .writer
            .write(&ClientFrame::Join {
                sender: name.to_string(),
            })
            .await?;
        Ok(connection)
    }

    /// Seal and send one chat message.
    pub async fn send_message(&mut self, text: &str) -> Result<(), ClientError> {
        let envelope = crypto::seal(&self.key, text.as_bytes(), &aad::message(&self.name))?;
        self.writer
            .write(&ClientFrame::Message {
                sender: self.name.clone(),
                envelope,
                timestamp: Utc::now(),
            })
            .await?;
        Ok(())
    }

    /// Seal and send one reaction.
    ///
    /// The nonce is derived from the `(message_id, emoji, sender)` triple,
    /// so resending the same reaction produces byte-identical frames and
    /// the relay can merge duplicates without reading them.
    pub async fn send_reaction(
        &mut self,
        message_id: MessageId,
        emoji: &str,
    ) -> Result<(), ClientError> {
        let nonce = crypto::reaction_nonce(&self.key, message_id, emoji, &self.name);
        let envelope = crypto::seal_with_nonce(
            &self.key,
            nonce,
            emoji.as_bytes(),
            &aad::reaction(&self.name),
        )?;
        self.writer
            .write(&ClientFrame::Reaction {
                message_id,
                sender: self.name.clone(),
                envelope,
            })
            .await?;
        Ok(())
    }

    /// Await the next frame. A closed stream is [`ClientError::ConnectionLost`].
    pub async fn next_frame(&mut self) -> Result<ServerFrame, ClientError> {
        match self.reader.read().await? {
            Some(frame) => Ok(frame),
            None => Err(ClientError::ConnectionLost),
        }
    }
}

/// Factory holding the derived key; builds a fresh session (and fresh
/// state) per connect, so reconnects carry nothing over.
pub struct ChatClient {
    config: ClientConfig,
    key: SymmetricKey,
}

impl ChatClient {
    /// Derive the shared key (the slow part) once up front.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let key = derive_key(
            config.password.as_bytes(),
            config.salt.as_bytes(),
            &config.kdf,
        )?;
        Ok(Self { config, key })
    }

    pub async fn connect(&self) -> Result<(Connection, ChatState), ClientError> {
        let connection = Connection::connect(
            self.config.server_addr,
            &self.config.display_name,
            self.key,
        )
        .await?;
        Ok((connection, ChatState::new(self.key)))
    }

    /// Retry connecting with the capped Fibonacci schedule, up to
    /// `max_attempts` tries.
    pub async fn reconnect(
        &self,
        max_attempts: usize,
    ) -> Result<(Connection, ChatState), ClientError> {
        let mut last_error = ClientError::ConnectionLost;
        for attempt in 0..max_attempts {
            match self.connect().await {
                Ok(session) => {
                    info!(attempt, "Reconnected");
                    return Ok(session);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Reconnect attempt failed");
                    last_error = e;
                }
            }
            if attempt + 1 < max_attempts {
                tokio::time::sleep(backoff::delay(attempt)).await;
            }
        }
        Err(last_error)
    }
}
