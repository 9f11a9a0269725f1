//! Relay state machine: admission, replay, ordered broadcast.
//!
//! Every connection gets a dedicated writer task fed by an unbounded queue;
//! the read loops run independently. Identifier assignment, history append,
//! and broadcast enqueueing all happen under one store lock, so the order
//! each recipient sees on the wire is exactly the assignment order, for any
//! interleaving of concurrent senders. The relay re-encodes frame metadata
//! but never touches envelope bytes.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use sotto_shared::framing::{FrameReader, FrameWriter};
use sotto_shared::protocol::{ClientFrame, ReactionRecord, ServerFrame};
use sotto_store::{HistoryStore, Merge, StoreError};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::idle::IdleTracker;

/// Ephemeral identifier for one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One admitted session: display name (once announced) and its frame queue.
struct SessionHandle {
    name: Option<String>,
    tx: mpsc::UnboundedSender<ServerFrame>,
}

struct RelayState {
    store: Mutex<HistoryStore>,
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
    idle: Mutex<IdleTracker>,
    idle_timeout: Duration,
    max_sessions: usize,
}

pub struct RelayServer {
    listener: TcpListener,
    state: Arc<RelayState>,
}

impl RelayServer {
    /// Bind the listen socket and wrap the (already loaded) history store.
    pub async fn bind(config: &ServerConfig, store: HistoryStore) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        info!(addr = %listener.local_addr()?, "Relay listening");

        Ok(Self {
            listener,
            state: Arc::new(RelayState {
                store: Mutex::new(store),
                sessions: Mutex::new(HashMap::new()),
                idle: Mutex::new(IdleTracker::new()),
                idle_timeout: config.idle_timeout,
                max_sessions: config.max_sessions,
            }),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the listener fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let state = self.state.clone();
            tokio::spawn(async move {
                handle_connection(state, stream, addr).await;
            });
        }
    }
}

async fn handle_connection(state: Arc<RelayState>, stream: TcpStream, addr: SocketAddr) {
    let session = SessionId::new();
    let (read_half, write_half) = stream.into_split();
    let mut reader = FrameReader::new(read_half);
    let mut writer = FrameWriter::new(write_half);

    let Some(rx) = admit(&state, session).await else {
        warn!(addr = %addr, "Connection refused: conversation at capacity");
        let _ = writer
            .write(&ServerFrame::Rejected {
                reason: "conversation is full".to_string(),
            })
            .await;
        return;
    };
    info!(session = %session, addr = %addr, "Session admitted");

    let write_task = tokio::spawn(drain_frames(rx, writer));

    loop {
        match reader.read::<ClientFrame>().await {
            Ok(Some(frame)) => dispatch(&state, session, frame).await,
            Ok(None) => {
                debug!(session = %session, "Session closed by peer");
                break;
            }
            Err(e) => {
                warn!(session = %session, error = %e, "Dropping session on frame error");
                break;
            }
        }
    }

    teardown(&state, session).await;
    // Removing the handle drops the queue sender; the writer drains and exits.
    let _ = write_task.await;
}

/// Admit the session if the conversation has room, queueing the full history
/// replay before registration so no live broadcast can get ahead of it.
async fn admit(
    state: &RelayState,
    session: SessionId,
) -> Option<mpsc::UnboundedReceiver<ServerFrame>> {
    let store = state.store.lock().await;
    let mut sessions = state.sessions.lock().await;

    if sessions.len() >= state.max_sessions {
        return None;
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let count = store.message_count();

    let _ = tx.send(ServerFrame::Hello {
        message_count: count,
    });
    for message in store.messages() {
        let _ = tx.send(ServerFrame::Message {
            message: message.clone(),
            unread: false,
        });
    }
    let _ = tx.send(ServerFrame::ReplayDone { count });

    sessions.insert(session, SessionHandle { name: None, tx });
    state.idle.lock().await.touch(session);
    Some(rx)
}

async fn drain_frames(
    mut rx: mpsc::UnboundedReceiver<ServerFrame>,
    mut writer: FrameWriter<OwnedWriteHalf>,
) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = writer.write(&frame).await {
            debug!(error = %e, "Session write failed");
            break;
        }
    }
}

async fn dispatch(state: &RelayState, origin: SessionId, frame: ClientFrame) {
    match frame {
        ClientFrame::Join { sender } => {
            info!(session = %origin, sender = %sender, "Session joined");
            if let Some(handle) = state.sessions.lock().await.get_mut(&origin) {
                handle.name = Some(sender);
            }
            state.idle.lock().await.touch(origin);
        }
        ClientFrame::Message {
            sender,
            envelope,
            timestamp,
        } => {
            // Critical section: id assignment, durable append, and broadcast
            // enqueueing are serialized together under the store lock.
            let mut store = state.store.lock().await;
            let record = store.append_message(&sender, envelope, timestamp);
            debug!(id = %record.id, sender = %record.sender, "Message relayed");
            if store.is_degraded() {
                warn!(id = %record.id, "History degraded; relayed without durability");
            }

            let sessions = state.sessions.lock().await;
            let mut idle = state.idle.lock().await;
            idle.touch(origin);

            for (sid, handle) in sessions.iter() {
                // Idleness is evaluated lazily, here at delivery time; the
                // flag is a per-recipient annotation, never persisted.
                let unread = *sid != origin && idle.is_idle(*sid, state.idle_timeout);
                let _ = handle.tx.send(ServerFrame::Message {
                    message: record.clone(),
                    unread,
                });
            }
        }
        ClientFrame::Reaction {
            message_id,
            sender,
            envelope,
        } => {
            let record = ReactionRecord {
                message_id,
                sender,
                envelope,
            };

            let mut store = state.store.lock().await;
            match store.add_reaction(record.clone()) {
                Ok(Merge::Changed) => {
                    debug!(message_id = %record.message_id, "Reaction merged");
                    let sessions = state.sessions.lock().await;
                    state.idle.lock().await.touch(origin);
                    for handle in sessions.values() {
                        let _ = handle.tx.send(ServerFrame::Reaction {
                            record: record.clone(),
                        });
                    }
                }
                Ok(Merge::Unchanged) => {
                    debug!(message_id = %record.message_id, "Duplicate reaction ignored");
                    state.idle.lock().await.touch(origin);
                }
                Err(StoreError::UnknownMessage(id)) => {
                    warn!(session = %origin, message_id = %id, "Reaction to unknown message");
                    let sessions = state.sessions.lock().await;
                    if let Some(handle) = sessions.get(&origin) {
                        let _ = handle.tx.send(ServerFrame::ReactionRejected { message_id: id });
                    }
                }
                Err(e) => {
                    warn!(session = %origin, error = %e, "Reaction merge failed");
                }
            }
        }
    }
}

async fn teardown(state: &RelayState, session: SessionId) {
    let removed = state.sessions.lock().await.remove(&session);
    state.idle.lock().await.remove(session);

    let name = removed
        .and_then(|h| h.name)
        .unwrap_or_else(|| "<unnamed>".to_string());
    info!(session = %session, sender = %name, "Session removed");
}
