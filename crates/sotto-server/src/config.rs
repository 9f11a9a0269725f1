//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development. TLS termination is not configured
//! here: the relay expects to sit behind a channel that is already secured.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use sotto_shared::constants::{DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_PORT, MAX_SESSIONS};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to listen on.
    /// Env: `SOTTO_BIND`
    /// Default: `0.0.0.0:7878`
    pub bind_addr: SocketAddr,

    /// Path to the append-only history log. Unset means no persistence:
    /// the conversation lives in memory and is lost on restart.
    /// Env: `SOTTO_HISTORY`
    pub history_path: Option<PathBuf>,

    /// Peer inactivity after which an arriving message is flagged unread
    /// for that peer.
    /// Env: `SOTTO_IDLE_TIMEOUT_SECS`
    /// Default: `300`
    pub idle_timeout: Duration,

    /// Maximum concurrently-admitted sessions. A conversation is two
    /// participants; raising this is for debugging only.
    /// Env: `SOTTO_MAX_SESSIONS`
    /// Default: `2`
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], DEFAULT_PORT).into(),
            history_path: None,
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            max_sessions: MAX_SESSIONS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("SOTTO_BIND") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.bind_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid SOTTO_BIND, using default");
            }
        }

        if let Ok(path) = std::env::var("SOTTO_HISTORY") {
            if !path.is_empty() {
                config.history_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(val) = std::env::var("SOTTO_IDLE_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.idle_timeout = Duration::from_secs(secs);
            } else {
                tracing::warn!(value = %val, "Invalid SOTTO_IDLE_TIMEOUT_SECS, using default");
            }
        }

        if let Ok(val) = std::env::var("SOTTO_MAX_SESSIONS") {
            if let Ok(n) = val.parse::<usize>() {
                config.max_sessions = n;
            } else {
                tracing::warn!(value = %val, "Invalid SOTTO_MAX_SESSIONS, using default");
            }
        }

        config
    }
}
