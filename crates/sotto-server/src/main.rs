//! # sottod
//!
//! Relay daemon for sotto: forwards opaque encrypted envelopes between
//! exactly two participants and persists them to an append-only history
//! log. The daemon never holds key material: all encryption and
//! decryption happens on the clients.

use tracing::info;
use tracing_subscriber::EnvFilter;

use sotto_server::{RelayServer, ServerConfig};
use sotto_store::HistoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sotto_server=debug")),
        )
        .init();

    info!("Starting sotto relay v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    let store = HistoryStore::open(config.history_path.as_deref())?;
    let server = RelayServer::bind(&config, store).await?;

    tokio::select! {
        result = server.serve() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Relay server failed");
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
