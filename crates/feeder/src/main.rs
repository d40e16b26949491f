//! viewer-feeder — replays event timestamps from a CSV file as live
//! telemetry samples over WebSocket.
//!
//! Run with:  `RUST_LOG=info viewer-feeder [data.csv]`

mod replay;
mod server;
mod stats;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use viewer_config::{default_path, load as load_config, ViewerConfig};

/// Samples buffered per client before it starts skipping.
const SAMPLE_BACKLOG: usize = 128;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("viewer-feeder v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(default_path()).unwrap_or_else(|e| {
        tracing::warn!("{e}; using defaults");
        ViewerConfig::default()
    });
    if let Some(path) = std::env::args().nth(1) {
        config.feeder.data_file = PathBuf::from(path);
    }

    let path = &config.feeder.data_file;
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read '{}'", path.display()))?;
    let timestamps = replay::parse_timestamps(&raw);
    tracing::info!("Loaded {} timestamps from {}", timestamps.len(), path.display());

    let listener = TcpListener::bind(&config.feeder.listen)
        .await
        .with_context(|| format!("cannot listen on {}", config.feeder.listen))?;
    tracing::info!("Serving samples on ws://{}", listener.local_addr()?);

    let (tx, _) = broadcast::channel(SAMPLE_BACKLOG);
    replay::spawn(timestamps, tx.clone());

    tokio::select! {
        res = server::serve(listener, tx) => res?,
        res = tokio::signal::ctrl_c() => {
            res?;
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}
