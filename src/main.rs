//! telemetry-viewer — live gauge view of a WebSocket metrics stream.
//!
//! Run with:  `RUST_LOG=info telemetry-viewer [ws://host:port]`

mod view;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use viewer_config::{default_path, load as load_config, ViewerConfig};
use viewer_connection::ConnectionManager;

#[tokio::main]
async fn main() -> Result<()> {
    // Structured logging on stderr; stdout belongs to the view.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("telemetry-viewer v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(default_path()).unwrap_or_else(|e| {
        tracing::warn!("{e}; using defaults");
        ViewerConfig::default()
    });
    if let Some(url) = std::env::args().nth(1) {
        config.connection.url = url;
    }

    let (manager, handle) = ConnectionManager::new(&config.connection);
    let view = tokio::spawn(view::run(handle));

    manager
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Cannot listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await;

    view.abort();
    Ok(())
}
