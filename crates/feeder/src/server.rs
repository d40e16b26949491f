use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use viewer_core::Result;

/// Accept viewers forever, one task per connection.
pub async fn serve(listener: TcpListener, samples: broadcast::Sender<String>) -> Result<()> {
    loop {
        let (tcp, peer) = listener.accept().await?;
        tokio::spawn(handle_client(tcp, peer, samples.clone()));
    }
}

/// Wait for the client's greeting, then stream samples until either side
/// goes away.
async fn handle_client(tcp: TcpStream, peer: SocketAddr, samples: broadcast::Sender<String>) {
    let mut ws = match tokio_tungstenite::accept_async(tcp).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {peer} failed: {e}");
            return;
        }
    };

    match ws.next().await {
        Some(Ok(Message::Text(greeting))) => info!("{peer} connected: {greeting}"),
        Some(Ok(Message::Binary(_))) => info!("{peer} connected"),
        _ => {
            debug!("{peer} left before greeting");
            return;
        }
    }

    let mut rx = samples.subscribe();

    loop {
        tokio::select! {
            sample = rx.recv() => match sample {
                Ok(frame) => {
                    if let Err(e) = ws.send(Message::Text(frame)).await {
                        info!("{peer} closed: {e}");
                        return;
                    }
                }
                Err(RecvError::Lagged(n)) => warn!("{peer} is lagging; skipped {n} samples"),
                Err(RecvError::Closed) => {
                    let _ = ws.close(None).await;
                    return;
                }
            },
            incoming = ws.next() => match incoming {
                Some(Ok(Message::Text(text))) => debug!("{peer}: {text}"),
                Some(Ok(Message::Close(_))) | None => {
                    info!("{peer} disconnected");
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    info!("{peer} dropped: {e}");
                    return;
                }
            },
        }
    }
}
