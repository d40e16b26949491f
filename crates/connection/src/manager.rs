use crate::backoff::Backoff;
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use viewer_config::ConnectionConfig;
use viewer_core::{decode, ConnectionState, DisplayBuffer, GaugeLine, LifecycleEvent};

/// Sent to the peer as soon as a connection opens.
pub const HANDSHAKE: &str = "Connection opened";
/// Sent to the peer, best-effort, when a connection is torn down.
pub const FAREWELL: &str = "Connection closed";

/// Upper bound on the farewell + close exchange with a dying peer.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How one connection attempt ended.
enum Outcome {
    /// Shutdown was requested; stop for good.
    Shutdown,
    /// Connection failed or went away.  `opened` is true if it got as far as
    /// delivering the handshake.
    Retry { opened: bool },
}

/// Owns the viewer's single WebSocket connection, its [`ConnectionState`] and
/// the [`DisplayBuffer`] fed by it.
///
/// Readers never touch either directly; they get a [`ViewerHandle`] that sees
/// published copies.
pub struct ConnectionManager {
    url:      String,
    backoff:  Backoff,
    state:    ConnectionState,
    buffer:   DisplayBuffer,
    state_tx: watch::Sender<ConnectionState>,
    lines_tx: watch::Sender<Vec<String>>,
}

/// Read-only view of a running [`ConnectionManager`].
#[derive(Debug, Clone)]
pub struct ViewerHandle {
    state_rx: watch::Receiver<ConnectionState>,
    lines_rx: watch::Receiver<Vec<String>>,
}

impl ViewerHandle {
    /// Current display lines, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines_rx.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Wait until the display lines change.  Returns `false` once the
    /// manager has gone away.
    pub async fn changed(&mut self) -> bool {
        self.lines_rx.changed().await.is_ok()
    }

    /// Wait until the connection state changes.  Returns `false` once the
    /// manager has gone away.
    pub async fn state_changed(&mut self) -> bool {
        self.state_rx.changed().await.is_ok()
    }
}

impl ConnectionManager {
    pub fn new(config: &ConnectionConfig) -> (Self, ViewerHandle) {
        let state = ConnectionState::Connecting;
        let (state_tx, state_rx) = watch::channel(state);
        let (lines_tx, lines_rx) = watch::channel(Vec::new());

        let manager = Self {
            url: config.url.clone(),
            backoff: Backoff::new(
                Duration::from_millis(config.backoff_initial_ms),
                Duration::from_millis(config.backoff_max_ms),
            ),
            state,
            buffer: DisplayBuffer::new(),
            state_tx,
            lines_tx,
        };

        (manager, ViewerHandle { state_rx, lines_rx })
    }

    /// Keep a connection alive until `shutdown` resolves, then close it.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let opened = match self.session(shutdown.as_mut()).await {
                Outcome::Shutdown => {
                    info!("Viewer connection shut down");
                    return;
                }
                Outcome::Retry { opened } => opened,
            };

            let delay = if opened {
                self.backoff.reset();
                Duration::ZERO
            } else {
                self.backoff.next_delay()
            };

            if !delay.is_zero() {
                debug!("Retrying {} in {delay:?}", self.url);
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = shutdown.as_mut() => {
                        info!("Viewer connection shut down");
                        return;
                    }
                }
            }

            self.transition(LifecycleEvent::Reconnect);
        }
    }

    /// One full `Connecting → … → Closed` pass.
    async fn session<F>(&mut self, mut shutdown: Pin<&mut F>) -> Outcome
    where
        F: Future<Output = ()>,
    {
        let url = self.url.clone();
        let dial = tokio::select! {
            res = connect_async(url.as_str()) => res,
            () = shutdown.as_mut() => {
                self.transition(LifecycleEvent::CloseRequested);
                return Outcome::Shutdown;
            }
        };

        let mut ws = match dial {
            Ok((ws, _)) => ws,
            Err(e) => {
                error!("Cannot connect to {}: {e}", self.url);
                self.transition(LifecycleEvent::ConnectFailed);
                return Outcome::Retry { opened: false };
            }
        };

        self.transition(LifecycleEvent::Established);
        info!("Connected to {}", self.url);

        if let Err(e) = ws.send(Message::Text(HANDSHAKE.into())).await {
            warn!("Handshake not delivered: {e}");
            self.teardown(ws, LifecycleEvent::TransportError).await;
            return Outcome::Retry { opened: false };
        }

        let reason = loop {
            tokio::select! {
                frame = ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_frame(&text),
                    Some(Ok(Message::Close(_))) | None => break LifecycleEvent::PeerClosed,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Connection to {} failed: {e}", self.url);
                        break LifecycleEvent::TransportError;
                    }
                },
                () = shutdown.as_mut() => break LifecycleEvent::CloseRequested,
            }
        };

        self.teardown(ws, reason).await;

        if reason == LifecycleEvent::CloseRequested {
            Outcome::Shutdown
        } else {
            warn!("Connection to {} lost; reconnecting…", self.url);
            Outcome::Retry { opened: true }
        }
    }

    /// `Open → Closing → Closed`.  The stream is consumed so nothing can
    /// read from it afterwards.
    async fn teardown(&mut self, mut ws: WsStream, reason: LifecycleEvent) {
        self.transition(reason);

        let goodbye = async {
            if let Err(e) = ws.send(Message::Text(FAREWELL.into())).await {
                debug!("Farewell not delivered: {e}");
            }
            let _ = ws.close(None).await;
        };
        if tokio::time::timeout(CLOSE_TIMEOUT, goodbye).await.is_err() {
            debug!("Close handshake timed out");
        }

        self.transition(LifecycleEvent::TeardownComplete);
    }

    /// Decode → render → append.  Malformed frames are logged and dropped.
    fn handle_frame(&mut self, frame: &str) {
        let sample = match decode(frame) {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Dropping frame: {e}");
                return;
            }
        };

        let line = GaugeLine::render(sample);
        debug!(msg_num = sample.msg_num, position = line.position, "sample rendered");

        self.buffer.append(line.into_text());
        self.lines_tx.send_replace(self.buffer.snapshot());
    }

    fn transition(&mut self, event: LifecycleEvent) {
        match self.state.on(event) {
            Some(next) => {
                debug!("Connection {} → {next} ({event:?})", self.state);
                self.state = next;
                self.state_tx.send_replace(next);
            }
            None => warn!("Ignoring {event:?} while {}", self.state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn config(url: String) -> ConnectionConfig {
        ConnectionConfig {
            url,
            backoff_initial_ms: 10,
            backoff_max_ms: 50,
        }
    }

    async fn bind() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
        let (tcp, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        tokio_tungstenite::accept_async(tcp).await.unwrap()
    }

    async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> String {
        loop {
            match timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap() {
                Message::Text(text) => return text,
                _ => continue,
            }
        }
    }

    fn frame(msg_num: u64, delta: f64) -> Message {
        Message::Text(format!(
            r#"{{"msg_num":{msg_num},"delta":{delta},"count":3,"mean":0.5,"std_dev":0.1}}"#
        ))
    }

    async fn wait_for_lines(handle: &mut ViewerHandle, n: usize) {
        timeout(WAIT, async {
            while handle.snapshot().len() < n {
                assert!(handle.changed().await, "manager stopped");
            }
        })
        .await
        .expect("lines never arrived");
    }

    #[tokio::test]
    async fn frames_are_rendered_in_order_and_survive_reconnect() {
        let (listener, url) = bind().await;
        let (manager, mut handle) = ConnectionManager::new(&config(url));
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(manager.run(async {
            let _ = stop_rx.await;
        }));

        let mut ws = accept(&listener).await;
        assert_eq!(next_text(&mut ws).await, HANDSHAKE);
        assert_eq!(handle.state(), ConnectionState::Open);

        ws.send(frame(1, 0.5)).await.unwrap();
        ws.send(Message::Text("not a sample".into())).await.unwrap();
        ws.send(frame(2, 2.5)).await.unwrap();
        wait_for_lines(&mut handle, 2).await;

        let lines = handle.snapshot();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("num:+1 d:+0.5 n:+03 "));
        assert!(lines[1].starts_with("num:+2 d:+2.5 n:+03 "));
        assert!(lines[1].contains("-|] 2000ms"));

        // Peer goes away; a fresh connection must follow with its own handshake.
        ws.close(None).await.unwrap();
        drop(ws);

        let mut ws = accept(&listener).await;
        assert_eq!(next_text(&mut ws).await, HANDSHAKE);
        assert_eq!(handle.snapshot().len(), 2);

        ws.send(frame(3, 0.0)).await.unwrap();
        wait_for_lines(&mut handle, 3).await;
        assert!(handle.snapshot()[2].starts_with("num:+3 "));

        stop_tx.send(()).unwrap();
        timeout(WAIT, task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn shutdown_sends_farewell_and_closes() {
        let (listener, url) = bind().await;
        let (manager, handle) = ConnectionManager::new(&config(url));
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(manager.run(async {
            let _ = stop_rx.await;
        }));

        let mut ws = accept(&listener).await;
        assert_eq!(next_text(&mut ws).await, HANDSHAKE);

        stop_tx.send(()).unwrap();
        assert_eq!(next_text(&mut ws).await, FAREWELL);

        timeout(WAIT, task).await.unwrap().unwrap();
        assert_eq!(handle.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn corrupt_stream_triggers_reconnect() {
        use tokio::io::AsyncWriteExt;

        let (listener, url) = bind().await;
        let (manager, mut handle) = ConnectionManager::new(&config(url));
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(manager.run(async {
            let _ = stop_rx.await;
        }));

        let mut ws = accept(&listener).await;
        assert_eq!(next_text(&mut ws).await, HANDSHAKE);
        ws.send(frame(1, 0.5)).await.unwrap();
        wait_for_lines(&mut handle, 1).await;

        // Reserved bits + reserved opcode: a protocol error on the reader side,
        // then the socket goes away without a close handshake.
        ws.get_mut().write_all(&[0xff, 0xff, 0x00, 0x00]).await.unwrap();
        ws.get_mut().flush().await.unwrap();
        drop(ws);

        let mut ws = accept(&listener).await;
        assert_eq!(next_text(&mut ws).await, HANDSHAKE);
        assert_eq!(handle.state(), ConnectionState::Open);
        let lines = handle.snapshot();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("num:+1 "));

        stop_tx.send(()).unwrap();
        timeout(WAIT, task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn shutdown_while_dialing_closes() {
        // Accepted by the kernel backlog, but the WebSocket handshake never
        // gets an answer, so the dial stays pending.
        let (listener, url) = bind().await;
        let (manager, handle) = ConnectionManager::new(&config(url));
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(manager.run(async {
            let _ = stop_rx.await;
        }));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.state(), ConnectionState::Connecting);

        stop_tx.send(()).unwrap();
        timeout(WAIT, task).await.unwrap().unwrap();
        assert_eq!(handle.state(), ConnectionState::Closed);
        assert!(handle.snapshot().is_empty());
        drop(listener);
    }

    #[tokio::test]
    async fn keeps_retrying_an_unreachable_endpoint() {
        let (listener, url) = bind().await;
        drop(listener);

        let (manager, mut handle) = ConnectionManager::new(&config(url));
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(manager.run(async {
            let _ = stop_rx.await;
        }));

        // Several failed rounds without ever opening.
        timeout(WAIT, async {
            for _ in 0..6 {
                assert!(handle.state_changed().await);
                assert_ne!(handle.state(), ConnectionState::Open);
            }
        })
        .await
        .expect("manager stopped retrying");

        stop_tx.send(()).unwrap();
        timeout(WAIT, task).await.unwrap().unwrap();
        assert!(handle.snapshot().is_empty());
    }

    #[test]
    fn malformed_frames_never_reach_the_buffer() {
        let (mut manager, handle) = ConnectionManager::new(&config("ws://unused".into()));
        manager.handle_frame(r#"{"msg_num":1,"delta":0.5}"#);
        manager.handle_frame(r#"{"msg_num":"x","delta":0.5,"count":1,"mean":0,"std_dev":0}"#);
        manager.handle_frame("Connection opened");
        assert!(handle.snapshot().is_empty());

        manager.handle_frame(r#"{"msg_num":5,"delta":1.0,"count":3,"mean":2.5,"std_dev":0.1}"#);
        let lines = handle.snapshot();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("num:+5 d:+1 n:+03 m:+2.5 o:+0.1 0ms ["));
    }

    #[test]
    fn buffer_is_capped_at_twenty_five_lines() {
        let (mut manager, handle) = ConnectionManager::new(&config("ws://unused".into()));
        for n in 1..=30 {
            manager.handle_frame(&format!(
                r#"{{"msg_num":{n},"delta":0.1,"count":{n},"mean":0.1,"std_dev":0}}"#
            ));
        }
        let lines = handle.snapshot();
        assert_eq!(lines.len(), 25);
        assert!(lines[0].starts_with("num:+6 "));
        assert!(lines[24].starts_with("num:+30 "));
    }
}
