use std::fmt;

/// Lifecycle of the single viewer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Everything that can move a [`ConnectionState`] forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// WebSocket handshake completed.
    Established,
    /// Dial or WebSocket handshake failed.
    ConnectFailed,
    /// Peer sent a Close frame or the stream ended.
    PeerClosed,
    /// Local shutdown.
    CloseRequested,
    /// Read or write failed on an open connection.
    TransportError,
    /// The old connection has been closed and dropped.
    TeardownComplete,
    /// Start dialing a fresh connection.
    Reconnect,
}

impl ConnectionState {
    /// Transition function.  Returns `None` when `event` is not valid in `self`.
    #[must_use]
    pub fn on(self, event: LifecycleEvent) -> Option<ConnectionState> {
        use ConnectionState::*;
        use LifecycleEvent::*;

        match (self, event) {
            (Connecting, Established) => Some(Open),
            (Connecting, ConnectFailed | CloseRequested) => Some(Closed),
            (Open, PeerClosed | CloseRequested | TransportError) => Some(Closing),
            (Closing, TeardownComplete) => Some(Closed),
            (Closed, Reconnect) => Some(Connecting),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionState::*;
    use super::LifecycleEvent::*;

    #[test]
    fn happy_path_cycle() {
        let mut state = Connecting;
        for event in [Established, PeerClosed, TeardownComplete, Reconnect] {
            state = state.on(event).unwrap();
        }
        assert_eq!(state, Connecting);
    }

    #[test]
    fn every_close_reason_goes_through_closing() {
        for event in [PeerClosed, CloseRequested, TransportError] {
            assert_eq!(Open.on(event), Some(Closing));
        }
    }

    #[test]
    fn failed_dial_skips_open() {
        assert_eq!(Connecting.on(ConnectFailed), Some(Closed));
        assert_eq!(Closed.on(Reconnect), Some(Connecting));
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        assert_eq!(Connecting.on(PeerClosed), None);
        assert_eq!(Open.on(Established), None);
        assert_eq!(Open.on(Reconnect), None);
        assert_eq!(Closing.on(Reconnect), None);
        assert_eq!(Closed.on(Established), None);
    }
}
