use std::fmt;
use tokio::sync::watch;

/// Lifecycle of a [`Session`](super::Session).
///
/// `Disconnected -> Connecting -> Connected -> Closing -> Closed`. A failed
/// handshake returns to `Disconnected`; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
}

impl ConnectionState {
    pub fn can_connect(self) -> bool {
        self == ConnectionState::Disconnected
    }

    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Closed
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Closing => "Closing",
            ConnectionState::Closed => "Closed",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a session, handed to collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStatus {
    pub state: ConnectionState,
    /// True only between a completed handshake and the start of teardown
    pub connected: bool,
    /// Room membership, owned by higher-level collaborators
    pub in_room: bool,
    /// Once set, never cleared for the lifetime of the session
    pub disconnect_requested: bool,
}

/// Per-session status shared between the session, its tasks, and observers
#[derive(Debug)]
pub(crate) struct StatusCell {
    tx: watch::Sender<SessionStatus>,
}

impl StatusCell {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionStatus::default());
        Self { tx }
    }

    pub(crate) fn snapshot(&self) -> SessionStatus {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.tx.subscribe()
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.tx.borrow().state
    }

    pub(crate) fn disconnect_requested(&self) -> bool {
        self.tx.borrow().disconnect_requested
    }

    /// Move to `to` if the current state satisfies `allowed`, otherwise
    /// return the state that blocked the transition.
    pub(crate) fn transition(
        &self,
        allowed: impl FnOnce(ConnectionState) -> bool,
        to: ConnectionState,
    ) -> Result<ConnectionState, ConnectionState> {
        let mut outcome = Err(ConnectionState::Disconnected);
        self.tx.send_if_modified(|status| {
            if allowed(status.state) {
                outcome = Ok(status.state);
                status.state = to;
                true
            } else {
                outcome = Err(status.state);
                false
            }
        });
        outcome
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        self.tx.send_if_modified(|status| {
            let changed = status.state != state;
            status.state = state;
            changed
        });
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.tx.send_if_modified(|status| {
            let changed = status.connected != connected;
            status.connected = connected;
            changed
        });
    }

    pub(crate) fn set_in_room(&self, in_room: bool) {
        self.tx.send_if_modified(|status| {
            let changed = status.in_room != in_room;
            status.in_room = in_room;
            changed
        });
    }

    /// Returns true if this call made the request
    pub(crate) fn request_disconnect(&self) -> bool {
        self.tx.send_if_modified(|status| {
            let first = !status.disconnect_requested;
            status.disconnect_requested = true;
            first
        })
    }
}
