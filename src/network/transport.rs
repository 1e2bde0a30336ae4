//! Boundary between the session and the socket transport.
//!
//! A [`Connector`] performs the opening handshake and hands back the two
//! halves of the connection. The session gives the [`FrameSink`] to its single
//! writer task and the [`FrameSource`] to its receive loop, so neither half is
//! ever driven from two places at once.

use super::error::TransportError;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Normal closure status code
pub const CLOSE_NORMAL: u16 = 1000;
/// Reported when the connection dropped without a close frame
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Lifecycle of the underlying socket, as seen by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SocketState {
    Connecting = 0,
    Open = 1,
    CloseSent = 2,
    CloseReceived = 3,
    Closed = 4,
    Aborted = 5,
}

impl SocketState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SocketState::Connecting,
            1 => SocketState::Open,
            2 => SocketState::CloseSent,
            3 => SocketState::CloseReceived,
            4 => SocketState::Closed,
            _ => SocketState::Aborted,
        }
    }

    pub fn is_open(self) -> bool {
        self == SocketState::Open
    }
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SocketState::Connecting => "Connecting",
            SocketState::Open => "Open",
            SocketState::CloseSent => "CloseSent",
            SocketState::CloseReceived => "CloseReceived",
            SocketState::Closed => "Closed",
            SocketState::Aborted => "Aborted",
        };
        f.write_str(name)
    }
}

/// Socket state shared by both halves of a connection and the session
#[derive(Debug, Clone)]
pub struct SharedSocketState(Arc<AtomicU8>);

impl SharedSocketState {
    pub fn new(state: SocketState) -> Self {
        Self(Arc::new(AtomicU8::new(state as u8)))
    }

    pub fn get(&self) -> SocketState {
        SocketState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: SocketState) {
        self.0.store(state as u8, Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        self.get().is_open()
    }
}

impl Default for SharedSocketState {
    fn default() -> Self {
        Self::new(SocketState::Connecting)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Text,
    Binary,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseStatus {
    pub code: u16,
    pub reason: String,
}

impl CloseStatus {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn normal(reason: impl Into<String>) -> Self {
        Self::new(CLOSE_NORMAL, reason)
    }
}

impl fmt::Display for CloseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.reason)
    }
}

/// Outcome of one receive call into the caller's buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveResult {
    /// Bytes written at the start of the buffer
    pub count: usize,
    pub kind: FrameKind,
    /// `false` when the message continues in the next receive call
    pub end_of_message: bool,
    pub close_status: Option<CloseStatus>,
}

impl ReceiveResult {
    pub fn data(kind: FrameKind, count: usize, end_of_message: bool) -> Self {
        Self {
            count,
            kind,
            end_of_message,
            close_status: None,
        }
    }

    pub fn closed(close_status: Option<CloseStatus>) -> Self {
        Self {
            count: 0,
            kind: FrameKind::Close,
            end_of_message: true,
            close_status,
        }
    }

    pub fn is_close(&self) -> bool {
        self.kind == FrameKind::Close
    }
}

/// Parameters of the opening handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub url: String,
    /// Sent verbatim as the `Authorization` header, e.g. `Bearer <token>`
    pub authorization: Option<String>,
}

/// Write half of an open connection
#[async_trait]
pub trait FrameSink: Send {
    /// Write one complete message
    async fn send(&mut self, kind: FrameKind, payload: &[u8]) -> Result<(), TransportError>;

    /// Start the close handshake
    async fn close(&mut self, status: &CloseStatus) -> Result<(), TransportError>;
}

/// Read half of an open connection
#[async_trait]
pub trait FrameSource: Send {
    /// Suspend until a message (or a chunk of one), a close notification, or
    /// an error arrives. Data is written into the front of `buffer`.
    async fn receive(&mut self, buffer: &mut [u8]) -> Result<ReceiveResult, TransportError>;
}

/// An established connection, split into its halves
pub struct TransportHandle {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
    pub state: SharedSocketState,
}

impl fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportHandle")
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

/// Opens connections to a remote endpoint
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, request: &HandshakeRequest) -> Result<TransportHandle, TransportError>;
}
