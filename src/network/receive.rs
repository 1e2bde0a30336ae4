//! The receive loop: one per connected session, sole owner of the inbound
//! buffer and of the transport's read half.

use super::error::TransportError;
use super::state::{ConnectionState, StatusCell};
use super::stats::Diagnostics;
use super::transport::{CloseStatus, FrameKind, FrameSource, SharedSocketState};
use crate::messages::{KeyedRecord, MessageCodec};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Notifications delivered to the session's owner
#[derive(Debug)]
pub enum SessionEvent<M> {
    /// The handshake completed; fired before the hello frame is sent
    Connected,
    Message {
        message: M,
        round_trip: Option<Duration>,
    },
    /// Text frames are a diagnostic path and are not decoded
    Text {
        text: String,
        round_trip: Option<Duration>,
    },
    /// A binary frame failed to decode and was dropped
    DecodeFailed { error: String, size: usize },
    /// A message larger than the inbound buffer was drained and dropped
    Oversized { kind: FrameKind, size: usize },
    /// The server closed the connection; `None` when the socket stopped
    /// being open without a close frame
    PeerClosed(Option<CloseStatus>),
    ReceiveFailed { error: String },
}

/// Why the receive loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    DisconnectRequested,
    Cancelled,
    SocketNotOpen,
    PeerClosed,
    TransportFailed,
}

enum Inbound {
    Complete { kind: FrameKind, len: usize },
    Oversized { kind: FrameKind, size: usize },
    Closed(Option<CloseStatus>),
}

pub(crate) struct ReceiveLoop<M> {
    source: Box<dyn FrameSource>,
    buffer: Vec<u8>,
    codec: Arc<MessageCodec<M>>,
    socket: SharedSocketState,
    status: Arc<StatusCell>,
    diagnostics: Arc<Diagnostics>,
    events: mpsc::UnboundedSender<SessionEvent<M>>,
    cancel: CancellationToken,
    shutdown: CancellationToken,
}

impl<M: KeyedRecord> ReceiveLoop<M> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        source: Box<dyn FrameSource>,
        buffer: Vec<u8>,
        codec: Arc<MessageCodec<M>>,
        socket: SharedSocketState,
        status: Arc<StatusCell>,
        diagnostics: Arc<Diagnostics>,
        events: mpsc::UnboundedSender<SessionEvent<M>>,
        cancel: CancellationToken,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            buffer,
            codec,
            socket,
            status,
            diagnostics,
            events,
            cancel,
            shutdown,
        }
    }

    pub(crate) async fn run(mut self) -> LoopExit {
        let cancel = self.cancel.clone();
        loop {
            if self.status.disconnect_requested() {
                debug!("Receive loop stopping since disconnect was requested");
                return LoopExit::DisconnectRequested;
            }
            let socket = self.socket.get();
            if !socket.is_open() {
                warn!(state = %socket, "Socket is no longer open; stopping receive loop");
                self.mark_closed();
                let _ = self.events.send(SessionEvent::PeerClosed(None));
                return LoopExit::SocketNotOpen;
            }

            let inbound = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("In-flight receive cancelled");
                    return LoopExit::Cancelled;
                }
                inbound = self.receive_message() => inbound,
            };

            match inbound {
                Ok(Inbound::Complete { kind, len }) => self.dispatch(kind, len),
                Ok(Inbound::Oversized { kind, size }) => {
                    self.diagnostics.record_oversized();
                    warn!(
                        ?kind,
                        size,
                        capacity = self.buffer.len(),
                        "Dropped message larger than the inbound buffer"
                    );
                    let _ = self.events.send(SessionEvent::Oversized { kind, size });
                }
                Ok(Inbound::Closed(status)) => {
                    info!(status = ?status, "Realtime server closed the connection");
                    self.mark_closed();
                    let _ = self.events.send(SessionEvent::PeerClosed(status));
                    return LoopExit::PeerClosed;
                }
                Err(e) => {
                    error!(error = %e, "Receive failed; stopping receive loop");
                    self.mark_closed();
                    let _ = self.events.send(SessionEvent::ReceiveFailed {
                        error: e.to_string(),
                    });
                    return LoopExit::TransportFailed;
                }
            }
        }
    }

    /// Read one logical message into the inbound buffer, following
    /// continuation chunks until the end-of-message marker.
    async fn receive_message(&mut self) -> Result<Inbound, TransportError> {
        let capacity = self.buffer.len();
        let mut filled = 0;
        let mut first_kind = None;
        let mut overflow: Option<usize> = None;

        loop {
            let window = match overflow {
                Some(_) => &mut self.buffer[..],
                None => &mut self.buffer[filled..],
            };
            let result = self.source.receive(window).await?;
            if result.is_close() {
                return Ok(Inbound::Closed(result.close_status));
            }
            let kind = *first_kind.get_or_insert(result.kind);

            match overflow.as_mut() {
                Some(total) => *total += result.count,
                None => filled += result.count,
            }

            if result.end_of_message {
                return Ok(match overflow {
                    Some(size) => Inbound::Oversized { kind, size },
                    None => Inbound::Complete { kind, len: filled },
                });
            }
            if overflow.is_none() && filled >= capacity {
                overflow = Some(filled);
            }
        }
    }

    fn dispatch(&self, kind: FrameKind, len: usize) {
        let payload = &self.buffer[..len];
        match kind {
            FrameKind::Text => {
                let text = String::from_utf8_lossy(payload).into_owned();
                let count = self.diagnostics.record_text();
                let round_trip = self.diagnostics.record_round_trip();
                info!(
                    count,
                    round_trip_ms = round_trip.map(|d| d.as_millis() as u64),
                    text = %text,
                    "Got text from realtime server"
                );
                let _ = self.events.send(SessionEvent::Text { text, round_trip });
            }
            FrameKind::Binary => match self.codec.decode(payload) {
                Ok(message) => {
                    let count = self.diagnostics.record_message();
                    let round_trip = self.diagnostics.record_round_trip();
                    debug!(
                        count,
                        size = len,
                        record = M::TYPE_NAME,
                        round_trip_ms = round_trip.map(|d| d.as_millis() as u64),
                        "Got binary message from realtime server"
                    );
                    let _ = self.events.send(SessionEvent::Message {
                        message,
                        round_trip,
                    });
                }
                Err(e) => {
                    self.diagnostics.record_decode_failure();
                    let round_trip = self.diagnostics.record_round_trip();
                    error!(
                        error = %e,
                        size = len,
                        round_trip_ms = round_trip.map(|d| d.as_millis() as u64),
                        record = M::TYPE_NAME,
                        "Failed to decode binary message; dropping it"
                    );
                    let _ = self.events.send(SessionEvent::DecodeFailed {
                        error: e.to_string(),
                        size: len,
                    });
                }
            },
            FrameKind::Close => debug!("Unhandled close frame in dispatch"),
        }
    }

    /// The connection ended underneath the session. Teardown that is already
    /// in progress keeps ownership of the state; otherwise the session is
    /// closed here and the writer is released.
    fn mark_closed(&self) {
        if self
            .status
            .transition(|state| state == ConnectionState::Connected, ConnectionState::Closed)
            .is_ok()
        {
            self.status.set_connected(false);
        }
        self.shutdown.cancel();
    }
}
