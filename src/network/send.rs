//! Single-writer outbound path.
//!
//! Every outbound frame goes through one queue consumed by one writer task,
//! which owns the transport's [`FrameSink`]. Callers wait for the writer's
//! acknowledgement, so `send` still suspends until the frame is written, but
//! two frames can never be interleaved on the socket.

use super::error::TransportError;
use super::state::StatusCell;
use super::stats::Diagnostics;
use super::transport::{CloseStatus, FrameKind, FrameSink};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Result of a send that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Not an error: the frame was dropped and nothing was written
    Skipped(SkipReason),
}

impl SendOutcome {
    pub fn is_sent(self) -> bool {
        self == SendOutcome::Sent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    DisconnectRequested,
    NotOpen,
}

/// What the writer did with a queued frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteAck {
    Written,
    Dropped,
}

pub(crate) type Ack<T> = oneshot::Sender<Result<T, TransportError>>;

pub(crate) enum WriterCommand {
    Frame {
        kind: FrameKind,
        payload: Vec<u8>,
        ack: Ack<WriteAck>,
    },
    Close {
        status: CloseStatus,
        ack: Ack<()>,
    },
}

pub(crate) struct Writer {
    sink: Box<dyn FrameSink>,
    commands: mpsc::Receiver<WriterCommand>,
    status: Arc<StatusCell>,
    diagnostics: Arc<Diagnostics>,
    shutdown: CancellationToken,
}

impl Writer {
    pub(crate) fn new(
        sink: Box<dyn FrameSink>,
        commands: mpsc::Receiver<WriterCommand>,
        status: Arc<StatusCell>,
        diagnostics: Arc<Diagnostics>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            sink,
            commands,
            status,
            diagnostics,
            shutdown,
        }
    }

    /// Drain the queue until a close command, shutdown, or every sender is
    /// gone. The sink is released when this returns.
    pub(crate) async fn run(mut self) {
        loop {
            let command = tokio::select! {
                biased;
                command = self.commands.recv() => command,
                _ = self.shutdown.cancelled() => None,
            };
            let Some(command) = command else { break };

            match command {
                WriterCommand::Frame { kind, payload, ack } => {
                    if self.status.disconnect_requested() {
                        debug!(?kind, "Dropping queued frame since disconnect was requested");
                        let _ = ack.send(Ok(WriteAck::Dropped));
                        continue;
                    }
                    let result = self.sink.send(kind, &payload).await;
                    match &result {
                        Ok(()) => {
                            let count = self.diagnostics.record_sent();
                            debug!(?kind, size = payload.len(), count, "Sent frame to realtime server");
                        }
                        Err(e) => warn!(?kind, error = %e, "Frame write failed"),
                    }
                    let _ = ack.send(result.map(|()| WriteAck::Written));
                }
                WriterCommand::Close { status, ack } => {
                    trace!(%status, "Starting close handshake");
                    let result = self.sink.close(&status).await;
                    let _ = ack.send(result);
                    break;
                }
            }
        }
        debug!("Writer task finished");
    }
}
