use super::config::SessionConfig;
use super::error::{Result, SessionError, TransportError};
use super::receive::{LoopExit, ReceiveLoop, SessionEvent};
use super::send::{SendOutcome, SkipReason, WriteAck, Writer, WriterCommand};
use super::state::{ConnectionState, SessionStatus, StatusCell};
use super::stats::{Diagnostics, SessionStats};
use super::transport::{
    CloseStatus, Connector, FrameKind, HandshakeRequest, SharedSocketState, TransportHandle,
};
use crate::messages::{KeyedRecord, MessageCodec};
use std::sync::{Arc, OnceLock};
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Receiving end of a session's notifications
pub type SessionEvents<M> = mpsc::UnboundedReceiver<SessionEvent<M>>;

/// A persistent realtime connection exchanging `M` records with one peer.
///
/// A session connects at most once. After [`Session::disconnect`] (or a
/// peer-initiated close) it stays closed; build a new session to reconnect.
pub struct Session<M: KeyedRecord> {
    id: Uuid,
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    codec: Arc<MessageCodec<M>>,
    status: Arc<StatusCell>,
    diagnostics: Arc<Diagnostics>,
    events: mpsc::UnboundedSender<SessionEvent<M>>,
    /// Allocated once here and moved into the receive loop on connect
    inbound_buffer: Mutex<Option<Vec<u8>>>,
    socket: OnceLock<SharedSocketState>,
    outbound: Mutex<Option<mpsc::Sender<WriterCommand>>>,
    receive_task: Mutex<Option<JoinHandle<LoopExit>>>,
    /// Stops the writer and, through its child token, the receive loop
    shutdown: CancellationToken,
    receive_cancel: CancellationToken,
}

impl<M: KeyedRecord> Session<M> {
    pub fn new(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<(Self, SessionEvents<M>)> {
        config.validate()?;
        let codec = MessageCodec::<M>::with_max_message_size(config.max_message_size)?;
        let (events, events_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let receive_cancel = shutdown.child_token();
        let id = Uuid::new_v4();

        debug!(
            session_id = %id,
            endpoint = %config.endpoint,
            buffer_capacity = config.buffer_capacity,
            record = M::TYPE_NAME,
            "Created realtime session"
        );

        let session = Self {
            id,
            inbound_buffer: Mutex::new(Some(vec![0u8; config.buffer_capacity])),
            config,
            connector,
            codec: Arc::new(codec),
            status: Arc::new(StatusCell::new()),
            diagnostics: Arc::new(Diagnostics::new()),
            events,
            socket: OnceLock::new(),
            outbound: Mutex::new(None),
            receive_task: Mutex::new(None),
            shutdown,
            receive_cancel,
        };
        Ok((session, events_rx))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn codec(&self) -> &MessageCodec<M> {
        &self.codec
    }

    pub fn status(&self) -> SessionStatus {
        self.status.snapshot()
    }

    /// Watch status changes without polling
    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.status.state()
    }

    pub fn is_connected(&self) -> bool {
        self.status.snapshot().connected
    }

    pub fn stats(&self) -> SessionStats {
        self.diagnostics.snapshot()
    }

    /// Room membership is tracked for collaborators only; the session never
    /// consults it.
    pub fn set_in_room(&self, in_room: bool) {
        self.status.set_in_room(in_room);
    }

    pub fn leave_room(&self, on_completed: impl FnOnce()) {
        self.status.set_in_room(false);
        on_completed();
    }

    /// Open the connection, send the hello frame, and start the receive loop.
    ///
    /// Fails with [`SessionError::InvalidState`] unless the session is
    /// `Disconnected`, and with [`SessionError::Connection`] if the handshake
    /// fails, in which case the session stays `Disconnected`.
    #[instrument(skip(self), fields(session_id = %self.id, endpoint = %self.config.endpoint))]
    pub async fn connect(&self) -> Result<()> {
        self.status
            .transition(ConnectionState::can_connect, ConnectionState::Connecting)
            .map_err(|state| SessionError::InvalidState {
                operation: "connect",
                state,
            })?;

        let request = HandshakeRequest {
            url: self.config.endpoint.clone(),
            authorization: self.config.authorization.clone(),
        };
        let handle = match self.connector.connect(&request).await {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "Failed to connect to realtime server");
                let _ = self.status.transition(
                    |state| state == ConnectionState::Connecting,
                    ConnectionState::Disconnected,
                );
                return Err(SessionError::Connection(e));
            }
        };

        let TransportHandle {
            mut sink,
            source,
            state: socket,
        } = handle;

        // Disconnect takes this lock before leaving Connecting or Connected,
        // so it always finds the writer of a connected session
        let mut outbound = self.outbound.lock().await;
        if let Err(state) = self.status.transition(
            |state| state == ConnectionState::Connecting,
            ConnectionState::Connected,
        ) {
            drop(outbound);
            warn!(%state, "Disconnect requested during handshake; closing new connection");
            let status = CloseStatus::normal(self.config.close_reason.clone());
            if let Err(e) = sink.close(&status).await {
                debug!(error = %e, "Close after aborted connect failed");
            }
            return Err(SessionError::InvalidState {
                operation: "connect",
                state,
            });
        }

        let _ = self.socket.set(socket.clone());
        let (tx, rx) = mpsc::channel(self.config.outbound_queue_depth);
        let writer = Writer::new(
            sink,
            rx,
            self.status.clone(),
            self.diagnostics.clone(),
            self.shutdown.clone(),
        );
        tokio::spawn(writer.run());
        *outbound = Some(tx);
        self.status.set_connected(true);
        let _ = self.events.send(SessionEvent::Connected);
        drop(outbound);
        info!("Connected to realtime server");

        // Some servers push nothing until the client speaks first
        match self
            .write(FrameKind::Text, self.config.hello_text.as_bytes().to_vec())
            .await
        {
            Ok(SendOutcome::Sent) => debug!("Sent hello frame"),
            Ok(SendOutcome::Skipped(reason)) => warn!(?reason, "Hello frame was not sent"),
            Err(e) => error!(error = %e, "Failed to send hello frame"),
        }

        let buffer = self
            .inbound_buffer
            .lock()
            .await
            .take()
            .unwrap_or_else(|| vec![0u8; self.config.buffer_capacity]);
        let receive_loop = ReceiveLoop::new(
            source,
            buffer,
            self.codec.clone(),
            socket,
            self.status.clone(),
            self.diagnostics.clone(),
            self.events.clone(),
            self.receive_cancel.clone(),
            self.shutdown.clone(),
        );
        *self.receive_task.lock().await = Some(tokio::spawn(receive_loop.run()));
        Ok(())
    }

    /// Encode `message` and write it as a binary frame.
    ///
    /// Sends are never queued for later: while a disconnect is pending or the
    /// socket is not open the message is dropped and
    /// [`SendOutcome::Skipped`] is returned.
    pub async fn send(&self, message: &M) -> Result<SendOutcome> {
        if let Some(reason) = self.skip_reason() {
            return Ok(SendOutcome::Skipped(reason));
        }
        let payload = self.codec.encode(message)?;
        self.write(FrameKind::Binary, payload).await
    }

    /// Write a text frame (diagnostics and text-based protocol messages)
    pub async fn send_text(&self, text: &str) -> Result<SendOutcome> {
        if let Some(reason) = self.skip_reason() {
            return Ok(SendOutcome::Skipped(reason));
        }
        self.write(FrameKind::Text, text.as_bytes().to_vec()).await
    }

    fn skip_reason(&self) -> Option<SkipReason> {
        if self.status.disconnect_requested() {
            debug!(session_id = %self.id, "Skip sending since disconnect was requested");
            return Some(SkipReason::DisconnectRequested);
        }
        match self.socket.get() {
            Some(socket) if socket.is_open() => None,
            Some(socket) => {
                warn!(
                    session_id = %self.id,
                    state = %socket.get(),
                    "Ignored send while socket is not open"
                );
                Some(SkipReason::NotOpen)
            }
            None => {
                warn!(
                    session_id = %self.id,
                    state = %self.status.state(),
                    "Ignored send before the socket was opened"
                );
                Some(SkipReason::NotOpen)
            }
        }
    }

    async fn write(&self, kind: FrameKind, payload: Vec<u8>) -> Result<SendOutcome> {
        let Some(outbound) = self.outbound.lock().await.clone() else {
            return Ok(SendOutcome::Skipped(self.closed_reason()));
        };

        let (ack, acked) = oneshot::channel();
        if outbound
            .send(WriterCommand::Frame { kind, payload, ack })
            .await
            .is_err()
        {
            debug!(session_id = %self.id, "Writer is gone; dropping frame");
            return Ok(SendOutcome::Skipped(self.closed_reason()));
        }

        match acked.await {
            Ok(Ok(WriteAck::Written)) => Ok(SendOutcome::Sent),
            Ok(Ok(WriteAck::Dropped)) => Ok(SendOutcome::Skipped(SkipReason::DisconnectRequested)),
            Ok(Err(e)) => Err(SessionError::Transport(e)),
            Err(_) => Ok(SendOutcome::Skipped(self.closed_reason())),
        }
    }

    fn closed_reason(&self) -> SkipReason {
        if self.status.disconnect_requested() {
            SkipReason::DisconnectRequested
        } else {
            SkipReason::NotOpen
        }
    }

    /// Close the session. Always completes: close handshake failures are
    /// logged and swallowed. Calling it again, or after the peer closed, is a
    /// no-op.
    ///
    /// An in-flight receive is cancelled, but the receive loop task may still
    /// be winding down when this returns; see
    /// [`Session::wait_for_receive_loop`].
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn disconnect(&self) {
        self.status.request_disconnect();
        let mut guard = self.outbound.lock().await;
        let previous = match self.status.transition(
            |state| !state.is_terminal() && state != ConnectionState::Closing,
            ConnectionState::Closing,
        ) {
            Ok(previous) => previous,
            Err(state) => {
                debug!(%state, "Disconnect ignored");
                return;
            }
        };
        let outbound = guard.take();
        drop(guard);
        debug!(%previous, "Caller has requested disconnect");

        self.receive_cancel.cancel();

        if let Some(outbound) = outbound {
            let status = CloseStatus::normal(self.config.close_reason.clone());
            if let Err(e) = Self::close_through_writer(outbound, status).await {
                warn!(error = %e, "Close handshake failed; continuing teardown");
            }
        }

        self.shutdown.cancel();
        self.status.set_connected(false);
        self.status.set_state(ConnectionState::Closed);
        info!("Closed realtime session");
    }

    async fn close_through_writer(
        outbound: mpsc::Sender<WriterCommand>,
        status: CloseStatus,
    ) -> std::result::Result<(), TransportError> {
        let (ack, acked) = oneshot::channel();
        outbound
            .send(WriterCommand::Close { status, ack })
            .await
            .map_err(|_| TransportError::Close("writer already stopped".to_string()))?;
        acked
            .await
            .map_err(|_| TransportError::Close("writer stopped before closing".to_string()))?
    }

    /// Wait for the receive loop to finish. Returns `None` if it was never
    /// started, was already awaited, or panicked.
    pub async fn wait_for_receive_loop(&self) -> Option<LoopExit> {
        let handle = self.receive_task.lock().await.take()?;
        match handle.await {
            Ok(exit) => Some(exit),
            Err(e) => {
                error!(session_id = %self.id, error = %e, "Receive loop task failed");
                None
            }
        }
    }
}

impl<M: KeyedRecord> Drop for Session<M> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
