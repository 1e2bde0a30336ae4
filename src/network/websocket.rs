//! WebSocket transport over `tokio-tungstenite`.

use super::error::TransportError;
use super::transport::{
    CloseStatus, Connector, FrameKind, FrameSink, FrameSource, HandshakeRequest, ReceiveResult,
    SharedSocketState, SocketState, TransportHandle, CLOSE_ABNORMAL,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens `ws://` and `wss://` connections
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, request: &HandshakeRequest) -> Result<TransportHandle, TransportError> {
        let mut client_request = request.url.as_str().into_client_request().map_err(|e| {
            TransportError::InvalidEndpoint {
                url: request.url.clone(),
                reason: e.to_string(),
            }
        })?;

        if let Some(authorization) = &request.authorization {
            let value = HeaderValue::from_str(authorization).map_err(|e| TransportError::Handshake {
                url: request.url.clone(),
                reason: format!("invalid Authorization header: {}", e),
            })?;
            client_request.headers_mut().insert(AUTHORIZATION, value);
        }

        let state = SharedSocketState::new(SocketState::Connecting);
        let (ws, response) = connect_async(client_request).await.map_err(|e| {
            state.set(SocketState::Aborted);
            TransportError::Handshake {
                url: request.url.clone(),
                reason: e.to_string(),
            }
        })?;
        state.set(SocketState::Open);
        debug!(url = %request.url, status = %response.status(), "WebSocket handshake completed");

        let (sink, stream) = ws.split();
        Ok(TransportHandle {
            sink: Box::new(WsSink {
                sink,
                state: state.clone(),
            }),
            source: Box::new(WsSource {
                stream,
                state: state.clone(),
                pending: None,
            }),
            state,
        })
    }
}

struct WsSink {
    sink: SplitSink<WsStream, Message>,
    state: SharedSocketState,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, kind: FrameKind, payload: &[u8]) -> Result<(), TransportError> {
        let message = match kind {
            FrameKind::Text => {
                let text = std::str::from_utf8(payload)
                    .map_err(|e| TransportError::Send(format!("text frame is not UTF-8: {}", e)))?;
                Message::text(text.to_owned())
            }
            FrameKind::Binary => Message::binary(payload.to_vec()),
            FrameKind::Close => {
                return Err(TransportError::Send(
                    "close frames are sent through close()".to_string(),
                ))
            }
        };

        self.sink.send(message).await.map_err(|e| {
            if matches!(e, WsError::ConnectionClosed | WsError::AlreadyClosed) {
                self.state.set(SocketState::Closed);
            }
            TransportError::from(e)
        })
    }

    async fn close(&mut self, status: &CloseStatus) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: CloseCode::from(status.code),
            reason: status.reason.clone().into(),
        };
        let result = self.sink.send(Message::Close(Some(frame))).await;
        match result {
            Ok(()) => {
                self.state.set(SocketState::CloseSent);
                Ok(())
            }
            Err(e) => {
                self.state.set(SocketState::Aborted);
                Err(TransportError::Close(e.to_string()))
            }
        }
    }
}

/// A received message not yet fully copied out to the caller
struct PendingMessage {
    kind: FrameKind,
    data: Bytes,
    offset: usize,
}

impl PendingMessage {
    fn fill(&mut self, buffer: &mut [u8]) -> ReceiveResult {
        let remaining = &self.data[self.offset..];
        let count = remaining.len().min(buffer.len());
        buffer[..count].copy_from_slice(&remaining[..count]);
        self.offset += count;
        ReceiveResult::data(self.kind, count, self.offset == self.data.len())
    }
}

struct WsSource {
    stream: SplitStream<WsStream>,
    state: SharedSocketState,
    pending: Option<PendingMessage>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn receive(&mut self, buffer: &mut [u8]) -> Result<ReceiveResult, TransportError> {
        if buffer.is_empty() {
            return Err(TransportError::Receive("receive buffer has no capacity".to_string()));
        }

        loop {
            if let Some(pending) = self.pending.as_mut() {
                let result = pending.fill(buffer);
                if result.end_of_message {
                    self.pending = None;
                }
                return Ok(result);
            }

            let message = match self.stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) | None => {
                    self.state.set(SocketState::Closed);
                    return Ok(ReceiveResult::closed(Some(CloseStatus::new(
                        CLOSE_ABNORMAL,
                        "connection dropped",
                    ))));
                }
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket receive failed");
                    self.state.set(SocketState::Aborted);
                    return Err(e.into());
                }
            };

            match message {
                Message::Text(text) => {
                    self.pending = Some(PendingMessage {
                        kind: FrameKind::Text,
                        data: Bytes::copy_from_slice(text.as_bytes()),
                        offset: 0,
                    });
                }
                Message::Binary(data) => {
                    self.pending = Some(PendingMessage {
                        kind: FrameKind::Binary,
                        data,
                        offset: 0,
                    });
                }
                Message::Close(frame) => {
                    self.state.set(SocketState::CloseReceived);
                    let status = frame.map(|f| CloseStatus::new(u16::from(f.code), f.reason.as_str()));
                    return Ok(ReceiveResult::closed(status));
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    trace!("Skipping control frame");
                }
            }
        }
    }
}
