//! End-to-end tests against a local WebSocket server
//!
//! The server runs on an ephemeral port, records what the session sends, and
//! echoes binary frames back.

mod common;

use common::test_helpers::{next_event, EVENT_TIMEOUT};
use futures::{SinkExt, StreamExt};
use realtime_session::messages::ChatLine;
use realtime_session::network::{
    CloseStatus, ConnectionState, LoopExit, SessionConfig, SessionEvent, CLOSE_NORMAL,
};
use realtime_session::{Session, WebSocketConnector};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// What the server observed, in order
#[derive(Debug, PartialEq)]
enum Seen {
    Text(String),
    Binary(Vec<u8>),
    Close(Option<CloseStatus>),
}

struct TestServer {
    url: String,
    authorization: oneshot::Receiver<Option<String>>,
    seen: mpsc::UnboundedReceiver<Seen>,
}

/// Accept one connection. With `close_after_hello` the server closes the
/// connection itself once the first frame arrives; otherwise it echoes
/// binary frames until the client closes.
async fn start_server(close_after_hello: Option<CloseStatus>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/realtime", listener.local_addr().unwrap());
    let (auth_tx, authorization) = oneshot::channel();
    let (seen_tx, seen) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            let header = request
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let _ = auth_tx.send(header);
            Ok(response)
        };
        let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .unwrap();

        while let Some(Ok(message)) = ws.next().await {
            match message {
                Message::Text(text) => {
                    let _ = seen_tx.send(Seen::Text(text.as_str().to_string()));
                    if let Some(status) = &close_after_hello {
                        let frame = CloseFrame {
                            code: CloseCode::from(status.code),
                            reason: status.reason.clone().into(),
                        };
                        let _ = ws.send(Message::Close(Some(frame))).await;
                    }
                }
                Message::Binary(data) => {
                    let _ = seen_tx.send(Seen::Binary(data.to_vec()));
                    let _ = ws.send(Message::binary(data)).await;
                }
                Message::Close(frame) => {
                    let status =
                        frame.map(|f| CloseStatus::new(u16::from(f.code), f.reason.as_str()));
                    let _ = seen_tx.send(Seen::Close(status));
                    break;
                }
                _ => {}
            }
        }
    });

    TestServer {
        url,
        authorization,
        seen,
    }
}

async fn next_seen(seen: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
    tokio::time::timeout(EVENT_TIMEOUT, seen.recv())
        .await
        .expect("timed out waiting for the server")
        .expect("server stopped")
}

#[tokio::test]
async fn test_round_trip_through_websocket_server() {
    let mut server = start_server(None).await;
    let config = SessionConfig::new(server.url.clone()).with_authorization("Bearer t0k3n");
    let (session, mut events) =
        Session::<ChatLine>::new(config, Arc::new(WebSocketConnector::new())).unwrap();

    session.connect().await.unwrap();
    assert!(session.is_connected());
    assert!(matches!(next_event(&mut events).await, SessionEvent::Connected));
    assert_eq!(
        server.authorization.await.unwrap().as_deref(),
        Some("Bearer t0k3n")
    );
    assert_eq!(
        next_seen(&mut server.seen).await,
        Seen::Text("hello".to_string())
    );

    let line = ChatLine::new("echo", "are you there?");
    assert!(session.send(&line).await.unwrap().is_sent());
    assert!(matches!(next_seen(&mut server.seen).await, Seen::Binary(_)));

    match next_event(&mut events).await {
        SessionEvent::Message {
            message,
            round_trip,
        } => {
            assert_eq!(message, line);
            assert!(round_trip.is_some());
        }
        other => panic!("expected echoed Message, got {:?}", other),
    }

    session.disconnect().await;
    assert_eq!(session.state(), ConnectionState::Closed);
    assert_eq!(
        next_seen(&mut server.seen).await,
        Seen::Close(Some(CloseStatus::new(CLOSE_NORMAL, "OK")))
    );
    let exit = tokio::time::timeout(EVENT_TIMEOUT, session.wait_for_receive_loop())
        .await
        .unwrap();
    assert_eq!(exit, Some(LoopExit::Cancelled));
}

#[tokio::test]
async fn test_server_initiated_close_is_reported() {
    let mut server = start_server(Some(CloseStatus::new(4001, "bye"))).await;
    let config = SessionConfig::new(server.url.clone());
    let (session, mut events) =
        Session::<ChatLine>::new(config, Arc::new(WebSocketConnector::new())).unwrap();

    session.connect().await.unwrap();
    assert!(matches!(next_event(&mut events).await, SessionEvent::Connected));
    assert_eq!(server.authorization.await.unwrap(), None);
    assert_eq!(
        next_seen(&mut server.seen).await,
        Seen::Text("hello".to_string())
    );

    match next_event(&mut events).await {
        SessionEvent::PeerClosed(Some(status)) => {
            assert_eq!(status, CloseStatus::new(4001, "bye"));
        }
        other => panic!("expected PeerClosed, got {:?}", other),
    }
    assert_eq!(session.wait_for_receive_loop().await, Some(LoopExit::PeerClosed));
    assert_eq!(session.state(), ConnectionState::Closed);
    assert!(!session.is_connected());
    session.disconnect().await;
}
