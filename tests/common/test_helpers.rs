use super::mock_transport::MockTransport;
use realtime_session::messages::KeyedRecord;
use realtime_session::network::{
    ConnectionState, Session, SessionEvent, SessionEvents, SessionStatus,
};
use realtime_session::SessionConfig;
use std::time::Duration;

pub const TEST_ENDPOINT: &str = "wss://realtime.test/session";
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

pub fn test_config() -> SessionConfig {
    SessionConfig::new(TEST_ENDPOINT)
}

pub fn new_session<M: KeyedRecord>(
    transport: &MockTransport,
    config: SessionConfig,
) -> (Session<M>, SessionEvents<M>) {
    Session::new(config, transport.connector()).expect("session should build")
}

/// Build and connect a session, consuming the `Connected` event
pub async fn connected_session<M: KeyedRecord + std::fmt::Debug>(
    transport: &MockTransport,
    config: SessionConfig,
) -> (Session<M>, SessionEvents<M>) {
    let (session, mut events) = new_session(transport, config);
    session.connect().await.expect("connect should succeed");
    match next_event(&mut events).await {
        SessionEvent::Connected => {}
        other => panic!("expected Connected first, got {:?}", other),
    }
    (session, events)
}

pub async fn next_event<M: std::fmt::Debug>(events: &mut SessionEvents<M>) -> SessionEvent<M> {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("session event channel closed")
}

/// Assert nothing further arrives within a short window
pub async fn assert_no_event<M: std::fmt::Debug>(events: &mut SessionEvents<M>) {
    if let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(50), events.recv()).await {
        panic!("unexpected session event: {:?}", event);
    }
}

/// Wait until the session reports `state`
pub async fn wait_for_state<M: KeyedRecord>(
    session: &Session<M>,
    state: ConnectionState,
) -> SessionStatus {
    let mut status = session.subscribe_status();
    tokio::time::timeout(EVENT_TIMEOUT, status.wait_for(|s| s.state == state))
        .await
        .expect("timed out waiting for session state")
        .map(|s| *s)
        .expect("status channel closed")
}
