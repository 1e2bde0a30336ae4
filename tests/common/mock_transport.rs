//! Scripted in-memory transport for session tests
//!
//! The mock records every handshake, write, and close the session performs,
//! and hands out inbound frames that a test pushes one at a time. A receive
//! call with nothing scripted stays pending, like a quiet socket. A held
//! frame blocks its receive call after it has been polled until the test
//! releases it; those tests need a multi-thread runtime.

use async_trait::async_trait;
use realtime_session::network::{
    CloseStatus, Connector, FrameKind, FrameSink, FrameSource, HandshakeRequest, ReceiveResult,
    SharedSocketState, SocketState, TransportError, TransportHandle,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// One scripted result for a receive call
#[derive(Debug)]
pub enum Inbound {
    Frame { kind: FrameKind, data: Vec<u8> },
    Held {
        kind: FrameKind,
        data: Vec<u8>,
        release: std_mpsc::Receiver<()>,
    },
    Close(Option<CloseStatus>),
    Error(String),
}

#[derive(Default)]
struct Recorded {
    handshakes: Vec<HandshakeRequest>,
    writes: Vec<(FrameKind, Vec<u8>)>,
    closes: Vec<CloseStatus>,
}

struct Inner {
    recorded: Mutex<Recorded>,
    state: SharedSocketState,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Inbound>>>,
    receive_calls: AtomicUsize,
    held_receives: AtomicUsize,
    handshake_error: Mutex<Option<String>>,
    handshake_delay: Mutex<Option<Duration>>,
    fail_sends: AtomicBool,
    fail_close: AtomicBool,
    /// Largest chunk a single receive call delivers
    chunk_size: AtomicUsize,
    /// Set while a write is in progress, to catch overlapping writes
    writing: AtomicBool,
    overlapping_writes: AtomicUsize,
}

/// Handle shared by the test and the session's connector
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Inner>,
}

impl MockTransport {
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(Inner {
                recorded: Mutex::new(Recorded::default()),
                state: SharedSocketState::new(SocketState::Connecting),
                inbound_tx,
                inbound_rx: Mutex::new(Some(inbound_rx)),
                receive_calls: AtomicUsize::new(0),
                held_receives: AtomicUsize::new(0),
                handshake_error: Mutex::new(None),
                handshake_delay: Mutex::new(None),
                fail_sends: AtomicBool::new(false),
                fail_close: AtomicBool::new(false),
                chunk_size: AtomicUsize::new(usize::MAX),
                writing: AtomicBool::new(false),
                overlapping_writes: AtomicUsize::new(0),
            }),
        }
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    pub fn reject_handshake(&self, reason: &str) {
        *self.inner.handshake_error.lock().unwrap() = Some(reason.to_string());
    }

    /// Hold every handshake open for `delay` before completing it
    pub fn delay_handshake(&self, delay: Duration) {
        *self.inner.handshake_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_sends(&self) {
        self.inner.fail_sends.store(true, Ordering::SeqCst);
    }

    pub fn fail_close(&self) {
        self.inner.fail_close.store(true, Ordering::SeqCst);
    }

    pub fn set_chunk_size(&self, chunk_size: usize) {
        self.inner.chunk_size.store(chunk_size, Ordering::SeqCst);
    }

    pub fn set_socket_state(&self, state: SocketState) {
        self.inner.state.set(state);
    }

    pub fn socket_state(&self) -> SocketState {
        self.inner.state.get()
    }

    pub fn push(&self, inbound: Inbound) {
        self.inner
            .inbound_tx
            .send(inbound)
            .expect("mock inbound queue closed");
    }

    pub fn push_binary(&self, data: Vec<u8>) {
        self.push(Inbound::Frame {
            kind: FrameKind::Binary,
            data,
        });
    }

    pub fn push_text(&self, text: &str) {
        self.push(Inbound::Frame {
            kind: FrameKind::Text,
            data: text.as_bytes().to_vec(),
        });
    }

    /// Script a text frame whose receive call blocks until the returned
    /// sender fires
    pub fn push_held_text(&self, text: &str) -> std_mpsc::Sender<()> {
        let (release_tx, release) = std_mpsc::channel();
        self.push(Inbound::Held {
            kind: FrameKind::Text,
            data: text.as_bytes().to_vec(),
            release,
        });
        release_tx
    }

    pub fn push_close(&self, status: Option<CloseStatus>) {
        self.push(Inbound::Close(status));
    }

    pub fn handshakes(&self) -> Vec<HandshakeRequest> {
        self.inner.recorded.lock().unwrap().handshakes.clone()
    }

    pub fn writes(&self) -> Vec<(FrameKind, Vec<u8>)> {
        self.inner.recorded.lock().unwrap().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.inner.recorded.lock().unwrap().writes.len()
    }

    pub fn closes(&self) -> Vec<CloseStatus> {
        self.inner.recorded.lock().unwrap().closes.clone()
    }

    pub fn receive_calls(&self) -> usize {
        self.inner.receive_calls.load(Ordering::SeqCst)
    }

    pub fn overlapping_writes(&self) -> usize {
        self.inner.overlapping_writes.load(Ordering::SeqCst)
    }

    /// Poll until a receive call is blocked on a held frame
    pub async fn wait_for_held_receive(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.inner.held_receives.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for a held receive");
    }

    /// Poll until the session has issued at least `count` receive calls
    pub async fn wait_for_receive_calls(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.receive_calls() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for receive calls");
    }
}

#[async_trait]
impl Connector for MockTransport {
    async fn connect(&self, request: &HandshakeRequest) -> Result<TransportHandle, TransportError> {
        self.inner
            .recorded
            .lock()
            .unwrap()
            .handshakes
            .push(request.clone());

        let delay = *self.inner.handshake_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(reason) = self.inner.handshake_error.lock().unwrap().clone() {
            return Err(TransportError::Handshake {
                url: request.url.clone(),
                reason,
            });
        }

        let inbound = self
            .inner
            .inbound_rx
            .lock()
            .unwrap()
            .take()
            .expect("mock transport connected twice");
        self.inner.state.set(SocketState::Open);

        Ok(TransportHandle {
            sink: Box::new(MockSink {
                inner: self.inner.clone(),
            }),
            source: Box::new(MockSource {
                inner: self.inner.clone(),
                inbound,
                pending: None,
            }),
            state: self.inner.state.clone(),
        })
    }
}

struct MockSink {
    inner: Arc<Inner>,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send(&mut self, kind: FrameKind, payload: &[u8]) -> Result<(), TransportError> {
        if self.inner.writing.swap(true, Ordering::SeqCst) {
            self.inner.overlapping_writes.fetch_add(1, Ordering::SeqCst);
        }
        // Give any other writer a chance to overlap
        tokio::task::yield_now().await;
        self.inner.writing.store(false, Ordering::SeqCst);

        if self.inner.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Send("mock write failure".to_string()));
        }
        self.inner
            .recorded
            .lock()
            .unwrap()
            .writes
            .push((kind, payload.to_vec()));
        Ok(())
    }

    async fn close(&mut self, status: &CloseStatus) -> Result<(), TransportError> {
        if self.inner.fail_close.load(Ordering::SeqCst) {
            self.inner.state.set(SocketState::Aborted);
            return Err(TransportError::Close("mock close failure".to_string()));
        }
        self.inner
            .recorded
            .lock()
            .unwrap()
            .closes
            .push(status.clone());
        self.inner.state.set(SocketState::CloseSent);
        Ok(())
    }
}

struct MockSource {
    inner: Arc<Inner>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    /// Remainder of a frame longer than the chunk size or caller's buffer
    pending: Option<(FrameKind, Vec<u8>)>,
}

impl MockSource {
    fn deliver(&mut self, kind: FrameKind, mut data: Vec<u8>, buffer: &mut [u8]) -> ReceiveResult {
        let limit = buffer
            .len()
            .min(self.inner.chunk_size.load(Ordering::SeqCst));
        let count = data.len().min(limit);
        buffer[..count].copy_from_slice(&data[..count]);
        let rest = data.split_off(count);
        let end_of_message = rest.is_empty();
        if !end_of_message {
            self.pending = Some((kind, rest));
        }
        ReceiveResult::data(kind, count, end_of_message)
    }
}

#[async_trait]
impl FrameSource for MockSource {
    async fn receive(&mut self, buffer: &mut [u8]) -> Result<ReceiveResult, TransportError> {
        self.inner.receive_calls.fetch_add(1, Ordering::SeqCst);

        if let Some((kind, data)) = self.pending.take() {
            return Ok(self.deliver(kind, data, buffer));
        }

        match self.inbound.recv().await {
            Some(Inbound::Frame { kind, data }) => Ok(self.deliver(kind, data, buffer)),
            Some(Inbound::Held {
                kind,
                data,
                release,
            }) => {
                self.inner.held_receives.fetch_add(1, Ordering::SeqCst);
                tokio::task::block_in_place(|| release.recv_timeout(Duration::from_secs(5)))
                    .expect("held receive was never released");
                Ok(self.deliver(kind, data, buffer))
            }
            Some(Inbound::Close(status)) => {
                self.inner.state.set(SocketState::CloseReceived);
                Ok(ReceiveResult::closed(status))
            }
            Some(Inbound::Error(reason)) => {
                self.inner.state.set(SocketState::Aborted);
                Err(TransportError::Receive(reason))
            }
            None => std::future::pending().await,
        }
    }
}
