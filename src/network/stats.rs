use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters describing a session's traffic so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames written by the writer task, including the hello frame
    pub frames_sent: u64,
    pub messages_received: u64,
    pub text_received: u64,
    pub decode_failures: u64,
    pub oversized_dropped: u64,
    /// Time between the latest send and the latest received message
    pub last_round_trip: Option<Duration>,
}

/// Lock-free counters updated by the writer task and the receive loop.
///
/// The last-sent reading is diagnostic only. Concurrent senders overwrite
/// each other and the latest write wins.
#[derive(Debug)]
pub(crate) struct Diagnostics {
    epoch: Instant,
    /// Nanoseconds since `epoch` plus one; zero means nothing was sent yet
    last_sent: AtomicU64,
    last_round_trip: AtomicU64,
    frames_sent: AtomicU64,
    messages_received: AtomicU64,
    text_received: AtomicU64,
    decode_failures: AtomicU64,
    oversized_dropped: AtomicU64,
}

impl Diagnostics {
    pub(crate) fn new() -> Self {
        Self {
            epoch: Instant::now(),
            last_sent: AtomicU64::new(0),
            last_round_trip: AtomicU64::new(0),
            frames_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            text_received: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            oversized_dropped: AtomicU64::new(0),
        }
    }

    fn now_nanos(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX - 1)
    }

    /// Record a successful write; returns the running frame count
    pub(crate) fn record_sent(&self) -> u64 {
        self.last_sent.store(self.now_nanos() + 1, Ordering::Release);
        self.frames_sent.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Elapsed time since the last successful send, stored as the latest
    /// round trip
    pub(crate) fn record_round_trip(&self) -> Option<Duration> {
        let sent = self.last_sent.load(Ordering::Acquire);
        if sent == 0 {
            return None;
        }
        let elapsed = self.now_nanos().saturating_sub(sent - 1);
        self.last_round_trip.store(elapsed + 1, Ordering::Relaxed);
        Some(Duration::from_nanos(elapsed))
    }

    pub(crate) fn record_message(&self) -> u64 {
        self.messages_received.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_text(&self) -> u64 {
        self.text_received.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_oversized(&self) {
        self.oversized_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SessionStats {
        let round_trip = self.last_round_trip.load(Ordering::Relaxed);
        SessionStats {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            text_received: self.text_received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            oversized_dropped: self.oversized_dropped.load(Ordering::Relaxed),
            last_round_trip: (round_trip > 0).then(|| Duration::from_nanos(round_trip - 1)),
        }
    }
}
