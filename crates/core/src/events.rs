//! Diagnostic events and counters.
//!
//! Every event is logged through `tracing` when emitted. Callers that want
//! to react to events (a UI status line, a test) can also
//! [`subscribe`](EventBus::subscribe) for a channel copy.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{DecodeError, FramingError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A new session bound its socket.
    Bound { port: u16 },
    /// A session was torn down.
    Stopped { port: u16 },
    /// Non-fatal framing fault (short datagram or dropped frame).
    Framing(FramingError),
    /// The decoder rejected an assembled frame; the previous frame is kept.
    DecodeFailed(DecodeError),
    /// No frame decoded within the timeout (`None` = never received one).
    StallDetected { idle: Option<Duration> },
    /// A full stop/start cycle completed.
    Restarted { port: u16 },
    /// A restart could not bind a new session.
    RestartFailed { error: String },
}

/// Fan-out of [`StreamEvent`]s to any number of channel subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<StreamEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Log the event and deliver it to live subscribers.
    pub fn emit(&self, event: StreamEvent) {
        match &event {
            StreamEvent::Bound { port } => tracing::info!(port, "stream socket bound"),
            StreamEvent::Stopped { port } => tracing::info!(port, "stream session stopped"),
            StreamEvent::Framing(err @ FramingError::ShortDatagram { .. }) => {
                tracing::debug!(error = %err, "malformed datagram discarded")
            }
            StreamEvent::Framing(err) => tracing::warn!(error = %err, "frame dropped"),
            StreamEvent::DecodeFailed(err) => {
                tracing::warn!(error = %err, "frame rejected by decoder, keeping previous")
            }
            StreamEvent::StallDetected { idle } => {
                tracing::warn!(idle = ?idle, "stream stalled")
            }
            StreamEvent::Restarted { port } => tracing::info!(port, "stream restarted"),
            StreamEvent::RestartFailed { error } => {
                tracing::warn!(error = %error, "restart failed, will retry")
            }
        }

        let mut subscribers = self.subscribers.lock();
        if !subscribers.is_empty() {
            subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Counters over the receiver's whole lifetime (they survive restarts).
#[derive(Debug, Default)]
pub struct StreamStats {
    datagrams: AtomicU64,
    short_datagrams: AtomicU64,
    frames_assembled: AtomicU64,
    frames_dropped: AtomicU64,
    frames_decoded: AtomicU64,
    decode_failures: AtomicU64,
    restarts: AtomicU64,
}

/// Point-in-time copy of [`StreamStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub datagrams: u64,
    pub short_datagrams: u64,
    pub frames_assembled: u64,
    pub frames_dropped: u64,
    pub frames_decoded: u64,
    pub decode_failures: u64,
    pub restarts: u64,
}

impl StreamStats {
    pub fn record_datagram(&self) {
        self.datagrams.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_framing(&self, err: &FramingError) {
        if err.is_dropped_frame() {
            self.frames_dropped.fetch_add(1, Ordering::Relaxed);
        } else {
            self.short_datagrams.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_assembled(&self) {
        self.frames_assembled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decoded(&self) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            datagrams: self.datagrams.load(Ordering::Relaxed),
            short_datagrams: self.short_datagrams.load(Ordering::Relaxed),
            frames_assembled: self.frames_assembled.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
        }
    }
}
