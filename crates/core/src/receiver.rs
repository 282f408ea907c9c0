//! Stream receiver: socket lifecycle, receive loop and the latest-frame slot.
//!
//! ```text
//!             +------------------ StreamSession ------------------+
//! camera ---> | UdpTransport --recv--> receive_loop                |
//!   ^         |      |                  strip header               |
//!   |         |      |                  FrameReassembler           |
//!   +--send-- | KeepaliveSender         FrameDecoder (no lock held) |
//!             +-------------------------------|-------------------+
//!                                             v
//!                                   FrameSlot (Arc swap) ---> get_frame()
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::clock::{Clock, SystemClock};
use crate::config::StreamConfig;
use crate::error::{FramingError, Result, StreamError};
use crate::events::{EventBus, StatsSnapshot, StreamEvent, StreamStats};
use crate::media::{DecodedImage, FrameDecoder, JpegDecoder};
use crate::protocol::datagram::{self, MAX_DATAGRAM_LEN};
use crate::protocol::{Frame, FrameReassembler};
use crate::session::{Shutdown, StreamSession};
use crate::slot::{FrameSlot, FrameSource};
use crate::transport::UdpTransport;

/// Everything the receive loop needs besides the socket.
///
/// Shared by the receiver and each session's receive thread; it outlives
/// sessions so counters and the slot persist across restarts.
pub(crate) struct Pipeline {
    pub(crate) slot: FrameSlot,
    pub(crate) decoder: Arc<dyn FrameDecoder>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) events: EventBus,
    pub(crate) stats: StreamStats,
    max_frame_bytes: RwLock<usize>,
}

impl Pipeline {
    fn framing(&self, err: FramingError) {
        self.stats.record_framing(&err);
        self.events.emit(StreamEvent::Framing(err));
    }

    /// Feed one datagram through header stripping and reassembly.
    fn handle_datagram(
        &self,
        reassembler: &mut FrameReassembler,
        datagram: &[u8],
        from: std::net::SocketAddr,
    ) {
        self.stats.record_datagram();

        let Some(payload) = datagram::payload(datagram) else {
            self.framing(FramingError::ShortDatagram {
                len: datagram.len(),
                from,
            });
            return;
        };

        let step = reassembler.push(payload);
        if let Some(err) = step.discarded {
            self.framing(err);
        }

        let limit = *self.max_frame_bytes.read();
        if reassembler.buffered_len() > limit {
            let discarded = reassembler.reset();
            self.framing(FramingError::Oversized { discarded, limit });
        }

        if let Some(frame) = step.frame {
            self.publish(frame);
        }
    }

    /// Decode outside any lock, then swap the slot on success.
    fn publish(&self, frame: Frame) {
        self.stats.record_assembled();
        tracing::trace!(len = frame.len(), "frame assembled");

        match self.decoder.decode(&frame) {
            Ok(image) => {
                self.slot.publish(image, self.clock.now());
                self.stats.record_decoded();
            }
            Err(err) => {
                self.stats.record_decode_failure();
                self.events.emit(StreamEvent::DecodeFailed(err));
            }
        }
    }
}

/// Blocking receive loop of one session.
///
/// Exits when the shutdown signal is set (checked after every receive) or
/// on any socket error; neither case is propagated.
pub(crate) fn receive_loop(transport: &UdpTransport, shutdown: &Shutdown, pipeline: &Pipeline) {
    let port = transport.local_port();
    tracing::debug!(port, "receive loop started");

    let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
    let mut reassembler = FrameReassembler::new();

    loop {
        let received = transport.recv_from(&mut buf);
        if shutdown.is_triggered() {
            break;
        }
        match received {
            Ok((len, from)) => pipeline.handle_datagram(&mut reassembler, &buf[..len], from),
            Err(e) => {
                tracing::warn!(port, error = %e, "receive failed, loop exiting");
                break;
            }
        }
    }

    tracing::debug!(port, "receive loop exited");
}

/// Owns the UDP session and publishes the latest decoded frame.
///
/// All operations take `&self`, so a receiver behind an `Arc` can be driven
/// by a UI thread and a [`LivenessMonitor`](crate::LivenessMonitor) at once.
/// Lifecycle calls (`start`, `stop`, `restart`) are serialized on the
/// session lock.
pub struct StreamReceiver {
    config: RwLock<Arc<StreamConfig>>,
    pipeline: Arc<Pipeline>,
    session: Mutex<Option<StreamSession>>,
    /// Set by `start`, cleared by `stop`; a failed restart leaves it set.
    wanted: AtomicBool,
}

impl StreamReceiver {
    /// Receiver with the `image` JPEG decoder and the system clock.
    pub fn new(config: StreamConfig) -> Result<Self> {
        Self::with_parts(config, Arc::new(JpegDecoder), Arc::new(SystemClock))
    }

    /// Receiver with a custom decoder and clock.
    pub fn with_parts(
        config: StreamConfig,
        decoder: Arc<dyn FrameDecoder>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let pipeline = Pipeline {
            slot: FrameSlot::new(placeholder(&config)),
            decoder,
            clock,
            events: EventBus::new(),
            stats: StreamStats::default(),
            max_frame_bytes: RwLock::new(config.max_frame_bytes),
        };
        Ok(Self {
            config: RwLock::new(Arc::new(config)),
            pipeline: Arc::new(pipeline),
            session: Mutex::new(None),
            wanted: AtomicBool::new(false),
        })
    }

    /// Bind a new socket and launch the receive and keepalive loops.
    ///
    /// Returns the local port the camera should stream to.
    pub fn start(&self) -> Result<u16> {
        let mut session = self.session.lock();
        if session.is_some() {
            return Err(StreamError::AlreadyRunning);
        }
        self.wanted.store(true, Ordering::SeqCst);
        self.open_locked(&mut session)
    }

    /// Stop both loops and release the socket. A no-op when already stopped.
    pub fn stop(&self) {
        self.wanted.store(false, Ordering::SeqCst);
        Self::close_locked(&mut self.session.lock(), &self.pipeline.events);
    }

    /// Stop, reset the slot to the placeholder, start again.
    ///
    /// If the new bind fails the receiver stays stopped (but still wanted);
    /// the error is returned so the caller can retry.
    pub fn restart(&self) -> Result<u16> {
        let mut session = self.session.lock();
        self.wanted.store(true, Ordering::SeqCst);
        self.restart_locked(&mut session)
    }

    /// Restart only if the owner still wants the stream up.
    ///
    /// The check happens under the session lock, so a concurrent
    /// [`stop`](Self::stop) either wins (returns `None`, nothing is bound)
    /// or waits and tears down the new session.
    pub fn restart_if_wanted(&self) -> Option<Result<u16>> {
        let mut session = self.session.lock();
        if !self.is_wanted() {
            return None;
        }
        Some(self.restart_locked(&mut session))
    }

    fn restart_locked(&self, session: &mut Option<StreamSession>) -> Result<u16> {
        Self::close_locked(session, &self.pipeline.events);
        self.pipeline.slot.reset(placeholder(&self.config()));
        self.pipeline.stats.record_restart();

        match self.open_locked(session) {
            Ok(port) => {
                self.pipeline.events.emit(StreamEvent::Restarted { port });
                Ok(port)
            }
            Err(err) => {
                self.pipeline.events.emit(StreamEvent::RestartFailed {
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Swap in a new configuration and restart with it.
    pub fn reconfigure(&self, config: StreamConfig) -> Result<u16> {
        config.validate()?;
        *self.pipeline.max_frame_bytes.write() = config.max_frame_bytes;
        *self.config.write() = Arc::new(config);
        self.restart()
    }

    /// Current image: the last decoded frame, or the placeholder.
    ///
    /// Never blocks on the network; the returned snapshot is immutable and
    /// unaffected by later frames.
    pub fn get_frame(&self) -> Arc<DecodedImage> {
        self.pipeline.slot.snapshot()
    }

    /// Whether a frame was decoded less than `timeout` ago.
    pub fn is_alive(&self, timeout: Duration) -> bool {
        self.last_frame_age().is_some_and(|age| age < timeout)
    }

    /// Time since the last decoded frame; `None` if none since (re)start.
    pub fn last_frame_age(&self) -> Option<Duration> {
        let at: Instant = self.pipeline.slot.updated_at()?;
        Some(self.pipeline.clock.now().saturating_duration_since(at))
    }

    pub fn is_running(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Whether the owner wants the stream up (started and not stopped).
    pub fn is_wanted(&self) -> bool {
        self.wanted.load(Ordering::SeqCst)
    }

    pub fn local_port(&self) -> Option<u16> {
        self.session.lock().as_ref().map(StreamSession::local_port)
    }

    pub fn config(&self) -> Arc<StreamConfig> {
        self.config.read().clone()
    }

    pub fn subscribe(&self) -> mpsc::Receiver<StreamEvent> {
        self.pipeline.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.pipeline.events
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.pipeline.stats.snapshot()
    }

    fn open_locked(&self, session: &mut Option<StreamSession>) -> Result<u16> {
        let config = self.config();
        let opened = StreamSession::open(&config, self.pipeline.clone())?;
        let port = opened.local_port();
        *session = Some(opened);

        tracing::info!(
            port,
            camera = %config.remote_host,
            camera_port = config.remote_port,
            "stream receiver started"
        );
        self.pipeline.events.emit(StreamEvent::Bound { port });
        Ok(port)
    }

    fn close_locked(session: &mut Option<StreamSession>, events: &EventBus) {
        if let Some(mut old) = session.take() {
            let port = old.local_port();
            old.close();
            events.emit(StreamEvent::Stopped { port });
        }
    }
}

impl FrameSource for StreamReceiver {
    fn latest(&self) -> Arc<DecodedImage> {
        self.get_frame()
    }
}

impl Drop for StreamReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn placeholder(config: &StreamConfig) -> DecodedImage {
    DecodedImage::placeholder(config.width, config.height, config.placeholder_color)
}
