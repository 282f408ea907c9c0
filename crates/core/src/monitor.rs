use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::events::StreamEvent;
use crate::receiver::StreamReceiver;
use crate::session::Shutdown;

/// Outcome of a single liveness poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// A frame arrived within the timeout.
    Alive,
    /// The receiver was stopped on purpose (possibly mid-poll); nothing to recover.
    Idle,
    /// Stall detected and the session was rebuilt.
    Restarted { port: u16 },
    /// Stall detected but the rebuild failed; retried next poll.
    RestartFailed,
}

/// Restarts a [`StreamReceiver`] whose last frame is older than a timeout.
///
/// Every stall gets the same treatment, a full stop/start. There is no
/// backoff or retry cap: a camera that keeps stalling is restarted every
/// poll.
pub struct LivenessMonitor {
    shutdown: Shutdown,
    handle: Option<JoinHandle<()>>,
}

impl LivenessMonitor {
    /// Poll with the receiver's configured timeout and interval.
    pub fn spawn(receiver: Arc<StreamReceiver>) -> std::io::Result<Self> {
        let config = receiver.config();
        Self::spawn_with(receiver, config.poll_interval, config.frame_timeout)
    }

    pub fn spawn_with(
        receiver: Arc<StreamReceiver>,
        interval: Duration,
        timeout: Duration,
    ) -> std::io::Result<Self> {
        let shutdown = Shutdown::new();
        let signal = shutdown.clone();
        let handle = thread::Builder::new()
            .name("camstream-liveness".into())
            .spawn(move || {
                tracing::debug!(?interval, ?timeout, "liveness monitor started");
                while !signal.wait_timeout(interval) {
                    Self::poll(&receiver, timeout);
                }
                tracing::debug!("liveness monitor exited");
            })?;

        Ok(Self {
            shutdown,
            handle: Some(handle),
        })
    }

    /// Check once and restart on a stall.
    pub fn poll(receiver: &StreamReceiver, timeout: Duration) -> Poll {
        if !receiver.is_wanted() {
            return Poll::Idle;
        }
        if receiver.is_alive(timeout) {
            return Poll::Alive;
        }

        receiver.events().emit(StreamEvent::StallDetected {
            idle: receiver.last_frame_age(),
        });

        match receiver.restart_if_wanted() {
            None => Poll::Idle,
            Some(Ok(port)) => Poll::Restarted { port },
            Some(Err(_)) => Poll::RestartFailed,
        }
    }

    /// Stop polling and wait for the monitor thread.
    pub fn stop(&mut self) {
        self.shutdown.trigger();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::warn!("liveness monitor panicked");
        }
    }
}

impl Drop for LivenessMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::StreamConfig;
    use crate::media::JpegDecoder;

    fn receiver(clock: Arc<ManualClock>, bind_host: &str) -> StreamReceiver {
        let mut config = StreamConfig::new("127.0.0.1", 9);
        config.bind_host = bind_host.into();
        config.keepalive.clear();
        StreamReceiver::with_parts(config, Arc::new(JpegDecoder), clock).unwrap()
    }

    #[test]
    fn stopped_receiver_is_left_alone() {
        let rx = receiver(Arc::new(ManualClock::new()), "127.0.0.1");
        assert_eq!(LivenessMonitor::poll(&rx, Duration::from_secs(2)), Poll::Idle);
        assert!(!rx.is_running());
    }

    #[test]
    fn stall_triggers_restart() {
        let rx = receiver(Arc::new(ManualClock::new()), "127.0.0.1");
        rx.start().unwrap();
        let events = rx.subscribe();

        let outcome = LivenessMonitor::poll(&rx, Duration::from_secs(2));
        let Poll::Restarted { port } = outcome else {
            panic!("expected restart, got {outcome:?}");
        };
        assert_eq!(rx.local_port(), Some(port));
        assert_ne!(port, 0);

        assert_eq!(
            events.try_recv().unwrap(),
            StreamEvent::StallDetected { idle: None }
        );
        assert_eq!(rx.stats().restarts, 1);
        rx.stop();
    }

    #[test]
    fn failed_restart_is_retried_on_next_poll() {
        let rx = receiver(Arc::new(ManualClock::new()), "192.0.2.1");
        assert!(rx.start().is_err());
        // start() failed but the owner still wants the stream up
        assert_eq!(
            LivenessMonitor::poll(&rx, Duration::from_secs(2)),
            Poll::RestartFailed
        );
        assert_eq!(
            LivenessMonitor::poll(&rx, Duration::from_secs(2)),
            Poll::RestartFailed
        );
        assert_eq!(rx.stats().restarts, 2);
    }

    #[test]
    fn monitor_thread_stops_promptly() {
        let rx = Arc::new(receiver(Arc::new(ManualClock::new()), "127.0.0.1"));
        let mut monitor =
            LivenessMonitor::spawn_with(rx, Duration::from_secs(60), Duration::from_secs(2))
                .unwrap();
        let start = std::time::Instant::now();
        monitor.stop();
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
