use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::session::Shutdown;
use crate::transport::UdpTransport;

/// Periodically pokes the camera so it keeps streaming to our port.
///
/// Best effort: nothing is expected back, and a failed send to one target
/// is logged without affecting the others or the next round.
pub struct KeepaliveSender {
    transport: Arc<UdpTransport>,
    targets: Vec<(SocketAddr, Vec<u8>)>,
    interval: Duration,
    shutdown: Shutdown,
}

impl KeepaliveSender {
    pub fn new(
        transport: Arc<UdpTransport>,
        targets: Vec<(SocketAddr, Vec<u8>)>,
        interval: Duration,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            transport,
            targets,
            interval,
            shutdown,
        }
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("camstream-keepalive".into())
            .spawn(move || self.run())
    }

    /// Send one round immediately, then one per interval until shutdown.
    pub fn run(self) {
        tracing::debug!(
            port = self.transport.local_port(),
            targets = self.targets.len(),
            "keepalive loop started"
        );
        loop {
            self.send_round();
            if self.shutdown.wait_timeout(self.interval) {
                break;
            }
        }
        tracing::debug!(port = self.transport.local_port(), "keepalive loop exited");
    }

    /// Returns how many targets were reached.
    pub fn send_round(&self) -> usize {
        let mut sent = 0;
        for (addr, payload) in &self.targets {
            match self.transport.send_to(payload, *addr) {
                Ok(_) => sent += 1,
                Err(e) => tracing::warn!(%addr, error = %e, "keepalive send failed"),
            }
        }
        tracing::trace!(sent, "keepalive round");
        sent
    }
}
