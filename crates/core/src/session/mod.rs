//! One lifetime of the receiver: socket, local port and running loops.
//!
//! A [`StreamSession`] is built whole by [`open`](StreamSession::open) and
//! torn down whole by [`close`](StreamSession::close). Nothing is carried
//! from one session to the next; a restart closes the old session (joining
//! both loops) before the new socket is bound.
//!
//! ```text
//! open:   resolve camera -> bind 0.0.0.0:0 -> spawn rx loop -> spawn keepalive loop
//! close:  trigger shutdown -> wake rx -> join rx -> join keepalive -> drop socket
//! ```

pub mod shutdown;

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::StreamConfig;
use crate::error::{Result, StreamError};
use crate::keepalive::KeepaliveSender;
use crate::receiver::{self, Pipeline};
use crate::transport::UdpTransport;

pub use shutdown::Shutdown;

/// Live socket plus the two loops running against it.
pub struct StreamSession {
    transport: Arc<UdpTransport>,
    shutdown: Shutdown,
    receive: Option<JoinHandle<()>>,
    keepalive: Option<JoinHandle<()>>,
}

impl StreamSession {
    /// Bind a fresh socket and start the receive and keepalive loops.
    pub(crate) fn open(config: &StreamConfig, pipeline: Arc<Pipeline>) -> Result<Self> {
        let camera = resolve_host(&config.remote_host)?;
        let targets: Vec<(SocketAddr, Vec<u8>)> = config
            .keepalive
            .iter()
            .map(|t| (SocketAddr::new(camera, t.port), t.payload.clone()))
            .collect();

        let transport = Arc::new(UdpTransport::bind(&config.bind_host)?);
        let shutdown = Shutdown::new();

        let receive = {
            let transport = transport.clone();
            let shutdown = shutdown.clone();
            thread::Builder::new()
                .name("camstream-rx".into())
                .spawn(move || receiver::receive_loop(&transport, &shutdown, &pipeline))?
        };

        let mut session = Self {
            transport: transport.clone(),
            shutdown: shutdown.clone(),
            receive: Some(receive),
            keepalive: None,
        };

        let sender = KeepaliveSender::new(transport, targets, config.keepalive_interval, shutdown);
        session.keepalive = Some(sender.spawn()?);

        Ok(session)
    }

    pub fn local_port(&self) -> u16 {
        self.transport.local_port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Stop both loops and wait for them. Safe to call more than once.
    ///
    /// The receive loop only notices shutdown after its blocking receive
    /// returns, which relies on the wake datagram reaching our own port over
    /// loopback. If loopback delivery fails, the join waits for the next
    /// datagram from the camera.
    pub fn close(&mut self) {
        if self.receive.is_none() && self.keepalive.is_none() {
            return;
        }

        self.shutdown.trigger();
        if !self.transport.wake() {
            tracing::warn!(port = self.local_port(), "close waiting on inbound datagram");
        }

        for (name, handle) in [("receive", self.receive.take()), ("keepalive", self.keepalive.take())] {
            if let Some(handle) = handle
                && handle.join().is_err()
            {
                tracing::warn!(port = self.local_port(), name, "loop panicked");
            }
        }
        tracing::debug!(port = self.local_port(), "session loops joined");
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Resolve the camera host to a single IP.
fn resolve_host(host: &str) -> Result<IpAddr> {
    (host, 0)
        .to_socket_addrs()
        .map_err(|e| StreamError::Resolve(format!("{host}: {e}")))?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| StreamError::Resolve(host.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_ip_literal() {
        assert_eq!(
            resolve_host("127.0.0.1").unwrap(),
            IpAddr::from([127, 0, 0, 1])
        );
    }

    #[test]
    fn unresolvable_host_is_an_error() {
        assert!(matches!(
            resolve_host("no-such-host.invalid"),
            Err(StreamError::Resolve(_))
        ));
    }
}
