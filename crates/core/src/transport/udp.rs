use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use crate::error::{Result, StreamError};

/// The one UDP socket of a stream session.
///
/// Binds an ephemeral port on the configured interface. The receive loop
/// and the keepalive loop share it through an `Arc`: keepalives go out
/// from the same port the camera streams back to.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind `host:0` and record the port the OS assigned.
    pub fn bind(host: &str) -> Result<Self> {
        let addr = format!("{host}:0");
        let socket = UdpSocket::bind(&addr).map_err(|source| StreamError::Bind {
            addr: addr.clone(),
            source,
        })?;
        let local_addr = socket.local_addr()?;
        Ok(Self { socket, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn local_port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Send raw bytes to a specific socket address.
    pub fn send_to(&self, payload: &[u8], addr: SocketAddr) -> Result<usize> {
        Ok(self.socket.send_to(payload, addr)?)
    }

    /// Block until one datagram arrives. No timeout is set on the socket.
    pub fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf)
    }

    /// Unblock a pending [`recv_from`](Self::recv_from) by sending an empty
    /// datagram to our own port.
    ///
    /// Returns whether the datagram was sent. If it was not, the receiver
    /// stays blocked until the next inbound datagram.
    pub fn wake(&self) -> bool {
        let target = SocketAddr::new(loopback_for(self.local_addr.ip()), self.local_addr.port());
        match self.socket.send_to(&[], target) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    %target,
                    "wake datagram failed, receive loop may block until the next datagram"
                );
                false
            }
        }
    }
}

fn loopback_for(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(v4) if v4.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(v6) if v6.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn binds_ephemeral_port() {
        let transport = UdpTransport::bind("127.0.0.1").unwrap();
        assert_ne!(transport.local_port(), 0);
    }

    #[test]
    fn bind_failure_is_reported() {
        let err = UdpTransport::bind("192.0.2.1").unwrap_err();
        assert!(matches!(err, StreamError::Bind { .. }));
    }

    #[test]
    fn wake_unblocks_receive() {
        let transport = Arc::new(UdpTransport::bind("0.0.0.0").unwrap());
        let rx = transport.clone();
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 16];
            rx.recv_from(&mut buf).map(|(len, _)| len)
        });
        assert!(transport.wake());
        assert_eq!(handle.join().unwrap().unwrap(), 0);
    }

    #[test]
    fn wake_targets_loopback_for_wildcard_bind() {
        assert_eq!(
            loopback_for(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
        assert_eq!(
            loopback_for(IpAddr::V6(Ipv6Addr::UNSPECIFIED)),
            IpAddr::V6(Ipv6Addr::LOCALHOST)
        );
        let lan = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7));
        assert_eq!(loopback_for(lan), lan);
    }
}
