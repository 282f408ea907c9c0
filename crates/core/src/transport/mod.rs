//! Network transport layer.
//!
//! - **UDP** ([`udp`]): the camera session socket. One ephemeral socket per
//!   session carries both the inbound stream and the outbound keepalives.
//!
//! - **HTTP** ([`http`]): the MJPEG preview server. One TCP connection per
//!   client, with a thread per connection.

pub mod http;
pub mod udp;

pub use http::{PreviewConfig, PreviewServer};
pub use udp::UdpTransport;
