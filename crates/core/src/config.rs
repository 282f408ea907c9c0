use std::time::Duration;

use crate::error::{Result, StreamError};
use crate::protocol::keepalive::{
    CONTROL_PAYLOAD, DEFAULT_CONTROL_PORT, DEFAULT_STREAM_PORT, STREAM_PAYLOAD,
};

pub const DEFAULT_CAMERA_HOST: &str = "192.168.4.153";
pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;
/// Upper bound on the RGB placeholder buffer (`width * height * 3`).
pub const MAX_PLACEHOLDER_BYTES: usize = 256 * 1024 * 1024;

/// One keepalive endpoint on the camera: a port and the fixed bytes it expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepaliveTarget {
    pub port: u16,
    pub payload: Vec<u8>,
}

impl KeepaliveTarget {
    pub fn new(port: u16, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            port,
            payload: payload.into(),
        }
    }

    /// Parse `PORT:PAYLOAD`, e.g. `8070:0f`.
    pub fn parse(value: &str) -> Option<Self> {
        let (port, payload) = value.split_once(':')?;
        let port = port.trim().parse().ok()?;
        if payload.is_empty() {
            return None;
        }
        Some(Self::new(port, payload.as_bytes()))
    }
}

/// Receiver configuration.
///
/// Passed to [`StreamReceiver`](crate::StreamReceiver) at construction and
/// swapped in on [`reconfigure`](crate::StreamReceiver::reconfigure); never
/// read from process-wide state.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Camera host name or IP.
    pub remote_host: String,
    /// Camera stream port.
    pub remote_port: u16,
    /// Keepalive endpoints on `remote_host`.
    pub keepalive: Vec<KeepaliveTarget>,
    /// Cadence of the keepalive loop.
    pub keepalive_interval: Duration,
    /// A stream with no decoded frame for this long is considered stalled.
    pub frame_timeout: Duration,
    /// How often the liveness monitor polls.
    pub poll_interval: Duration,
    /// Local interface to bind; the port is always ephemeral.
    pub bind_host: String,
    /// Placeholder width.
    pub width: u32,
    /// Placeholder height.
    pub height: u32,
    /// Placeholder fill color (RGB).
    pub placeholder_color: [u8; 3],
    /// Reassembly buffers larger than this are discarded.
    pub max_frame_bytes: usize,
}

impl StreamConfig {
    /// Config for a camera at `host:port` with the default keepalive pair.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            remote_host: host.to_string(),
            remote_port: port,
            keepalive: vec![
                KeepaliveTarget::new(DEFAULT_CONTROL_PORT, CONTROL_PAYLOAD.to_vec()),
                KeepaliveTarget::new(port, STREAM_PAYLOAD.to_vec()),
            ],
            keepalive_interval: Duration::from_secs(1),
            frame_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_secs(2),
            bind_host: "0.0.0.0".to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            placeholder_color: [0, 0, 0],
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.remote_host.trim().is_empty() {
            return Err(StreamError::InvalidConfig("camera host is empty".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(StreamError::InvalidConfig(format!(
                "placeholder size {}x{} must be non-zero",
                self.width, self.height
            )));
        }
        let bytes = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|pixels| pixels.checked_mul(3));
        if bytes.is_none_or(|bytes| bytes > MAX_PLACEHOLDER_BYTES) {
            return Err(StreamError::InvalidConfig(format!(
                "placeholder size {}x{} is too large",
                self.width, self.height
            )));
        }
        if self.max_frame_bytes == 0 {
            return Err(StreamError::InvalidConfig("max_frame_bytes is zero".into()));
        }
        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CAMERA_HOST, DEFAULT_STREAM_PORT)
    }
}
