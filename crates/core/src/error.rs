//! Error types for the camera stream library.

use std::fmt;
use std::net::SocketAddr;

/// Errors that can occur in the camera stream library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Transport**: [`Io`](Self::Io), [`Bind`](Self::Bind),
///   [`Resolve`](Self::Resolve): socket/network failures. A bind or
///   resolve failure is fatal to [`StreamReceiver::start`](crate::StreamReceiver::start).
/// - **Lifecycle**: [`AlreadyRunning`](Self::AlreadyRunning).
/// - **Configuration**: [`InvalidConfig`](Self::InvalidConfig).
/// - **Media**: [`Decode`](Self::Decode).
/// - **Preview**: [`Parse`](Self::Parse): malformed HTTP request.
///
/// Framing problems never surface here; see [`FramingError`].
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The OS could not allocate a socket/port for the requested address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The camera host did not resolve to any socket address.
    #[error("could not resolve camera address: {0}")]
    Resolve(String),

    /// [`StreamReceiver::start`](crate::StreamReceiver::start) was called while a session is live.
    #[error("receiver already running")]
    AlreadyRunning,

    /// Configuration rejected by [`StreamConfig::validate`](crate::StreamConfig::validate).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Image decoding or encoding failed.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Failed to parse an HTTP request on the preview server.
    #[error("HTTP parse error: {kind}")]
    Parse { kind: ParseErrorKind },
}

/// The external decoder rejected a set of bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("decode failed: {message}")]
pub struct DecodeError {
    pub message: String,
}

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<image::ImageError> for DecodeError {
    fn from(err: image::ImageError) -> Self {
        Self::new(err.to_string())
    }
}

/// Non-fatal framing fault, recorded as an event and a counter.
///
/// Every variant leaves the reassembler in a clean state so the stream
/// resynchronizes on the next start-of-image marker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    /// Datagram too short to carry the device header.
    #[error("short datagram ({len} bytes) from {from}")]
    ShortDatagram { len: usize, from: SocketAddr },

    /// A new start-of-image arrived before the previous frame ended.
    #[error("truncated frame discarded ({discarded} bytes)")]
    TruncatedFrame { discarded: usize },

    /// End-of-image seen in a payload but not found in the buffer.
    #[error("end marker missing from buffer ({discarded} bytes discarded)")]
    MissingEndMarker { discarded: usize },

    /// Buffer exceeded the configured frame size bound.
    #[error("frame exceeded {limit} bytes ({discarded} bytes discarded)")]
    Oversized { discarded: usize, limit: usize },
}

impl FramingError {
    /// Whether this fault cost a (partial) frame, as opposed to a stray datagram.
    pub fn is_dropped_frame(&self) -> bool {
        !matches!(self, Self::ShortDatagram { .. })
    }
}

/// Specific kind of HTTP parse failure.
#[derive(Debug)]
pub enum ParseErrorKind {
    /// Input was empty (no request line).
    EmptyRequest,
    /// Request line did not have the expected `Method Path Version` format.
    InvalidRequestLine,
    /// A header line did not contain a colon separator.
    InvalidHeader,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRequest => write!(f, "empty request"),
            Self::InvalidRequestLine => write!(f, "invalid request line"),
            Self::InvalidHeader => write!(f, "invalid header"),
        }
    }
}

/// Convenience alias for `Result<T, StreamError>`.
pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_datagram_is_not_a_dropped_frame() {
        let err = FramingError::ShortDatagram {
            len: 3,
            from: "127.0.0.1:9".parse().unwrap(),
        };
        assert!(!err.is_dropped_frame());
        assert!(FramingError::TruncatedFrame { discarded: 10 }.is_dropped_frame());
    }

    #[test]
    fn bind_error_names_address() {
        let err = StreamError::Bind {
            addr: "0.0.0.0:0".into(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "busy"),
        };
        assert_eq!(err.to_string(), "failed to bind 0.0.0.0:0: busy");
    }
}
