//! Keepalive payloads (host -> camera).
//!
//! Each keepalive is a fixed 2-byte ASCII datagram. The camera keeps
//! pushing stream data to the sender's address for as long as it keeps
//! receiving these; nothing is sent back in response.

/// Payload sent to the camera's control port.
pub const CONTROL_PAYLOAD: &[u8; 2] = b"0f";

/// Payload sent to the camera's stream port.
pub const STREAM_PAYLOAD: &[u8; 2] = b"Bv";

/// Default camera control port (receives [`CONTROL_PAYLOAD`]).
pub const DEFAULT_CONTROL_PORT: u16 = 8070;

/// Default camera stream port (receives [`STREAM_PAYLOAD`]).
pub const DEFAULT_STREAM_PORT: u16 = 8080;
