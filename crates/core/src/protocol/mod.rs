//! Camera wire protocol.
//!
//! The camera pushes a JPEG byte stream over UDP. There is no sequence
//! number, length field or checksum at this layer:
//!
//! ```text
//! camera -> host (one datagram, <= 65536 bytes)
//! +----------------------+-------------------------------------+
//! | device header (8 B)  | JPEG fragment (0..N bytes)          |
//! +----------------------+-------------------------------------+
//!
//! host -> camera (keepalive, once per second per port)
//! +------+
//! | "0f" |  or  "Bv"
//! +------+
//! ```
//!
//! Frames are delimited purely by content markers: a frame starts at a
//! payload beginning with `FF D8` (SOI) and ends at the first `FF D9` (EOI)
//! after it.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`datagram`] | Header stripping and size limits |
//! | [`reassembly`] | Marker-driven frame state machine |
//! | [`keepalive`] | Fixed keepalive payloads |

pub mod datagram;
pub mod keepalive;
pub mod reassembly;

pub use reassembly::{Frame, FrameReassembler};
