//! Acquisition of a UDP-encapsulated MJPEG camera stream.
//!
//! The camera pushes JPEG fragments over UDP to whoever keeps sending it
//! keepalives. This crate keeps that conversation going, reassembles the
//! fragments into frames, and publishes the latest decoded frame:
//!
//! ```no_run
//! use std::sync::Arc;
//! use camstream::{LivenessMonitor, StreamConfig, StreamReceiver};
//!
//! let receiver = Arc::new(StreamReceiver::new(StreamConfig::new("192.168.4.153", 8080))?);
//! receiver.start()?;
//! let _monitor = LivenessMonitor::spawn(receiver.clone())?;
//!
//! let frame = receiver.get_frame();
//! println!("{}x{} placeholder={}", frame.width(), frame.height(), frame.is_placeholder());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod keepalive;
pub mod media;
pub mod monitor;
pub mod protocol;
pub mod receiver;
pub mod session;
pub mod slot;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{KeepaliveTarget, StreamConfig};
pub use error::{DecodeError, FramingError, Result, StreamError};
pub use events::{StatsSnapshot, StreamEvent};
pub use keepalive::KeepaliveSender;
pub use media::{DecodedImage, FrameDecoder, JpegDecoder};
pub use monitor::{LivenessMonitor, Poll};
pub use protocol::{Frame, FrameReassembler};
pub use receiver::StreamReceiver;
pub use slot::{FrameSlot, FrameSource};
pub use transport::{PreviewConfig, PreviewServer};
