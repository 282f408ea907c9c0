//! Decoded images and the decoder seam.
//!
//! The stream core treats JPEG bytes as opaque: an assembled [`Frame`] is
//! handed to a [`FrameDecoder`] and only a successful decode is published.
//! [`JpegDecoder`] is the default implementation, backed by the `image`
//! crate.

pub mod jpeg;

use image::{Rgb, RgbImage};

use crate::error::DecodeError;
use crate::protocol::Frame;

pub use jpeg::JpegDecoder;

/// Decode capability consumed by the receive loop.
///
/// Implementations must be cheap to share across threads; the receiver
/// calls [`decode`](Self::decode) from its receive thread without holding
/// any lock.
pub trait FrameDecoder: Send + Sync {
    fn decode(&self, frame: &Frame) -> Result<DecodedImage, DecodeError>;
}

/// A decoded frame, or the placeholder shown before any frame arrived.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pixels: RgbImage,
    source: Option<Frame>,
}

impl DecodedImage {
    /// Image decoded from `source`.
    pub fn new(pixels: RgbImage, source: Frame) -> Self {
        Self {
            pixels,
            source: Some(source),
        }
    }

    /// Solid-color filler of the given size.
    pub fn placeholder(width: u32, height: u32, color: [u8; 3]) -> Self {
        Self {
            pixels: RgbImage::from_pixel(width, height, Rgb(color)),
            source: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// The JPEG this image was decoded from, `None` for the placeholder.
    pub fn source(&self) -> Option<&Frame> {
        self.source.as_ref()
    }

    pub fn is_placeholder(&self) -> bool {
        self.source.is_none()
    }

    /// JPEG bytes for this image.
    ///
    /// Decoded frames return their original bytes untouched; the placeholder
    /// is encoded at `quality`.
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, DecodeError> {
        match &self.source {
            Some(frame) => Ok(frame.as_bytes().to_vec()),
            None => jpeg::encode(&self.pixels, quality),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_solid() {
        let image = DecodedImage::placeholder(4, 3, [10, 20, 30]);
        assert_eq!((image.width(), image.height()), (4, 3));
        assert!(image.is_placeholder());
        assert!(image.pixels().pixels().all(|p| p.0 == [10, 20, 30]));
    }

    #[test]
    fn placeholder_encodes_to_jpeg() {
        let jpeg = DecodedImage::placeholder(8, 8, [0, 0, 0]).to_jpeg(80).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn decoded_image_reuses_source_bytes() {
        let frame = Frame::new(b"\xff\xd8abc\xff\xd9".to_vec()).unwrap();
        let image = DecodedImage::new(RgbImage::new(1, 1), frame.clone());
        assert_eq!(image.to_jpeg(80).unwrap(), frame.as_bytes());
        assert!(!image.is_placeholder());
    }
}
