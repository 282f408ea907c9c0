use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};

use super::{DecodedImage, FrameDecoder};
use crate::error::DecodeError;
use crate::protocol::Frame;

/// [`FrameDecoder`] backed by the `image` crate's baseline/progressive JPEG decoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegDecoder;

impl FrameDecoder for JpegDecoder {
    fn decode(&self, frame: &Frame) -> Result<DecodedImage, DecodeError> {
        let image = image::load_from_memory_with_format(frame.as_bytes(), ImageFormat::Jpeg)?;
        Ok(DecodedImage::new(image.to_rgb8(), frame.clone()))
    }
}

/// Encode RGB pixels as a JPEG.
pub fn encode(pixels: &RgbImage, quality: u8) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    encoder.encode_image(pixels)?;
    Ok(out)
}
