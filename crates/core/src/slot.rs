//! The latest-frame slot shared between the receive loop and readers.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::media::DecodedImage;

/// Anything that can hand out the current frame (preview server, UI timer).
pub trait FrameSource: Send + Sync {
    fn latest(&self) -> Arc<DecodedImage>;
}

struct SlotState {
    image: Arc<DecodedImage>,
    updated_at: Option<Instant>,
}

/// Most recently decoded image and when it was produced.
///
/// Writers replace the whole snapshot, readers clone the `Arc`; the lock
/// covers only that pointer swap or copy, never a decode or socket call.
/// A reader therefore sees either the old image or the new one in full.
pub struct FrameSlot {
    state: Mutex<SlotState>,
}

impl FrameSlot {
    /// Slot holding `placeholder`, with no frame timestamp.
    pub fn new(placeholder: DecodedImage) -> Self {
        Self {
            state: Mutex::new(SlotState {
                image: Arc::new(placeholder),
                updated_at: None,
            }),
        }
    }

    pub fn snapshot(&self) -> Arc<DecodedImage> {
        self.state.lock().image.clone()
    }

    /// When the current image was published; `None` while showing a placeholder.
    pub fn updated_at(&self) -> Option<Instant> {
        self.state.lock().updated_at
    }

    pub fn publish(&self, image: DecodedImage, at: Instant) {
        let image = Arc::new(image);
        let mut state = self.state.lock();
        state.image = image;
        state.updated_at = Some(at);
    }

    /// Back to a placeholder, forgetting the last frame time.
    pub fn reset(&self, placeholder: DecodedImage) {
        let image = Arc::new(placeholder);
        let mut state = self.state.lock();
        state.image = image;
        state.updated_at = None;
    }
}

impl FrameSource for FrameSlot {
    fn latest(&self) -> Arc<DecodedImage> {
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use crate::protocol::Frame;
    use image::{Rgb, RgbImage};

    fn solid(size: u32, value: u8) -> DecodedImage {
        let frame = Frame::new(vec![0xFF, 0xD8, value, 0xFF, 0xD9]).unwrap();
        DecodedImage::new(RgbImage::from_pixel(size, size, Rgb([value; 3])), frame)
    }

    #[test]
    fn starts_with_placeholder() {
        let slot = FrameSlot::new(DecodedImage::placeholder(2, 2, [0, 0, 0]));
        assert!(slot.snapshot().is_placeholder());
        assert!(slot.updated_at().is_none());
    }

    #[test]
    fn publish_then_reset() {
        let slot = FrameSlot::new(DecodedImage::placeholder(2, 2, [0, 0, 0]));
        let now = Instant::now();
        slot.publish(solid(3, 7), now);
        assert_eq!(slot.updated_at(), Some(now));
        assert_eq!(slot.snapshot().width(), 3);

        slot.reset(DecodedImage::placeholder(5, 4, [1, 2, 3]));
        let image = slot.snapshot();
        assert!(image.is_placeholder());
        assert_eq!((image.width(), image.height()), (5, 4));
        assert!(slot.updated_at().is_none());
    }

    #[test]
    fn snapshot_outlives_replacement() {
        let slot = FrameSlot::new(DecodedImage::placeholder(2, 2, [0, 0, 0]));
        slot.publish(solid(4, 1), Instant::now());
        let held = slot.snapshot();
        slot.publish(solid(6, 2), Instant::now());
        assert_eq!(held.width(), 4);
        assert!(held.pixels().pixels().all(|p| p.0 == [1; 3]));
    }

    #[test]
    fn concurrent_readers_never_see_mixed_frames() {
        let slot = Arc::new(FrameSlot::new(solid(8, 0)));

        let writer = {
            let slot = slot.clone();
            thread::spawn(move || {
                for i in 0..500u32 {
                    let value = (i % 250) as u8;
                    slot.publish(solid(8 + (i % 3), value), Instant::now());
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let slot = slot.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        let image = slot.snapshot();
                        let first = image.pixels().get_pixel(0, 0).0;
                        assert!(image.pixels().pixels().all(|p| p.0 == first));
                        let tag = image.source().unwrap().as_bytes()[2];
                        assert_eq!(first, [tag; 3]);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
