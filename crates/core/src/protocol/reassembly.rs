use std::fmt;
use std::sync::Arc;

use crate::error::FramingError;

/// JPEG start-of-image marker.
pub const SOI: [u8; 2] = [0xFF, 0xD8];
/// JPEG end-of-image marker.
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// A complete JPEG byte sequence, `SOI ..= EOI`.
///
/// Immutable once produced. Cloning shares the underlying bytes, so a
/// frame can be handed to any number of readers while the producer moves
/// on to the next one.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    data: Arc<[u8]>,
}

impl Frame {
    /// Wrap bytes that are already known to be `SOI ..= EOI`.
    pub(crate) fn from_validated(data: Vec<u8>) -> Self {
        debug_assert!(data.starts_with(&SOI) && data.ends_with(&EOI));
        Self { data: data.into() }
    }

    /// Build a frame from arbitrary bytes, checking both markers.
    pub fn new(data: impl Into<Vec<u8>>) -> Option<Self> {
        let data = data.into();
        if data.len() >= 4 && data.starts_with(&SOI) && data.ends_with(&EOI) {
            Some(Self::from_validated(data))
        } else {
            None
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame").field("len", &self.data.len()).finish()
    }
}

/// Result of feeding one payload to the [`FrameReassembler`].
///
/// A single payload can both discard an unfinished frame and complete a
/// new one (`SOI ... EOI` arriving while another frame was open).
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Step {
    pub frame: Option<Frame>,
    pub discarded: Option<FramingError>,
}

/// Marker-driven JPEG reassembly (no I/O).
///
/// ## Transitions, per payload
///
/// ```text
/// payload starts with SOI  -> (drop open buffer as TruncatedFrame) buffer = payload, collecting
/// collecting               -> buffer += payload
/// otherwise                -> ignore (pre-sync noise)
///
/// then, if collecting and the payload contains EOI:
///   first EOI in buffer at i -> emit buffer[..i+2], reset
///   no EOI in buffer         -> MissingEndMarker, reset
/// ```
///
/// Marker bytes are trusted over everything else. An `FF D9` pair inside
/// entropy-coded data ends the frame early; the decoder downstream is
/// expected to reject such frames.
#[derive(Debug, Default)]
pub struct FrameReassembler {
    buffer: Vec<u8>,
    collecting: bool,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one payload (datagram with the device header removed).
    pub fn push(&mut self, payload: &[u8]) -> Step {
        let mut step = Step::default();

        if payload.starts_with(&SOI) {
            if self.collecting && !self.buffer.is_empty() {
                step.discarded = Some(FramingError::TruncatedFrame {
                    discarded: self.buffer.len(),
                });
            }
            self.buffer = payload.to_vec();
            self.collecting = true;
        } else if self.collecting {
            self.buffer.extend_from_slice(payload);
        } else {
            tracing::trace!(len = payload.len(), "payload before sync ignored");
            return step;
        }

        if self.collecting && find_marker(payload, &EOI).is_some() {
            let buffer = std::mem::take(&mut self.buffer);
            self.collecting = false;

            match find_marker(&buffer, &EOI) {
                Some(end) => {
                    let mut data = buffer;
                    data.truncate(end + EOI.len());
                    step.frame = Some(Frame::from_validated(data));
                }
                None => {
                    step.discarded = Some(FramingError::MissingEndMarker {
                        discarded: buffer.len(),
                    });
                }
            }
        }

        step
    }

    /// Whether a frame is currently open.
    pub fn is_collecting(&self) -> bool {
        self.collecting
    }

    /// Bytes accumulated for the open frame.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop the open frame (if any), returning how many bytes were discarded.
    pub fn reset(&mut self) -> usize {
        let discarded = self.buffer.len();
        self.buffer = Vec::new();
        self.collecting = false;
        discarded
    }

    /// Lazily turn a payload sequence into the frames it completes.
    ///
    /// ```
    /// use camstream::FrameReassembler;
    ///
    /// let payloads: [&[u8]; 2] = [b"\xff\xd8AAA", b"BBB\xff\xd9"];
    /// let frames: Vec<_> = FrameReassembler::frames(payloads).collect();
    /// assert_eq!(frames.len(), 1);
    /// assert_eq!(frames[0].as_bytes(), b"\xff\xd8AAABBB\xff\xd9");
    /// ```
    pub fn frames<'a, I>(payloads: I) -> impl Iterator<Item = Frame> + 'a
    where
        I: IntoIterator<Item = &'a [u8]>,
        I::IntoIter: 'a,
    {
        let mut reassembler = Self::new();
        payloads
            .into_iter()
            .filter_map(move |payload| reassembler.push(payload).frame)
    }
}

/// Position of the first occurrence of a two-byte marker.
pub fn find_marker(haystack: &[u8], marker: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngExt;

    fn feed(payloads: &[&[u8]]) -> (Vec<Frame>, Vec<FramingError>) {
        let mut r = FrameReassembler::new();
        let mut frames = Vec::new();
        let mut discarded = Vec::new();
        for p in payloads {
            let step = r.push(p);
            frames.extend(step.frame);
            discarded.extend(step.discarded);
        }
        (frames, discarded)
    }

    #[test]
    fn frame_across_two_payloads() {
        let (frames, discarded) = feed(&[b"\xff\xd8AAA", b"BBB\xff\xd9"]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), b"\xff\xd8AAABBB\xff\xd9");
        assert!(discarded.is_empty());
    }

    #[test]
    fn new_start_discards_open_frame() {
        let (frames, discarded) = feed(&[b"\xff\xd8AAA", b"\xff\xd8BBB\xff\xd9"]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), b"\xff\xd8BBB\xff\xd9");
        assert_eq!(discarded, vec![FramingError::TruncatedFrame { discarded: 5 }]);
    }

    #[test]
    fn single_payload_frame() {
        let (frames, _) = feed(&[b"\xff\xd8X\xff\xd9"]);
        assert_eq!(frames[0].as_bytes(), b"\xff\xd8X\xff\xd9");
    }

    #[test]
    fn noise_before_sync_is_ignored() {
        let mut r = FrameReassembler::new();
        assert_eq!(r.push(b"junk\xff\xd9"), Step::default());
        assert!(!r.is_collecting());
        assert_eq!(r.buffered_len(), 0);
    }

    #[test]
    fn trailing_bytes_after_end_are_cut() {
        let (frames, _) = feed(&[b"\xff\xd8A", b"B\xff\xd9tail"]);
        assert_eq!(frames[0].as_bytes(), b"\xff\xd8AB\xff\xd9");
    }

    #[test]
    fn first_end_marker_wins() {
        let (frames, _) = feed(&[b"\xff\xd8A\xff\xd9B\xff\xd9"]);
        assert_eq!(frames[0].as_bytes(), b"\xff\xd8A\xff\xd9");
    }

    #[test]
    fn end_marker_split_across_payloads_is_found_later() {
        // FF | D9 split: the second payload alone has no EOI, so the frame
        // stays open until a later payload carries one.
        let mut r = FrameReassembler::new();
        assert!(r.push(b"\xff\xd8A\xff").frame.is_none());
        assert!(r.push(b"\xd9B").frame.is_none());
        let frame = r.push(b"C\xff\xd9").frame.unwrap();
        assert_eq!(frame.as_bytes(), b"\xff\xd8A\xff\xd9");
    }

    #[test]
    fn resets_after_frame() {
        let mut r = FrameReassembler::new();
        r.push(b"\xff\xd8A\xff\xd9");
        assert!(!r.is_collecting());
        assert!(r.push(b"orphan").frame.is_none());
        assert_eq!(r.buffered_len(), 0);
    }

    #[test]
    fn soi_only_payload_does_not_end_frame() {
        let (frames, discarded) = feed(&[b"\xff\xd8"]);
        assert!(frames.is_empty());
        assert!(discarded.is_empty());
    }

    #[test]
    fn empty_payload_while_collecting() {
        let (frames, _) = feed(&[b"\xff\xd8A", b"", b"\xff\xd9"]);
        assert_eq!(frames[0].as_bytes(), b"\xff\xd8A\xff\xd9");
    }

    #[test]
    fn manual_reset_reports_discarded_bytes() {
        let mut r = FrameReassembler::new();
        r.push(b"\xff\xd8ABC");
        assert_eq!(r.reset(), 5);
        assert!(!r.is_collecting());
    }

    #[test]
    fn lazy_frames_iterator() {
        let payloads: [&[u8]; 4] = [
            b"noise",
            b"\xff\xd81\xff\xd9",
            b"\xff\xd82",
            b"2\xff\xd9",
        ];
        let frames: Vec<Frame> = FrameReassembler::frames(payloads).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].as_bytes(), b"\xff\xd822\xff\xd9");
    }

    #[test]
    fn frame_new_validates_markers() {
        assert!(Frame::new(b"\xff\xd8\xff\xd9".to_vec()).is_some());
        assert!(Frame::new(b"\xff\xd8\xd9".to_vec()).is_none());
        assert!(Frame::new(b"\xff\xd9\xff\xd8".to_vec()).is_none());
    }

    #[test]
    fn random_payloads_only_produce_well_formed_frames() {
        let mut rng = rand::rng();
        let mut r = FrameReassembler::new();
        let alphabet = [0xFFu8, 0xD8, 0xD9, 0x00, 0x41];

        for _ in 0..5000 {
            let len = (rng.random::<u32>() % 12) as usize;
            let payload: Vec<u8> = (0..len)
                .map(|_| alphabet[(rng.random::<u32>() % alphabet.len() as u32) as usize])
                .collect();

            if let Some(frame) = r.push(&payload).frame {
                let bytes = frame.as_bytes();
                assert!(bytes.starts_with(&SOI), "{bytes:02X?}");
                assert!(bytes.ends_with(&EOI), "{bytes:02X?}");
                assert_eq!(find_marker(bytes, &EOI), Some(bytes.len() - 2));
            }
        }
    }
}
