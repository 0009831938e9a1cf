//! Frame handle.
//!
//! A `Frame` is one capture: an owned RGB8 pixel buffer plus the metadata the
//! loop needs. Frames are produced by a `FrameSource`, borrowed by the detector
//! and the sink, and dropped at the end of the tick. There is no `Clone`; a
//! frame lives for exactly one tick.

use std::time::Instant;

use crate::detect::BoundingBox;
use crate::error::CaptureError;

/// Bytes per pixel of the packed RGB8 layout every frame uses.
pub const RGB_CHANNELS: usize = 3;

pub struct Frame {
    /// Packed RGB8, row-major, no padding.
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// 1-based sequence number assigned by the source.
    pub sequence: u64,

    captured_at: Instant,

    annotations: Vec<Annotation>,
}

/// Overlay annotation attached to a frame before rendering.
///
/// Sinks that draw text read `text`; boxes are already rasterised into the
/// pixels when the overlay requested them.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub bbox: BoundingBox,
    pub text: Option<String>,
}

impl Frame {
    /// Wrap a packed RGB8 buffer. The buffer length must match the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self, CaptureError> {
        let expected = expected_len(width, height).ok_or_else(|| {
            CaptureError::Device(format!("frame dimensions {}x{} overflow", width, height))
        })?;
        if data.len() != expected {
            return Err(CaptureError::Device(format!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence,
            captured_at: Instant::now(),
            annotations: Vec::new(),
        })
    }

    /// Read-only pixel access for detectors and sinks.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub(crate) fn push_annotation(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for Frame {
    // Pixel bytes are never printed.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("annotations", &self.annotations.len())
            .finish()
    }
}

pub(crate) fn expected_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(RGB_CHANNELS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_mismatched_buffer() {
        let err = Frame::new(vec![0u8; 10], 4, 4, 1).unwrap_err();
        assert!(err.to_string().contains("expected 48 RGB bytes"));
    }

    #[test]
    fn frame_exposes_metadata() {
        let frame = Frame::new(vec![7u8; 2 * 3 * 3], 2, 3, 42).expect("frame");
        assert_eq!(frame.width, 2);
        assert_eq!(frame.height, 3);
        assert_eq!(frame.sequence, 42);
        assert_eq!(frame.byte_len(), 18);
        assert!(frame.annotations().is_empty());
    }

    #[test]
    fn frame_debug_omits_pixels() {
        let frame = Frame::new(vec![0xAB; 3], 1, 1, 1).expect("frame");
        let text = format!("{frame:?}");
        assert!(!text.contains("171"));
        assert!(text.contains("sequence"));
    }
}
