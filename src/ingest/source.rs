use crate::error::CaptureError;
use crate::frame::Frame;

/// Frame producer seam.
///
/// `capture` may block until the next frame, bounded by the source's own
/// timeout policy. `CaptureError::EndOfStream` and `is_streaming() == false`
/// both mean the stream is over; `CaptureError::Timeout` only means no frame
/// was ready this time.
pub trait FrameSource: Send {
    fn capture(&mut self) -> Result<Frame, CaptureError>;

    fn is_streaming(&self) -> bool;

    /// Human-readable identity for logs (usually the URI).
    fn describe(&self) -> String;

    /// Release the underlying device or pipeline. Idempotent.
    fn close(&mut self) {}
}

/// Capture statistics shared by source backends.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub uri: String,
}
