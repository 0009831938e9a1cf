use crate::error::RenderError;
use crate::frame::Frame;

/// Frame consumer seam.
///
/// A sink renders annotated frames and carries a one-line status text (the
/// window title on display outputs). `is_streaming() == false` ends the loop.
pub trait FrameSink: Send {
    fn render(&mut self, frame: &Frame) -> Result<(), RenderError>;

    fn is_streaming(&self) -> bool;

    fn set_status(&mut self, text: &str);

    /// Human-readable identity for logs (usually the URI).
    fn describe(&self) -> String;

    /// Release the underlying output. Idempotent.
    fn close(&mut self) {}
}
