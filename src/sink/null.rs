use super::output::FrameSink;
use crate::error::RenderError;
use crate::frame::Frame;

/// Discards frames and never stops streaming. Used for `null://` outputs.
#[derive(Debug, Default)]
pub struct NullSink {
    frames_rendered: u64,
    status: String,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn status(&self) -> &str {
        &self.status
    }
}

impl FrameSink for NullSink {
    fn render(&mut self, _frame: &Frame) -> Result<(), RenderError> {
        self.frames_rendered += 1;
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        true
    }

    fn set_status(&mut self, text: &str) {
        if self.status != text {
            log::trace!("NullSink status: {}", text);
            self.status = text.to_string();
        }
    }

    fn describe(&self) -> String {
        "null://".to_string()
    }
}
