//! Counting sink for `stub://` outputs.
//!
//! `stub://window?frames=N` stops streaming after N renders, which models a
//! display window being closed by the user.

use url::Url;

use super::output::FrameSink;
use crate::error::{InitError, RenderError};
use crate::frame::Frame;

pub struct SyntheticSink {
    uri: String,
    frame_limit: Option<u64>,
    frames_rendered: u64,
    annotations_seen: u64,
    status: String,
    open: bool,
}

impl SyntheticSink {
    pub fn from_url(url: &Url) -> Result<Self, InitError> {
        let mut frame_limit = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "frames" => {
                    frame_limit = Some(value.parse::<u64>().map_err(|_| InitError::OpenOutput {
                        uri: url.to_string(),
                        reason: "query parameter 'frames' must be an integer".to_string(),
                    })?)
                }
                other => {
                    return Err(InitError::OpenOutput {
                        uri: url.to_string(),
                        reason: format!("unknown query parameter '{}'", other),
                    })
                }
            }
        }
        Ok(Self {
            uri: url.to_string(),
            frame_limit,
            frames_rendered: 0,
            annotations_seen: 0,
            status: String::new(),
            open: true,
        })
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn annotations_seen(&self) -> u64 {
        self.annotations_seen
    }

    pub fn status(&self) -> &str {
        &self.status
    }
}

impl FrameSink for SyntheticSink {
    fn render(&mut self, frame: &Frame) -> Result<(), RenderError> {
        if !self.open {
            return Err(RenderError::Closed);
        }
        self.frames_rendered += 1;
        self.annotations_seen += frame.annotations().len() as u64;
        if self.frame_limit.is_some_and(|limit| self.frames_rendered >= limit) {
            log::info!("SyntheticSink: {} closed after {} frames", self.uri, self.frames_rendered);
            self.open = false;
        }
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.open
    }

    fn set_status(&mut self, text: &str) {
        self.status = text.to_string();
    }

    fn describe(&self) -> String {
        self.uri.clone()
    }

    fn close(&mut self) {
        self.open = false;
    }
}
