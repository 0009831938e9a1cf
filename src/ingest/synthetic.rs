//! Synthetic frame source for `stub://` URIs.
//!
//! Produces a moving gradient so frame-difference detectors see change, and
//! can be told to end after a fixed number of frames:
//!
//! `stub://camera?frames=100&width=320&height=240`

use url::Url;

use super::source::{FrameSource, SourceStats};
use crate::error::{CaptureError, InitError};
use crate::frame::{expected_len, Frame};

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
/// Largest accepted side, 8K UHD width.
const MAX_DIMENSION: u32 = 7680;

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub uri: String,
    pub width: u32,
    pub height: u32,
    /// End of stream after this many frames. `None` streams forever.
    pub frame_limit: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            uri: "stub://camera".to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            frame_limit: None,
        }
    }
}

impl SyntheticConfig {
    pub fn from_url(url: &Url) -> Result<Self, InitError> {
        let mut config = Self {
            uri: url.to_string(),
            ..Self::default()
        };
        for (key, value) in url.query_pairs() {
            let parsed = value.parse::<u64>().map_err(|_| InitError::OpenInput {
                uri: url.to_string(),
                reason: format!("query parameter '{}' must be an integer", key),
            })?;
            match key.as_ref() {
                "frames" => config.frame_limit = Some(parsed),
                "width" => config.width = dimension(url, &key, parsed)?,
                "height" => config.height = dimension(url, &key, parsed)?,
                other => {
                    return Err(InitError::OpenInput {
                        uri: url.to_string(),
                        reason: format!("unknown query parameter '{}'", other),
                    })
                }
            }
        }
        if config.width == 0 || config.height == 0 {
            return Err(InitError::OpenInput {
                uri: url.to_string(),
                reason: "width and height must be non-zero".to_string(),
            });
        }
        Ok(config)
    }
}

fn dimension(url: &Url, key: &str, value: u64) -> Result<u32, InitError> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v <= MAX_DIMENSION)
        .ok_or_else(|| InitError::OpenInput {
            uri: url.to_string(),
            reason: format!("'{}' must be at most {}", key, MAX_DIMENSION),
        })
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_len: usize,
    frame_count: u64,
    /// Simulated scene state; bumps every 50 frames.
    scene_state: u8,
    streaming: bool,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        log::info!(
            "SyntheticSource: streaming {} ({}x{}, limit {:?})",
            config.uri,
            config.width,
            config.height,
            config.frame_limit
        );
        let frame_len = expected_len(config.width, config.height).unwrap_or(0);
        Self {
            config,
            frame_len,
            frame_count: 0,
            scene_state: 0,
            streaming: true,
        }
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            uri: self.config.uri.clone(),
        }
    }

    fn generate_synthetic_pixels(&mut self) -> Vec<u8> {
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; self.frame_len];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        if !self.streaming {
            return Err(CaptureError::EndOfStream);
        }
        if let Some(limit) = self.config.frame_limit {
            if self.frame_count >= limit {
                self.streaming = false;
                return Err(CaptureError::EndOfStream);
            }
        }

        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels();
        Frame::new(pixels, self.config.width, self.config.height, self.frame_count)
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn describe(&self) -> String {
        self.config.uri.clone()
    }

    fn close(&mut self) {
        if self.streaming {
            log::debug!(
                "SyntheticSource: closing {} after {} frames",
                self.config.uri,
                self.frame_count
            );
        }
        self.streaming = false;
    }
}
