//! GStreamer-backed frame source.
//!
//! Supported URIs:
//! - `file://`, `rtsp://`, `http(s)://` via `uridecodebin`
//! - `v4l2:///dev/videoN` via `v4l2src`
//! - `csi://N` via `nvarguscamerasrc`
//!
//! Frames are converted to packed RGB in the pipeline. End of stream on the
//! bus turns into `CaptureError::EndOfStream`.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use gstreamer::prelude::*;
use url::Url;

use super::source::{FrameSource, SourceStats};
use crate::error::CaptureError;
use crate::frame::Frame;

/// Pull timeout for a single capture.
const CAPTURE_TIMEOUT: Duration = Duration::from_millis(1000);

pub struct GstreamerSource {
    uri: String,
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    frame_count: u64,
    streaming: bool,
    last_error: Option<String>,
}

impl GstreamerSource {
    pub fn open(url: &Url) -> Result<Self> {
        gstreamer::init().context("initialize gstreamer")?;

        let source = pipeline_head(url)?;
        let description = format!(
            "{} ! videoconvert ! video/x-raw,format=RGB ! \
             appsink name=appsink sync=false max-buffers=1 drop=true",
            source
        );
        let pipeline = gstreamer::parse::launch(&description)
            .context("build capture pipeline")?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow!("capture pipeline is not a Pipeline"))?;

        let appsink = pipeline
            .by_name("appsink")
            .context("appsink element missing from pipeline")?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| anyhow!("appsink element has unexpected type"))?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .context("set capture pipeline to Playing")?;
        log::info!("GstreamerSource: streaming {}", url);

        Ok(Self {
            uri: url.to_string(),
            pipeline,
            appsink,
            frame_count: 0,
            streaming: true,
            last_error: None,
        })
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            uri: self.uri.clone(),
        }
    }

    fn poll_bus(&mut self) {
        let Some(bus) = self.pipeline.bus() else {
            return;
        };
        while let Some(message) = bus.pop() {
            use gstreamer::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    self.last_error = Some(format!(
                        "gstreamer error from {:?}: {}",
                        err.src().map(|s| s.path_string()),
                        err.error()
                    ));
                }
                MessageView::Eos(..) => {
                    self.streaming = false;
                }
                _ => {}
            }
        }
    }
}

impl FrameSource for GstreamerSource {
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        self.poll_bus();
        if let Some(err) = self.last_error.take() {
            return Err(CaptureError::Device(err));
        }
        if !self.streaming || self.appsink.is_eos() {
            self.streaming = false;
            return Err(CaptureError::EndOfStream);
        }

        let timeout = gstreamer::ClockTime::from_mseconds(CAPTURE_TIMEOUT.as_millis() as u64);
        let Some(sample) = self.appsink.try_pull_sample(timeout) else {
            if self.appsink.is_eos() {
                self.streaming = false;
                return Err(CaptureError::EndOfStream);
            }
            return Err(CaptureError::Timeout(CAPTURE_TIMEOUT));
        };

        let (pixels, width, height) =
            sample_to_pixels(&sample).map_err(|e| CaptureError::Device(format!("{:#}", e)))?;
        self.frame_count += 1;
        Frame::new(pixels, width, height, self.frame_count)
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn describe(&self) -> String {
        self.uri.clone()
    }

    fn close(&mut self) {
        self.streaming = false;
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            log::warn!("GstreamerSource: failed to stop {}: {}", self.uri, e);
        }
    }
}

impl Drop for GstreamerSource {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gstreamer::State::Null);
    }
}

fn pipeline_head(url: &Url) -> Result<String> {
    match url.scheme() {
        "file" | "rtsp" | "rtspt" | "http" | "https" => {
            Ok(format!("uridecodebin uri=\"{}\"", url))
        }
        "v4l2" => {
            let device = if url.path().is_empty() {
                "/dev/video0"
            } else {
                url.path()
            };
            Ok(format!("v4l2src device={}", device))
        }
        "csi" => {
            let sensor: u32 = url
                .host_str()
                .unwrap_or("0")
                .parse()
                .context("csi:// sensor id must be an integer")?;
            Ok(format!(
                "nvarguscamerasrc sensor-id={} ! nvvidconv",
                sensor
            ))
        }
        other => Err(anyhow!("unsupported gstreamer input scheme '{}'", other)),
    }
}

fn sample_to_pixels(sample: &gstreamer::Sample) -> Result<(Vec<u8>, u32, u32)> {
    let buffer = sample.buffer().context("sample missing buffer")?;
    let caps = sample.caps().context("sample missing caps")?;
    let info = gstreamer_video::VideoInfo::from_caps(caps).context("parse caps as video info")?;

    let width = info.width();
    let height = info.height();
    let row_bytes = (width as usize) * 3;
    let stride = info.stride()[0] as usize;

    let map = buffer.map_readable().context("map buffer")?;
    let data = map.as_slice();

    if stride == row_bytes {
        let packed = data
            .get(..row_bytes * height as usize)
            .context("buffer is smaller than its caps")?;
        return Ok((packed.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(data.get(start..end).context("buffer row is out of bounds")?);
    }

    Ok((pixels, width, height))
}
