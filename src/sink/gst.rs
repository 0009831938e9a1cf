//! GStreamer display sink for `display://` outputs.
//!
//! Frames are pushed through `appsrc ! videoconvert ! autovideosink`. Closing
//! the window posts an error or EOS on the bus, which ends streaming. The
//! status text travels downstream as a title tag, which video sinks use as
//! the window title.

use anyhow::{anyhow, Context, Result};
use gstreamer::prelude::*;

use super::output::FrameSink;
use crate::error::RenderError;
use crate::frame::Frame;

pub struct GstreamerSink {
    uri: String,
    pipeline: gstreamer::Pipeline,
    appsrc: gstreamer_app::AppSrc,
    caps_size: Option<(u32, u32)>,
    status: String,
    streaming: bool,
}

impl GstreamerSink {
    pub fn open(uri: &str) -> Result<Self> {
        gstreamer::init().context("initialize gstreamer")?;

        let pipeline = gstreamer::parse::launch(
            "appsrc name=appsrc is-live=true format=time ! videoconvert ! autovideosink sync=false",
        )
        .context("build display pipeline")?
        .downcast::<gstreamer::Pipeline>()
        .map_err(|_| anyhow!("display pipeline is not a Pipeline"))?;

        let appsrc = pipeline
            .by_name("appsrc")
            .context("appsrc element missing from pipeline")?
            .downcast::<gstreamer_app::AppSrc>()
            .map_err(|_| anyhow!("appsrc element has unexpected type"))?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .context("set display pipeline to Playing")?;
        log::info!("GstreamerSink: rendering to {}", uri);

        Ok(Self {
            uri: uri.to_string(),
            pipeline,
            appsrc,
            caps_size: None,
            status: String::new(),
            streaming: true,
        })
    }

    fn poll_bus(&mut self) {
        let Some(bus) = self.pipeline.bus() else {
            return;
        };
        if let Some(reason) = drain_bus(&bus) {
            log::info!("GstreamerSink: output closed ({})", reason);
            self.streaming = false;
        }
    }

    fn ensure_caps(&mut self, width: u32, height: u32) {
        if self.caps_size == Some((width, height)) {
            return;
        }
        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .field("width", width as i32)
            .field("height", height as i32)
            .field("framerate", gstreamer::Fraction::new(0, 1))
            .build();
        self.appsrc.set_caps(Some(&caps));
        self.caps_size = Some((width, height));
    }
}

impl FrameSink for GstreamerSink {
    fn render(&mut self, frame: &Frame) -> Result<(), RenderError> {
        self.poll_bus();
        if !self.streaming {
            return Err(RenderError::Closed);
        }
        self.ensure_caps(frame.width, frame.height);

        let buffer = gstreamer::Buffer::from_slice(frame.pixels().to_vec());
        self.appsrc
            .push_buffer(buffer)
            .map_err(|e| RenderError::Backend(format!("push frame: {:?}", e)))?;
        // A window closed during this frame must end the loop on this tick.
        self.poll_bus();
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn set_status(&mut self, text: &str) {
        if self.status == text {
            return;
        }
        log::debug!("{}: {}", self.uri, text);
        self.status = text.to_string();
        if !self.appsrc.send_event(gstreamer::event::Tag::new(title_tags(text))) {
            log::debug!("GstreamerSink: {} ignored the title tag", self.uri);
        }
    }

    fn describe(&self) -> String {
        self.uri.clone()
    }

    fn close(&mut self) {
        if self.streaming {
            let _ = self.appsrc.end_of_stream();
        }
        self.streaming = false;
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            log::warn!("GstreamerSink: failed to stop {}: {}", self.uri, e);
        }
    }
}

impl Drop for GstreamerSink {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gstreamer::State::Null);
    }
}

/// Pop every pending bus message. Returns why the output ended, if it did.
fn drain_bus(bus: &gstreamer::Bus) -> Option<String> {
    use gstreamer::MessageView;

    let mut ended = None;
    while let Some(message) = bus.pop() {
        match message.view() {
            MessageView::Error(err) => ended = Some(err.error().to_string()),
            MessageView::Eos(..) => ended = Some("end of stream".to_string()),
            _ => {}
        }
    }
    ended
}

fn title_tags(text: &str) -> gstreamer::TagList {
    let mut tags = gstreamer::TagList::new();
    if let Some(tags) = tags.get_mut() {
        tags.add::<gstreamer::tags::Title>(&text, gstreamer::TagMergeMode::Replace);
    }
    tags
}
