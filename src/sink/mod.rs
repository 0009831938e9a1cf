//! Frame sinks.
//!
//! - empty or `null://` discards frames
//! - `stub://` counts frames, optionally closing after `frames=N`
//! - `display://` opens a window through GStreamer (feature: gstreamer)

#[cfg(feature = "gstreamer")]
pub mod gst;
mod null;
mod output;
pub mod synthetic;

#[cfg(feature = "gstreamer")]
pub use gst::GstreamerSink;
pub use null::NullSink;
pub use output::FrameSink;
pub use synthetic::SyntheticSink;

use crate::error::InitError;
use crate::ingest::parse_uri;

/// Open the frame sink named by `uri`.
pub fn open_sink(uri: &str) -> Result<Box<dyn FrameSink>, InitError> {
    if uri.trim().is_empty() {
        return Ok(Box::new(NullSink::new()));
    }
    let url = parse_uri(uri, "output")?;
    match url.scheme() {
        "null" => Ok(Box::new(NullSink::new())),
        "stub" => Ok(Box::new(SyntheticSink::from_url(&url)?)),
        #[cfg(feature = "gstreamer")]
        "display" => {
            let sink = GstreamerSink::open(uri).map_err(|e| InitError::OpenOutput {
                uri: uri.to_string(),
                reason: format!("{:#}", e),
            })?;
            Ok(Box::new(sink))
        }
        scheme => Err(InitError::UnsupportedScheme {
            role: "output",
            scheme: scheme.to_string(),
            uri: uri.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_null_uris_discard() {
        for uri in ["", "null://"] {
            let sink = open_sink(uri).expect("sink");
            assert!(sink.is_streaming());
            assert_eq!(sink.describe(), "null://");
        }
    }

    #[test]
    fn stub_uri_opens_counting_sink() {
        let sink = open_sink("stub://window?frames=3").expect("sink");
        assert_eq!(sink.describe(), "stub://window?frames=3");
    }

    #[test]
    fn file_outputs_are_unsupported() {
        match open_sink("/tmp/out.mp4") {
            Err(InitError::UnsupportedScheme { role, scheme, .. }) => {
                assert_eq!(role, "output");
                assert_eq!(scheme, "file");
            }
            Err(other) => panic!("expected UnsupportedScheme, got {other:?}"),
            Ok(_) => panic!("expected an error"),
        }
    }
}
