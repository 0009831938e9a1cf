//! Frame sources.
//!
//! - `stub://` synthetic frames (always available)
//! - `file://`, `rtsp://`, `http(s)://`, `v4l2://`, `csi://` through GStreamer
//!   (feature: gstreamer)
//!
//! `open_source` picks the backend from the URI scheme.

#[cfg(feature = "gstreamer")]
pub mod gst;
mod source;
pub mod synthetic;

#[cfg(feature = "gstreamer")]
pub use gst::GstreamerSource;
pub use source::{FrameSource, SourceStats};
pub use synthetic::{SyntheticConfig, SyntheticSource};

use url::Url;

use crate::error::InitError;

/// Open the frame source named by `uri`.
pub fn open_source(uri: &str) -> Result<Box<dyn FrameSource>, InitError> {
    let url = parse_uri(uri, "input")?;
    match url.scheme() {
        "stub" => Ok(Box::new(SyntheticSource::new(SyntheticConfig::from_url(
            &url,
        )?))),
        #[cfg(feature = "gstreamer")]
        "file" | "rtsp" | "rtspt" | "http" | "https" | "v4l2" | "csi" => {
            let source = GstreamerSource::open(&url).map_err(|e| InitError::OpenInput {
                uri: uri.to_string(),
                reason: format!("{:#}", e),
            })?;
            Ok(Box::new(source))
        }
        scheme => Err(InitError::UnsupportedScheme {
            role: "input",
            scheme: scheme.to_string(),
            uri: uri.to_string(),
        }),
    }
}

/// Parse a collaborator URI. Bare paths are treated as `file://` URIs.
pub(crate) fn parse_uri(uri: &str, role: &'static str) -> Result<Url, InitError> {
    let trimmed = uri.trim();
    if !trimmed.contains("://") {
        let path = std::path::Path::new(trimmed);
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        };
        return Url::from_file_path(&absolute).map_err(|_| InitError::UnsupportedScheme {
            role,
            scheme: String::new(),
            uri: uri.to_string(),
        });
    }
    Url::parse(trimmed).map_err(|e| match role {
        "output" => InitError::OpenOutput {
            uri: uri.to_string(),
            reason: e.to_string(),
        },
        _ => InitError::OpenInput {
            uri: uri.to_string(),
            reason: e.to_string(),
        },
    })
}
