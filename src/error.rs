//! Error taxonomy for the perception loop.
//!
//! Stream end is deliberately absent from `TickError`: a source or sink that
//! stops streaming yields a terminal `TickOutcome`, not a failure.

use std::time::Duration;

use thiserror::Error;

/// Startup failure. The loop never starts.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unsupported {role} URI scheme '{scheme}' in {uri}")]
    UnsupportedScheme {
        role: &'static str,
        scheme: String,
        uri: String,
    },

    #[error("failed to open input {uri}: {reason}")]
    OpenInput { uri: String, reason: String },

    #[error("failed to open output {uri}: {reason}")]
    OpenOutput { uri: String, reason: String },

    #[error("unknown network '{0}'")]
    UnknownNetwork(String),

    #[error("failed to load network '{network}': {reason}")]
    LoadNetwork { network: String, reason: String },

    #[error("failed to start report publisher: {0}")]
    Publisher(String),
}

/// Frame acquisition outcome other than a frame.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The source has no more frames. Normal terminal condition.
    #[error("end of stream")]
    EndOfStream,

    /// No frame became available within the source's own timeout.
    #[error("no frame available within {0:?}")]
    Timeout(Duration),

    #[error("capture device error: {0}")]
    Device(String),
}

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("frame rejected by detector: {0}")]
    InvalidFrame(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("output is closed")]
    Closed,

    #[error("render backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("publisher is disconnected")]
    Disconnected,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A tick that could not complete.
#[derive(Error, Debug)]
pub enum TickError {
    #[error("capture failed: {0}")]
    CaptureFailure(#[source] CaptureError),

    #[error("detection failed: {0}")]
    DetectionFailure(#[source] DetectionError),

    #[error("publish failed: {0}")]
    PublishFailure(#[source] PublishError),

    #[error("render failed: {0}")]
    RenderFailure(#[source] RenderError),
}

impl From<DetectionError> for TickError {
    fn from(err: DetectionError) -> Self {
        TickError::DetectionFailure(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_error_display_includes_cause() {
        let err = TickError::CaptureFailure(CaptureError::Device("usb reset".to_string()));
        let text = err.to_string();
        assert!(text.contains("capture failed"));
        assert!(text.contains("usb reset"));
    }

    #[test]
    fn tick_error_exposes_source() {
        use std::error::Error as _;

        let err = TickError::DetectionFailure(DetectionError::Inference("nan".to_string()));
        let source = err.source().expect("source error");
        assert!(source.to_string().contains("nan"));
    }

    #[test]
    fn publish_error_from_json() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: PublishError = json_err.into();
        match err {
            PublishError::Encode(_) => {}
            other => panic!("expected Encode, got {other:?}"),
        }
    }
}
