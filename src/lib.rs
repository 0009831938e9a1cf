//! Perception loop
//!
//! A periodic capture-detect-publish-render pipeline for camera and video
//! streams.
//!
//! # Architecture
//!
//! Every tick runs one fixed cycle:
//!
//! 1. **Capture** a frame from the `FrameSource` (`ingest`).
//! 2. **Detect** objects with the configured `Detector` (`detect`).
//! 3. **Publish** one `DetectionReport` per frame (`report`, `publish`).
//! 4. **Render** the annotated frame to the `FrameSink` (`overlay`, `sink`).
//! 5. **Check liveness**: a source or sink that stopped streaming ends the
//!    loop normally.
//!
//! # Module Structure
//!
//! - `config`: `LoopConfig` resolution (file, env, validation)
//! - `frame`: RGB frames and their overlay annotations
//! - `detect`: detector seam, built-in backends, network registry
//! - `ingest` / `sink`: URI-selected frame sources and sinks
//! - `publish`: report publishers (log, MQTT)
//! - `perception`: `PerceptionLoop`, tick outcomes, run summaries
//! - `schedule`: fixed-rate tick pacing

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod overlay;
pub mod perception;
pub mod publish;
pub mod report;
pub mod schedule;
pub mod sink;

pub use config::{ErrorPolicy, LoopConfig, MqttSettings, PublishSettings, PublisherKind};
pub use detect::{
    BoundingBox, DetectionResult, Detector, DetectorRegistry, MotionDetector, NetworkSpec,
    SyntheticDetector,
};
pub use error::{CaptureError, DetectionError, InitError, PublishError, RenderError, TickError};
pub use frame::{Annotation, Frame};
pub use ingest::{open_source, FrameSource, SyntheticSource};
pub use overlay::OverlayFlags;
pub use perception::{
    LoopStats, PerceptionLoop, RunSummary, StopHandle, Termination, TickOutcome,
};
pub use publish::{open_publisher, LogPublisher, MqttPublisher, NoopPublisher, ReportPublisher};
pub use report::{DetectionReport, ReportFormat};
pub use schedule::TickScheduler;
pub use sink::{open_sink, FrameSink, NullSink, SyntheticSink};
