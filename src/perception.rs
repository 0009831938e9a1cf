//! The perception loop: capture, detect, publish, render, liveness check.
//!
//! `PerceptionLoop` owns its collaborators outright and drives them from a
//! single thread. Stream end on either side is a normal terminal outcome;
//! only genuine failures surface as `TickError`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::LoopConfig;
use crate::detect::{Detector, DetectorRegistry, NetworkSpec};
use crate::error::{CaptureError, InitError, TickError};
use crate::ingest::{open_source, FrameSource};
use crate::overlay;
use crate::publish::{open_publisher, ReportPublisher};
use crate::report::DetectionReport;
use crate::schedule::TickScheduler;
use crate::sink::{open_sink, FrameSink};

/// Result of one tick that did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame was processed and both streams are still live.
    Continued,
    /// The source had no frame ready; nothing was published.
    NoFrame,
    SourceEnded,
    SinkEnded,
}

/// Why `run` stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    SourceEnded,
    SinkEnded,
    Cancelled,
}

/// Cooperative stop flag, checked between ticks.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Cumulative counters and stage timings.
#[derive(Clone, Debug, Default)]
pub struct LoopStats {
    pub ticks: u64,
    pub frames_processed: u64,
    pub no_frame_ticks: u64,
    pub detections: u64,
    pub reports_published: u64,
    pub publish_errors: u64,
    pub render_errors: u64,
    pub overruns: u64,
    pub capture_time: Duration,
    pub detect_time: Duration,
    pub publish_time: Duration,
    pub render_time: Duration,
}

impl LoopStats {
    /// Mean (capture, detect, publish, render) durations.
    ///
    /// Capture is attempted every tick, so its mean is per tick. The other
    /// stages only run on processed frames.
    pub fn mean_stage_times(&self) -> (Duration, Duration, Duration, Duration) {
        let frames = self.frames_processed;
        (
            mean(self.capture_time, self.ticks),
            mean(self.detect_time, frames),
            mean(self.publish_time, frames),
            mean(self.render_time, frames),
        )
    }
}

fn mean(total: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    total.div_f64(count as f64)
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub termination: Termination,
    pub ticks: u64,
    pub reports_published: u64,
    pub stats: LoopStats,
}

/// Window for the periodic profiler and health lines.
struct StatusWindow {
    started: Instant,
    frames: u64,
    detections: u64,
}

impl StatusWindow {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            frames: 0,
            detections: 0,
        }
    }
}

pub struct PerceptionLoop {
    config: LoopConfig,
    source: Box<dyn FrameSource>,
    detector: Box<dyn Detector>,
    sink: Box<dyn FrameSink>,
    publisher: Box<dyn ReportPublisher>,
    stop: StopHandle,
    stats: LoopStats,
    window: StatusWindow,
    closed: bool,
}

impl PerceptionLoop {
    /// Open every collaborator named by `config` and warm up the detector.
    pub fn initialize(config: LoopConfig) -> Result<Self, InitError> {
        Self::initialize_with_registry(config, &DetectorRegistry::with_builtins())
    }

    /// `initialize` with a caller-supplied detector registry.
    pub fn initialize_with_registry(
        config: LoopConfig,
        registry: &DetectorRegistry,
    ) -> Result<Self, InitError> {
        config
            .validate()
            .map_err(|e| InitError::InvalidConfig(format!("{:#}", e)))?;

        let spec = NetworkSpec {
            network: config.network.clone(),
            model_dir: config.model.dir.clone(),
            input_width: config.model.input_width,
            input_height: config.model.input_height,
        };
        let mut detector = registry.load(&spec)?;
        detector
            .warm_up()
            .map_err(|e| InitError::LoadNetwork {
                network: config.network.clone(),
                reason: e.to_string(),
            })?;

        let source = open_source(&config.input_uri)?;
        let sink = open_sink(&config.output_uri)?;
        let publisher = open_publisher(&config.publish)?;

        log::info!(
            "perception loop ready: {} -> [{}] -> {} (publish {}, overlay {}, threshold {})",
            source.describe(),
            detector.name(),
            sink.describe(),
            publisher.describe(),
            config.overlay,
            config.threshold
        );

        Ok(Self::from_parts(config, source, detector, sink, publisher))
    }

    /// Assemble a loop from already-built collaborators.
    pub fn from_parts(
        config: LoopConfig,
        source: Box<dyn FrameSource>,
        detector: Box<dyn Detector>,
        sink: Box<dyn FrameSink>,
        publisher: Box<dyn ReportPublisher>,
    ) -> Self {
        Self {
            config,
            source,
            detector,
            sink,
            publisher,
            stop: StopHandle::new(),
            stats: LoopStats::default(),
            window: StatusWindow::new(),
            closed: false,
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run one capture, detect, publish, render and liveness cycle.
    pub fn run_tick(&mut self) -> Result<TickOutcome, TickError> {
        self.stats.ticks += 1;

        let started = Instant::now();
        let captured = self.source.capture();
        self.stats.capture_time += started.elapsed();

        let mut frame = match captured {
            Err(CaptureError::EndOfStream) => return Ok(TickOutcome::SourceEnded),
            Err(CaptureError::Timeout(waited)) => {
                if !self.source.is_streaming() {
                    return Ok(TickOutcome::SourceEnded);
                }
                log::debug!("no frame from {} within {:?}", self.source.describe(), waited);
                self.stats.no_frame_ticks += 1;
                return Ok(TickOutcome::NoFrame);
            }
            Err(err) => return Err(TickError::CaptureFailure(err)),
            Ok(frame) => frame,
        };
        if !self.source.is_streaming() {
            log::debug!("dropping frame {}: source stopped streaming", frame.sequence);
            return Ok(TickOutcome::SourceEnded);
        }

        let threshold = self.config.threshold;
        let started = Instant::now();
        let mut detections = self.detector.detect(&frame, threshold)?;
        self.stats.detect_time += started.elapsed();
        detections.retain(|d| f64::from(d.confidence) >= threshold);

        self.stats.frames_processed += 1;
        self.stats.detections += detections.len() as u64;
        self.window.frames += 1;
        self.window.detections += detections.len() as u64;

        let report = DetectionReport::new(frame.sequence, frame.width, frame.height, detections);

        let started = Instant::now();
        let published = report
            .format(self.config.publish.format)
            .and_then(|message| self.publisher.publish(&message));
        self.stats.publish_time += started.elapsed();
        let publish_failure = match published {
            Ok(()) => {
                self.stats.reports_published += 1;
                None
            }
            Err(err) => {
                self.stats.publish_errors += 1;
                log::warn!("publish failed for frame {}: {}", frame.sequence, err);
                Some(err)
            }
        };

        overlay::annotate(&mut frame, report.detections(), self.config.overlay);
        let status = self.status_text();
        self.sink.set_status(&status);
        let started = Instant::now();
        let rendered = self.sink.render(&frame);
        self.stats.render_time += started.elapsed();
        let render_failure = match rendered {
            Ok(()) => None,
            Err(err) => {
                self.stats.render_errors += 1;
                log::warn!("render failed for frame {}: {}", frame.sequence, err);
                Some(err)
            }
        };

        self.log_status_if_due();

        if let Some(err) = publish_failure {
            if self.config.policy.abort_on_publish_error {
                return Err(TickError::PublishFailure(err));
            }
        }
        if let Some(err) = render_failure {
            if self.config.policy.abort_on_render_error {
                return Err(TickError::RenderFailure(err));
            }
        }

        if !self.sink.is_streaming() {
            return Ok(TickOutcome::SinkEnded);
        }
        Ok(TickOutcome::Continued)
    }

    /// Tick at `interval` until a stream ends, the stop handle is raised, or a
    /// tick fails. Collaborators are closed on every exit path.
    pub fn run(mut self, interval: Duration) -> Result<RunSummary, TickError> {
        let mut scheduler = TickScheduler::new(interval);
        log::info!(
            "perception loop running every {:?} on {}",
            interval,
            self.source.describe()
        );

        let result = loop {
            if self.stop.is_stopped() {
                break Ok(Termination::Cancelled);
            }
            scheduler.wait_for_next_tick();
            match self.run_tick() {
                Ok(TickOutcome::Continued) | Ok(TickOutcome::NoFrame) => {}
                Ok(TickOutcome::SourceEnded) => break Ok(Termination::SourceEnded),
                Ok(TickOutcome::SinkEnded) => break Ok(Termination::SinkEnded),
                Err(err) => {
                    log::error!("tick {} failed: {}", self.stats.ticks, err);
                    break Err(err);
                }
            }
        };
        self.stats.overruns = scheduler.overruns();
        self.close();

        let termination = result?;
        match termination {
            Termination::SourceEnded | Termination::SinkEnded => {
                log::info!("input or output stream ended ({:?})", termination)
            }
            Termination::Cancelled => log::info!("perception loop cancelled"),
        }
        log::info!(
            "perception loop finished after {} ticks, {} reports published",
            self.stats.ticks,
            self.stats.reports_published
        );
        Ok(RunSummary {
            termination,
            ticks: self.stats.ticks,
            reports_published: self.stats.reports_published,
            stats: self.stats.clone(),
        })
    }

    /// `run` at `1 / tick_rate_hz`.
    pub fn run_at_configured_rate(self) -> Result<RunSummary, TickError> {
        let interval = self.config.tick_interval();
        self.run(interval)
    }

    /// Release every collaborator. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.source.close();
        self.sink.close();
        self.publisher.close();
        log::debug!("perception loop collaborators closed");
    }

    fn status_text(&self) -> String {
        match self.detector.network_fps() {
            Some(fps) => format!("{} | Network {:.0} FPS", self.config.network, fps),
            None => self.config.network.clone(),
        }
    }

    fn log_status_if_due(&mut self) {
        let elapsed = self.window.started.elapsed();
        if elapsed < self.config.status_interval {
            return;
        }
        let (capture, detect, publish, render) = self.stats.mean_stage_times();
        log::debug!(
            "timing: capture {:?} | detect {:?} | publish {:?} | render {:?}",
            capture,
            detect,
            publish,
            render
        );
        let secs = elapsed.as_secs_f64();
        log::info!(
            "health: ticks={} frames={} fps={:.1} detections/s={:.1} publish_errors={} render_errors={}",
            self.stats.ticks,
            self.stats.frames_processed,
            self.window.frames as f64 / secs,
            self.window.detections as f64 / secs,
            self.stats.publish_errors,
            self.stats.render_errors
        );
        self.window = StatusWindow::new();
    }
}

impl Drop for PerceptionLoop {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::SyntheticDetector;
    use crate::ingest::{SyntheticConfig, SyntheticSource};
    use crate::publish::NoopPublisher;
    use crate::sink::NullSink;

    fn stub_loop(frames: u64) -> PerceptionLoop {
        let source = SyntheticSource::new(SyntheticConfig {
            uri: "stub://unit".to_string(),
            width: 16,
            height: 16,
            frame_limit: Some(frames),
        });
        let mut config = LoopConfig::default();
        config.network = "synthetic".to_string();
        PerceptionLoop::from_parts(
            config,
            Box::new(source),
            Box::new(SyntheticDetector::default()),
            Box::new(NullSink::new()),
            Box::new(NoopPublisher),
        )
    }

    #[test]
    fn stop_handle_is_shared() {
        let handle = StopHandle::new();
        let clone = handle.clone();
        assert!(!handle.is_stopped());
        clone.stop();
        assert!(handle.is_stopped());
    }

    #[test]
    fn ticks_until_source_ends() {
        let mut lp = stub_loop(2);
        assert_eq!(lp.run_tick().unwrap(), TickOutcome::Continued);
        assert_eq!(lp.run_tick().unwrap(), TickOutcome::Continued);
        assert_eq!(lp.run_tick().unwrap(), TickOutcome::SourceEnded);
        assert_eq!(lp.stats().frames_processed, 2);
        assert_eq!(lp.stats().reports_published, 2);
    }

    #[test]
    fn run_reports_source_end() {
        let summary = stub_loop(3).run(Duration::ZERO).unwrap();
        assert_eq!(summary.termination, Termination::SourceEnded);
        assert_eq!(summary.ticks, 4);
        assert_eq!(summary.reports_published, 3);
    }

    #[test]
    fn status_text_uses_network_name_without_fps() {
        let lp = stub_loop(1);
        assert_eq!(lp.status_text(), "synthetic");
    }

    #[test]
    fn mean_stage_times_handle_zero_frames() {
        let stats = LoopStats::default();
        assert_eq!(stats.mean_stage_times().0, Duration::ZERO);
    }

    #[test]
    fn mean_capture_time_counts_every_tick() {
        let stats = LoopStats {
            ticks: 4,
            frames_processed: 2,
            capture_time: Duration::from_millis(40),
            detect_time: Duration::from_millis(20),
            ..LoopStats::default()
        };
        let (capture, detect, publish, _) = stats.mean_stage_times();
        assert_eq!(capture, Duration::from_millis(10));
        assert_eq!(detect, Duration::from_millis(10));
        assert_eq!(publish, Duration::ZERO);
    }

    #[test]
    fn mean_stage_times_survive_huge_frame_counts() {
        let stats = LoopStats {
            ticks: 1 << 32,
            frames_processed: 1 << 32,
            detect_time: Duration::from_secs(1 << 32),
            ..LoopStats::default()
        };
        let (_, detect, _, _) = stats.mean_stage_times();
        assert_eq!(detect, Duration::from_secs(1));
    }

    #[test]
    fn initialize_rejects_unknown_network() {
        let mut config = LoopConfig::default();
        config.network = "no-such-network".to_string();
        config.model.dir = std::path::PathBuf::from("/nonexistent/models");
        match PerceptionLoop::initialize(config) {
            Err(InitError::UnknownNetwork(msg)) => assert!(msg.contains("no-such-network")),
            Err(other) => panic!("expected UnknownNetwork, got {other:?}"),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test]
    fn initialize_builds_stub_pipeline() {
        let mut config = LoopConfig::default();
        config.network = "motion".to_string();
        config.input_uri = "stub://cam?frames=2&width=8&height=8".to_string();
        config.output_uri = "stub://window".to_string();
        config.publish.backend = crate::config::PublisherKind::None;
        let summary = PerceptionLoop::initialize(config)
            .expect("loop")
            .run(Duration::ZERO)
            .expect("run");
        assert_eq!(summary.termination, Termination::SourceEnded);
        assert_eq!(summary.reports_published, 2);
    }
}
