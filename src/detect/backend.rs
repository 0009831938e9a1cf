use crate::detect::result::DetectionResult;
use crate::error::DetectionError;
use crate::frame::Frame;

/// Object detector seam.
///
/// The loop hands every captured frame to `detect` exactly once. Implementations
/// own whatever model state they need and must not keep the frame past the call.
pub trait Detector: Send {
    /// Backend identifier.
    fn name(&self) -> &str;

    /// Run detection on a frame, keeping results at or above `threshold`.
    ///
    /// Results are returned in the backend's natural order (usually by
    /// descending confidence); the loop preserves that order when reporting.
    fn detect(
        &mut self,
        frame: &Frame,
        threshold: f64,
    ) -> Result<Vec<DetectionResult>, DetectionError>;

    /// Current inference throughput in frames per second, if the backend tracks it.
    fn network_fps(&self) -> Option<f64> {
        None
    }

    /// Optional warm-up hook, run once after loading.
    fn warm_up(&mut self) -> Result<(), DetectionError> {
        Ok(())
    }
}

/// Exponentially smoothed frames-per-second meter shared by the backends.
#[derive(Clone, Debug, Default)]
pub struct FpsMeter {
    fps: Option<f64>,
}

impl FpsMeter {
    const SMOOTHING: f64 = 0.1;

    pub fn record(&mut self, elapsed: std::time::Duration) {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return;
        }
        let sample = 1.0 / secs;
        self.fps = Some(match self.fps {
            Some(prev) => prev + (sample - prev) * Self::SMOOTHING,
            None => sample,
        });
    }

    pub fn current(&self) -> Option<f64> {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fps_meter_smooths_samples() {
        let mut meter = FpsMeter::default();
        assert!(meter.current().is_none());

        meter.record(Duration::from_millis(100));
        assert!((meter.current().unwrap() - 10.0).abs() < 1e-9);

        meter.record(Duration::from_millis(50));
        // 10 + (20 - 10) * 0.1
        assert!((meter.current().unwrap() - 11.0).abs() < 1e-9);

        meter.record(Duration::ZERO);
        assert!((meter.current().unwrap() - 11.0).abs() < 1e-9);
    }
}
