use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::detect::backend::{Detector, FpsMeter};
use crate::detect::result::{BoundingBox, DetectionResult};
use crate::error::DetectionError;
use crate::frame::Frame;

const LABELS: &[&str] = &["person", "bicycle", "car", "dog", "cat", "bottle", "chair"];

/// Seeded pseudo-random detector for bring-up without a model.
///
/// Each frame yields up to `max_objects` candidate boxes with random classes
/// and confidences. Same seed, same frames, same detections.
pub struct SyntheticDetector {
    rng: StdRng,
    max_objects: usize,
    fps: FpsMeter,
}

impl SyntheticDetector {
    pub const DEFAULT_SEED: u64 = 0x5eed;

    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            max_objects: 5,
            fps: FpsMeter::default(),
        }
    }

    pub fn with_max_objects(mut self, max_objects: usize) -> Self {
        self.max_objects = max_objects;
        self
    }
}

impl Default for SyntheticDetector {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SEED)
    }
}

impl Detector for SyntheticDetector {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn detect(
        &mut self,
        frame: &Frame,
        threshold: f64,
    ) -> Result<Vec<DetectionResult>, DetectionError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(DetectionError::InvalidFrame("empty frame".to_string()));
        }
        let started = Instant::now();

        let w = frame.width as f32;
        let h = frame.height as f32;
        let candidates = self.rng.gen_range(0..=self.max_objects);
        let mut detections = Vec::with_capacity(candidates);
        for _ in 0..candidates {
            let class_id = self.rng.gen_range(0..LABELS.len());
            let confidence: f32 = self.rng.gen_range(0.05..1.0);
            let left = self.rng.gen_range(0.0..w * 0.75);
            let top = self.rng.gen_range(0.0..h * 0.75);
            let right = left + self.rng.gen_range(w * 0.05..w * 0.25);
            let bottom = top + self.rng.gen_range(h * 0.05..h * 0.25);
            if (confidence as f64) < threshold {
                continue;
            }
            detections.push(DetectionResult {
                class_id: class_id as u32,
                label: LABELS[class_id].to_string(),
                confidence,
                bbox: BoundingBox::new(left, top, right, bottom).clamped(frame.width, frame.height),
            });
        }
        detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        self.fps.record(started.elapsed());
        Ok(detections)
    }

    fn network_fps(&self) -> Option<f64> {
        self.fps.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(seq: u64) -> Frame {
        Frame::new(vec![0u8; 64 * 48 * 3], 64, 48, seq).expect("frame")
    }

    #[test]
    fn synthetic_detector_is_deterministic_per_seed() {
        let mut a = SyntheticDetector::new(7);
        let mut b = SyntheticDetector::new(7);
        for seq in 1..=10 {
            let ra = a.detect(&frame(seq), 0.3).unwrap();
            let rb = b.detect(&frame(seq), 0.3).unwrap();
            assert_eq!(ra, rb);
        }
    }

    #[test]
    fn synthetic_detector_honors_threshold_and_bounds() {
        let mut detector = SyntheticDetector::new(11).with_max_objects(8);
        for seq in 1..=20 {
            let results = detector.detect(&frame(seq), 0.6).unwrap();
            for det in &results {
                assert!(det.confidence >= 0.6);
                assert!(det.bbox.right <= 64.0);
                assert!(det.bbox.bottom <= 48.0);
            }
            for pair in results.windows(2) {
                assert!(pair[0].confidence >= pair[1].confidence);
            }
        }
    }

    #[test]
    fn synthetic_detector_with_no_objects_returns_empty() {
        let mut detector = SyntheticDetector::new(3).with_max_objects(0);
        assert!(detector.detect(&frame(1), 0.0).unwrap().is_empty());
    }
}
