use std::time::Instant;

use sha2::{Digest, Sha256};

use crate::detect::backend::{Detector, FpsMeter};
use crate::detect::result::{BoundingBox, DetectionResult};
use crate::error::DetectionError;
use crate::frame::Frame;

const MOTION_CONFIDENCE: f32 = 0.85;

/// Frame-difference detector.
///
/// Reports a single full-frame `motion` detection whenever the frame digest
/// changes from the previous frame. The first frame never reports motion.
#[derive(Default)]
pub struct MotionDetector {
    last_hash: Option<[u8; 32]>,
    fps: FpsMeter,
}

impl MotionDetector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Detector for MotionDetector {
    fn name(&self) -> &str {
        "motion"
    }

    fn detect(
        &mut self,
        frame: &Frame,
        threshold: f64,
    ) -> Result<Vec<DetectionResult>, DetectionError> {
        let started = Instant::now();
        let current_hash: [u8; 32] = Sha256::digest(frame.pixels()).into();

        let motion = self.last_hash.is_some_and(|prev| prev != current_hash);
        self.last_hash = Some(current_hash);
        self.fps.record(started.elapsed());

        if !motion || (MOTION_CONFIDENCE as f64) < threshold {
            return Ok(Vec::new());
        }
        Ok(vec![DetectionResult {
            class_id: 0,
            label: "motion".to_string(),
            confidence: MOTION_CONFIDENCE,
            bbox: BoundingBox::new(0.0, 0.0, frame.width as f32, frame.height as f32),
        }])
    }

    fn network_fps(&self) -> Option<f64> {
        self.fps.current()
    }
}
