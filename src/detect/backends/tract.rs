#![cfg(feature = "backend-tract")]

use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::{Detector, FpsMeter};
use crate::detect::result::{BoundingBox, DetectionResult};
use crate::error::DetectionError;
use crate::frame::{expected_len, Frame};

/// Tract-based backend for SSD-style ONNX detection models.
///
/// Expected graph:
/// - input 0: `f32[1, 3, H, W]`, RGB scaled to 0..1 (frames are resampled to fit)
/// - output 0: `f32[1, N, 4]` boxes as normalized `(x1, y1, x2, y2)`
/// - output 1: `f32[1, N, C]` per-class scores
///
/// Class 0 is treated as background and never reported.
pub struct TractDetector {
    network: String,
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    width: u32,
    height: u32,
    labels: Vec<String>,
    fps: FpsMeter,
}

impl TractDetector {
    /// Load an ONNX model from disk and prepare it for inference.
    ///
    /// A `labels.txt` beside the model (one label per line) names the classes.
    pub fn load<P: AsRef<Path>>(network: &str, model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        let labels_path = model_path.with_file_name("labels.txt");
        let labels = match std::fs::read_to_string(&labels_path) {
            Ok(raw) => raw.lines().map(|l| l.trim().to_string()).collect(),
            Err(_) => {
                log::warn!(
                    "no labels file at {}; reporting numeric class ids",
                    labels_path.display()
                );
                Vec::new()
            }
        };

        Ok(Self {
            network: network.to_string(),
            model,
            width,
            height,
            labels,
            fps: FpsMeter::default(),
        })
    }

    /// Nearest-neighbour resample of the frame into the model's input tensor.
    fn build_input(&self, frame: &Frame) -> Result<Tensor, DetectionError> {
        if frame.width == 0 || frame.height == 0 {
            return Err(DetectionError::InvalidFrame("empty frame".to_string()));
        }

        let pixels = frame.pixels();
        let src_w = frame.width as usize;
        let src_h = frame.height as usize;
        let dst_w = self.width as usize;
        let dst_h = self.height as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, dst_h, dst_w), |(_, channel, y, x)| {
            let sx = x * src_w / dst_w;
            let sy = y * src_h / dst_h;
            let idx = (sy * src_w + sx) * 3 + channel;
            pixels[idx] as f32 / 255.0
        });

        Ok(input.into_tensor())
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        threshold: f64,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<Vec<DetectionResult>> {
        let boxes = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no box output"))?
            .to_array_view::<f32>()
            .context("box tensor was not f32")?;
        let scores = outputs
            .get(1)
            .ok_or_else(|| anyhow!("model produced no score output"))?
            .to_array_view::<f32>()
            .context("score tensor was not f32")?;

        let count = boxes.len() / 4;
        let boxes = boxes
            .into_shape((count, 4))
            .context("box tensor is not [1, N, 4]")?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let classes = scores.len() / count;
        let scores = scores
            .into_shape((count, classes))
            .context("score tensor is not [1, N, C]")?;

        let w = frame_width as f32;
        let h = frame_height as f32;
        let mut detections = Vec::new();
        for i in 0..count {
            let (class_id, confidence) = (1..classes)
                .map(|c| (c, scores[[i, c]]))
                .fold((0usize, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                });
            if !confidence.is_finite() || (confidence as f64) < threshold {
                continue;
            }
            let bbox = BoundingBox::new(
                boxes[[i, 0]] * w,
                boxes[[i, 1]] * h,
                boxes[[i, 2]] * w,
                boxes[[i, 3]] * h,
            )
            .clamped(frame_width, frame_height);
            let label = self
                .labels
                .get(class_id)
                .cloned()
                .unwrap_or_else(|| format!("class_{}", class_id));
            detections.push(DetectionResult {
                class_id: class_id as u32,
                label,
                confidence,
                bbox,
            });
        }
        detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Ok(detections)
    }
}

impl Detector for TractDetector {
    fn name(&self) -> &str {
        &self.network
    }

    fn detect(
        &mut self,
        frame: &Frame,
        threshold: f64,
    ) -> Result<Vec<DetectionResult>, DetectionError> {
        let started = Instant::now();
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| DetectionError::Inference(format!("ONNX inference failed: {}", e)))?;
        let detections = self
            .decode(outputs, threshold, frame.width, frame.height)
            .map_err(|e| DetectionError::Inference(format!("{:#}", e)))?;
        self.fps.record(started.elapsed());
        Ok(detections)
    }

    fn network_fps(&self) -> Option<f64> {
        self.fps.current()
    }

    fn warm_up(&mut self) -> Result<(), DetectionError> {
        let len = expected_len(self.width, self.height).ok_or_else(|| {
            DetectionError::InvalidFrame(format!(
                "model input {}x{} is too large",
                self.width, self.height
            ))
        })?;
        let blank = Frame::new(
            vec![0u8; len],
            self.width,
            self.height,
            0,
        )
        .map_err(|e| DetectionError::InvalidFrame(e.to_string()))?;
        self.detect(&blank, 1.0).map(|_| ())
    }
}
