use serde::Serialize;

/// Axis-aligned box in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        (self.right - self.left).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.bottom - self.top).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Clamp into a `width` x `height` frame.
    pub fn clamped(self, width: u32, height: u32) -> Self {
        let w = width as f32;
        let h = height as f32;
        Self {
            left: self.left.clamp(0.0, w),
            top: self.top.clamp(0.0, h),
            right: self.right.clamp(0.0, w),
            bottom: self.bottom.clamp(0.0, h),
        }
    }
}

/// One detected object.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionResult {
    pub class_id: u32,
    pub label: String,
    /// Confidence in 0.0..=1.0.
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl std::fmt::Display for DetectionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "class={} ({}) confidence={:.3} box=({:.1}, {:.1}, {:.1}, {:.1}) size={:.1}x{:.1}",
            self.label,
            self.class_id,
            self.confidence,
            self.bbox.left,
            self.bbox.top,
            self.bbox.right,
            self.bbox.bottom,
            self.bbox.width(),
            self.bbox.height()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_geometry() {
        let bbox = BoundingBox::new(10.0, 20.0, 50.0, 80.0);
        assert_eq!(bbox.width(), 40.0);
        assert_eq!(bbox.height(), 60.0);
        assert_eq!(bbox.area(), 2400.0);

        let inverted = BoundingBox::new(50.0, 80.0, 10.0, 20.0);
        assert_eq!(inverted.area(), 0.0);
    }

    #[test]
    fn bounding_box_clamps_to_frame() {
        let bbox = BoundingBox::new(-5.0, -1.0, 700.0, 300.0).clamped(640, 480);
        assert_eq!(bbox, BoundingBox::new(0.0, 0.0, 640.0, 300.0));
    }

    #[test]
    fn detection_display_is_single_line() {
        let det = DetectionResult {
            class_id: 1,
            label: "person".to_string(),
            confidence: 0.875,
            bbox: BoundingBox::new(1.0, 2.0, 3.0, 4.0),
        };
        let text = det.to_string();
        assert!(!text.contains('\n'));
        assert!(text.starts_with("class=person (1) confidence=0.875"));
    }
}
