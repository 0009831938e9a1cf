//! Overlay flags and frame annotation.
//!
//! Flags come from a comma-separated list (`box,labels,conf`, or `none`).
//! Boxes are rasterised straight into the frame as 2px outlines; label and
//! confidence text is attached as `Annotation`s for sinks that can draw text.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};

use crate::detect::DetectionResult;
use crate::frame::{Annotation, Frame};

const BOX_COLOR: [u8; 3] = [0, 255, 64];
const BOX_THICKNESS: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlayFlags {
    pub boxes: bool,
    pub labels: bool,
    pub confidence: bool,
}

impl OverlayFlags {
    pub const NONE: Self = Self {
        boxes: false,
        labels: false,
        confidence: false,
    };

    pub const ALL: Self = Self {
        boxes: true,
        labels: true,
        confidence: true,
    };

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

impl Default for OverlayFlags {
    fn default() -> Self {
        Self::ALL
    }
}

impl FromStr for OverlayFlags {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut flags = Self::NONE;
        let mut saw_none = false;
        let mut saw_any = false;
        for token in s.split(',').map(|t| t.trim().to_lowercase()) {
            if token.is_empty() {
                continue;
            }
            saw_any = true;
            match token.as_str() {
                "box" | "boxes" => flags.boxes = true,
                "labels" | "label" => flags.labels = true,
                "conf" | "confidence" => flags.confidence = true,
                "none" => saw_none = true,
                other => {
                    return Err(anyhow!(
                        "unknown overlay flag '{}': expected box, labels, conf or none",
                        other
                    ))
                }
            }
        }
        if !saw_any {
            return Err(anyhow!("overlay flags must not be empty (use 'none')"));
        }
        if saw_none && !flags.is_none() {
            return Err(anyhow!("overlay flag 'none' cannot be combined with other flags"));
        }
        Ok(flags)
    }
}

impl fmt::Display for OverlayFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("none");
        }
        let mut parts = Vec::with_capacity(3);
        if self.boxes {
            parts.push("box");
        }
        if self.labels {
            parts.push("labels");
        }
        if self.confidence {
            parts.push("conf");
        }
        f.write_str(&parts.join(","))
    }
}

/// Apply the requested overlay for `detections` to `frame`.
pub fn annotate(frame: &mut Frame, detections: &[DetectionResult], flags: OverlayFlags) {
    if flags.is_none() {
        return;
    }
    for det in detections {
        if flags.boxes {
            draw_outline(frame, det);
        }
        let text = match (flags.labels, flags.confidence) {
            (true, true) => Some(format!("{} {:.0}%", det.label, det.confidence * 100.0)),
            (true, false) => Some(det.label.clone()),
            (false, true) => Some(format!("{:.0}%", det.confidence * 100.0)),
            (false, false) => None,
        };
        frame.push_annotation(Annotation {
            bbox: det.bbox,
            text,
        });
    }
}

fn draw_outline(frame: &mut Frame, det: &DetectionResult) {
    let (width, height) = (frame.width, frame.height);
    if width == 0 || height == 0 {
        return;
    }
    let bbox = det.bbox.clamped(width, height);
    let left = (bbox.left as u32).min(width - 1);
    let top = (bbox.top as u32).min(height - 1);
    let right = (bbox.right as u32).min(width - 1);
    let bottom = (bbox.bottom as u32).min(height - 1);
    if right < left || bottom < top {
        return;
    }

    let pixels = frame.pixels_mut();
    let mut put = |x: u32, y: u32| {
        let idx = (y as usize * width as usize + x as usize) * 3;
        pixels[idx..idx + 3].copy_from_slice(&BOX_COLOR);
    };
    for t in 0..BOX_THICKNESS {
        let y_top = (top + t).min(bottom);
        let y_bottom = bottom.saturating_sub(t).max(top);
        for x in left..=right {
            put(x, y_top);
            put(x, y_bottom);
        }
        let x_left = (left + t).min(right);
        let x_right = right.saturating_sub(t).max(left);
        for y in top..=bottom {
            put(x_left, y);
            put(x_right, y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn detection(label: &str, confidence: f32, bbox: BoundingBox) -> DetectionResult {
        DetectionResult {
            class_id: 1,
            label: label.to_string(),
            confidence,
            bbox,
        }
    }

    #[test]
    fn parses_flag_lists() {
        assert_eq!("box,labels,conf".parse::<OverlayFlags>().unwrap(), OverlayFlags::ALL);
        assert_eq!("none".parse::<OverlayFlags>().unwrap(), OverlayFlags::NONE);
        let flags: OverlayFlags = " Box , confidence ".parse().unwrap();
        assert!(flags.boxes && flags.confidence && !flags.labels);
    }

    #[test]
    fn rejects_bad_flags() {
        assert!("box,none".parse::<OverlayFlags>().is_err());
        assert!("sparkles".parse::<OverlayFlags>().is_err());
        assert!("".parse::<OverlayFlags>().is_err());
    }

    #[test]
    fn display_round_trips() {
        for text in ["box,labels,conf", "none", "labels", "box,conf"] {
            let flags: OverlayFlags = text.parse().unwrap();
            assert_eq!(flags.to_string(), text);
        }
    }

    #[test]
    fn annotate_draws_boxes_and_text() {
        let mut frame = Frame::new(vec![0u8; 10 * 10 * 3], 10, 10, 1).unwrap();
        let dets = [detection("dog", 0.9, BoundingBox::new(2.0, 2.0, 7.0, 7.0))];
        annotate(&mut frame, &dets, OverlayFlags::ALL);

        let idx = (2 * 10 + 2) * 3;
        assert_eq!(&frame.pixels()[idx..idx + 3], &BOX_COLOR);
        let center = (5 * 10 + 5) * 3;
        assert_eq!(&frame.pixels()[center..center + 3], &[0, 0, 0]);

        assert_eq!(frame.annotations().len(), 1);
        assert_eq!(frame.annotations()[0].text.as_deref(), Some("dog 90%"));
    }

    #[test]
    fn annotate_none_leaves_frame_untouched() {
        let mut frame = Frame::new(vec![0u8; 4 * 4 * 3], 4, 4, 1).unwrap();
        let dets = [detection("cat", 0.5, BoundingBox::new(0.0, 0.0, 4.0, 4.0))];
        annotate(&mut frame, &dets, OverlayFlags::NONE);
        assert!(frame.pixels().iter().all(|&p| p == 0));
        assert!(frame.annotations().is_empty());
    }
}
