//! Per-tick detection report.
//!
//! The report is built once from the detector output and formatted once;
//! nothing appends to it afterwards.

use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::detect::DetectionResult;
use crate::error::PublishError;

/// Ordered detections for one captured frame.
#[derive(Clone, Debug, Serialize)]
pub struct DetectionReport {
    pub frame_sequence: u64,
    pub frame_width: u32,
    pub frame_height: u32,
    count: usize,
    detections: Vec<DetectionResult>,
}

impl DetectionReport {
    pub fn new(
        frame_sequence: u64,
        frame_width: u32,
        frame_height: u32,
        detections: Vec<DetectionResult>,
    ) -> Self {
        Self {
            frame_sequence,
            frame_width,
            frame_height,
            count: detections.len(),
            detections,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn detections(&self) -> &[DetectionResult] {
        &self.detections
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Human-readable summary: a count line, then one line per detection.
    pub fn to_text(&self) -> String {
        let mut out = format!("detected {} objects in image\n", self.count);
        for det in &self.detections {
            out.push_str(&det.to_string());
            out.push('\n');
        }
        out
    }

    pub fn to_json(&self) -> Result<String, PublishError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn format(&self, format: ReportFormat) -> Result<String, PublishError> {
        match format {
            ReportFormat::Text => Ok(self.to_text()),
            ReportFormat::Json => self.to_json(),
        }
    }
}

/// Wire format for published reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(anyhow!(
                "unknown report format '{}': expected 'text' or 'json'",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn det(label: &str, confidence: f32) -> DetectionResult {
        DetectionResult {
            class_id: 3,
            label: label.to_string(),
            confidence,
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
        }
    }

    #[test]
    fn count_tracks_detections() {
        let report = DetectionReport::new(1, 640, 480, vec![det("a", 0.9), det("b", 0.8)]);
        assert_eq!(report.count(), report.detections().len());
        assert!(!report.is_empty());
    }

    #[test]
    fn empty_report_text() {
        let report = DetectionReport::new(1, 640, 480, Vec::new());
        assert_eq!(report.to_text(), "detected 0 objects in image\n");
    }

    #[test]
    fn text_lists_detections_in_order() {
        let report = DetectionReport::new(
            9,
            640,
            480,
            vec![det("person", 0.9), det("car", 0.7), det("dog", 0.6)],
        );
        let text = report.to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "detected 3 objects in image");
        assert!(lines[1].contains("person"));
        assert!(lines[2].contains("car"));
        assert!(lines[3].contains("dog"));
    }

    #[test]
    fn json_carries_count_and_boxes() {
        let report = DetectionReport::new(5, 320, 240, vec![det("person", 0.5)]);
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(value["frame_sequence"], 5);
        assert_eq!(value["detections"][0]["label"], "person");
        assert_eq!(value["detections"][0]["bbox"]["right"], 10.0);
    }

    #[test]
    fn parses_report_format() {
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert_eq!("text".parse::<ReportFormat>().unwrap(), ReportFormat::Text);
        assert!("xml".parse::<ReportFormat>().is_err());
    }
}
