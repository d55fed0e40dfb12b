//! Detector backend definitions.
//!
//! The backend name selects which detector produces per-frame entities:
//!
//! - `yolov8-seg`: YOLOv8 ONNX model (requires the model file)
//! - `mock`: produces no detections (pipeline runs with empty outputs)
//! - `replay`: re-reads detections previously dumped to a JSONL file

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Detector backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum DetectorBackend {
    /// YOLOv8 segmentation/detection model via ONNX Runtime.
    #[default]
    #[serde(rename = "yolov8-seg")]
    Yolov8Seg,

    /// No-op detector.
    #[serde(rename = "mock")]
    Mock,

    /// Detections replayed from a JSONL dump.
    #[serde(rename = "replay")]
    Replay,
}

impl DetectorBackend {
    /// All available backends.
    pub const ALL: &'static [DetectorBackend] = &[
        DetectorBackend::Yolov8Seg,
        DetectorBackend::Mock,
        DetectorBackend::Replay,
    ];

    /// Returns the backend name as recorded in event provenance.
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorBackend::Yolov8Seg => "yolov8-seg",
            DetectorBackend::Mock => "mock",
            DetectorBackend::Replay => "replay",
        }
    }

    /// Returns a human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            DetectorBackend::Yolov8Seg => "YOLOv8 object detection (ONNX Runtime)",
            DetectorBackend::Mock => "No detections (dry run)",
            DetectorBackend::Replay => "Detections replayed from a JSONL file",
        }
    }

    /// Returns true if this backend needs decoded pixels.
    pub fn needs_pixels(&self) -> bool {
        matches!(self, DetectorBackend::Yolov8Seg)
    }
}

impl fmt::Display for DetectorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DetectorBackend {
    type Err = DetectorBackendParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yolov8-seg" | "yolov8" | "yolo" => Ok(DetectorBackend::Yolov8Seg),
            "mock" | "none" => Ok(DetectorBackend::Mock),
            "replay" => Ok(DetectorBackend::Replay),
            _ => Err(DetectorBackendParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown detector backend: {0}")]
pub struct DetectorBackendParseError(String);
