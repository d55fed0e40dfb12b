//! Per-frame object detection backends.
//!
//! | Backend | Detector | Needs pixels |
//! |---------|----------|--------------|
//! | `yolov8-seg` | `YoloDetector` (feature `onnx`) | yes |
//! | `mock` | `MockDetector` | no |
//! | `replay` | `ReplayDetector` | no |
//!
//! Use `DetectorBuilder` to select a backend; unavailable backends fall back
//! to `MockDetector` at construction.

pub mod builder;
#[cfg(feature = "onnx")]
pub mod object_detector;
pub mod replay;

pub use builder::DetectorBuilder;
#[cfg(feature = "onnx")]
pub use object_detector::{YoloDetector, YoloDetectorConfig, COCO_CLASSES};
pub use replay::{ReplayDetector, ReplayRecord};

use vnarrate_models::Entity;

use crate::decode::Frame;

/// Object detector over sampled frames.
///
/// Implementations never fail a frame: errors are logged and the frame yields
/// no entities.
pub trait Detector: Send + Sync {
    /// Entities in `frame` with `score >= min_confidence`.
    fn infer(&self, frame: &Frame, min_confidence: f64) -> Vec<Entity>;

    /// Backend name recorded in event provenance.
    fn name(&self) -> &str;

    /// Whether this detector runs a learned model.
    fn uses_ai(&self) -> bool;
}

/// Detector that never finds anything.
///
/// Carries the name of the backend it stands in for so provenance still
/// reports what was requested.
#[derive(Debug, Clone)]
pub struct MockDetector {
    name: String,
}

impl MockDetector {
    pub fn new() -> Self {
        Self::named("mock")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for MockDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for MockDetector {
    fn infer(&self, _frame: &Frame, _min_confidence: f64) -> Vec<Entity> {
        Vec::new()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn uses_ai(&self) -> bool {
        false
    }
}
