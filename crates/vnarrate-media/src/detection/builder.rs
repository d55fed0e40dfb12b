//! Detector construction with fallback.
//!
//! `try_build` is strict and reports why a backend is unavailable. `build`
//! never fails: an unavailable backend is replaced by a `MockDetector` that
//! keeps the requested backend's name.

use std::path::PathBuf;

use tracing::{info, warn};
use vnarrate_models::DetectorBackend;

use super::{Detector, MockDetector, ReplayDetector};
use crate::config::{PipelineConfig, DEFAULT_MODEL_PATH};
use crate::error::{NarrateError, NarrateResult};

/// Builder for the per-frame detector.
///
/// # Example
///
/// ```ignore
/// let detector = DetectorBuilder::for_backend(DetectorBackend::Replay)
///     .with_replay_path("detections.jsonl")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct DetectorBuilder {
    backend: DetectorBackend,
    model_path: String,
    replay_path: Option<PathBuf>,
}

impl DetectorBuilder {
    /// Create a builder for the specified backend.
    pub fn for_backend(backend: DetectorBackend) -> Self {
        Self {
            backend,
            model_path: DEFAULT_MODEL_PATH.to_string(),
            replay_path: None,
        }
    }

    /// Builder carrying the detector settings of a pipeline config.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let builder = Self::for_backend(config.detector).with_model_path(config.model_path.clone());
        match &config.replay_path {
            Some(path) => builder.with_replay_path(path.clone()),
            None => builder,
        }
    }

    pub fn with_model_path(mut self, path: impl Into<String>) -> Self {
        self.model_path = path.into();
        self
    }

    pub fn with_replay_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.replay_path = Some(path.into());
        self
    }

    /// Build the requested backend or explain why it is unavailable.
    pub fn try_build(&self) -> NarrateResult<Box<dyn Detector>> {
        info!(
            backend = %self.backend,
            description = self.backend.description(),
            "Building detector"
        );
        match self.backend {
            DetectorBackend::Mock => {
                Ok(Box::new(MockDetector::new()))
            }
            DetectorBackend::Replay => {
                let path = self
                    .replay_path
                    .as_ref()
                    .ok_or_else(|| NarrateError::replay("replay backend needs a detections file"))?;
                info!(path = %path.display(), "Loading replay detections");
                Ok(Box::new(ReplayDetector::from_path(path)?))
            }
            DetectorBackend::Yolov8Seg => self.build_yolo(),
        }
    }

    #[cfg(feature = "onnx")]
    fn build_yolo(&self) -> NarrateResult<Box<dyn Detector>> {
        use super::{YoloDetector, YoloDetectorConfig};

        info!(model_path = %self.model_path, "Loading YOLOv8 model");
        let detector = YoloDetector::new(YoloDetectorConfig {
            model_path: self.model_path.clone(),
            ..Default::default()
        })?;
        Ok(Box::new(detector))
    }

    #[cfg(not(feature = "onnx"))]
    fn build_yolo(&self) -> NarrateResult<Box<dyn Detector>> {
        Err(NarrateError::model_not_found(format!(
            "{} (built without the `onnx` feature)",
            self.model_path
        )))
    }

    /// Build the detector, falling back to an empty detector when the
    /// requested backend is unavailable.
    pub fn build(self) -> Box<dyn Detector> {
        match self.try_build() {
            Ok(detector) => detector,
            Err(e) => {
                warn!(
                    backend = %self.backend,
                    error = %e,
                    "Detector unavailable, falling back to empty detections"
                );
                Box::new(MockDetector::named(self.backend.as_str()))
            }
        }
    }
}
