//! Configuration for the narration pipeline.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use vnarrate_models::DetectorBackend;

use crate::error::{NarrateError, NarrateResult};
use crate::tracker::{MatchingMode, TrackerConfig};

/// Default location of the YOLOv8 segmentation model.
pub const DEFAULT_MODEL_PATH: &str = "models/object_detection/yolov8s-seg.onnx";

/// Configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    // === Sampling ===
    /// Frames per second to sample from the source (default: 8)
    pub fps: u32,

    /// Optional cap on processed media time in seconds
    pub max_seconds: Option<f64>,

    // === Windowing ===
    /// Window length in seconds (default: 2.5)
    pub window: f64,

    /// Stride between emitted windows in seconds (default: 1.0)
    pub stride: f64,

    /// Emit the trailing partial window at end of stream (default: false)
    pub flush_partial_window: bool,

    // === Detection ===
    /// Detector backend (default: yolov8-seg)
    pub detector: DetectorBackend,

    /// ONNX model path for the yolov8-seg backend
    pub model_path: String,

    /// Detections JSONL for the replay backend
    pub replay_path: Option<PathBuf>,

    /// Minimum detection confidence (default: 0.25)
    pub min_det_conf: f64,

    /// Labels to keep; all labels are kept when unset
    pub allowed_labels: Option<BTreeSet<String>>,

    // === Tracking ===
    /// IoU threshold for track matching (default: 0.3)
    pub iou_threshold: f64,

    /// Frames a track survives without a match (default: 30)
    pub max_age: u64,

    /// Detection-to-track assignment policy (default: independent)
    pub matching: MatchingMode,

    /// Drop retired tracks from the identity table (default: false)
    pub evict_retired: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fps: 8,
            max_seconds: None,
            window: 2.5,
            stride: 1.0,
            flush_partial_window: false,
            detector: DetectorBackend::Yolov8Seg,
            model_path: DEFAULT_MODEL_PATH.to_string(),
            replay_path: None,
            min_det_conf: 0.25,
            allowed_labels: None,
            iou_threshold: 0.3,
            max_age: 30,
            matching: MatchingMode::Independent,
            evict_retired: false,
        }
    }
}

impl PipelineConfig {
    /// Create config from `VNARRATE_*` environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            fps: parse_var(&lookup, "VNARRATE_FPS").unwrap_or(defaults.fps),
            max_seconds: parse_var(&lookup, "VNARRATE_MAX_SECONDS").or(defaults.max_seconds),
            window: parse_var(&lookup, "VNARRATE_WINDOW").unwrap_or(defaults.window),
            stride: parse_var(&lookup, "VNARRATE_STRIDE").unwrap_or(defaults.stride),
            flush_partial_window: parse_var(&lookup, "VNARRATE_FLUSH_PARTIAL")
                .unwrap_or(defaults.flush_partial_window),
            detector: parse_var(&lookup, "VNARRATE_DETECTOR").unwrap_or(defaults.detector),
            model_path: lookup("VNARRATE_MODEL_PATH").unwrap_or(defaults.model_path),
            replay_path: lookup("VNARRATE_REPLAY_PATH").map(PathBuf::from),
            min_det_conf: parse_var(&lookup, "VNARRATE_MIN_DET_CONF").unwrap_or(defaults.min_det_conf),
            allowed_labels: lookup("VNARRATE_ALLOW_LABELS")
                .and_then(|s| parse_label_list(&s)),
            iou_threshold: parse_var(&lookup, "VNARRATE_IOU_THRESHOLD").unwrap_or(defaults.iou_threshold),
            max_age: parse_var(&lookup, "VNARRATE_MAX_AGE").unwrap_or(defaults.max_age),
            matching: parse_var(&lookup, "VNARRATE_MATCHING").unwrap_or(defaults.matching),
            evict_retired: parse_var(&lookup, "VNARRATE_EVICT_RETIRED").unwrap_or(defaults.evict_retired),
        }
    }

    /// Reject settings the pipeline cannot run with.
    ///
    /// Called before any frame is processed.
    pub fn validate(&self) -> NarrateResult<()> {
        if self.fps == 0 {
            return Err(NarrateError::invalid_config("fps must be greater than 0"));
        }
        if !(self.window.is_finite() && self.window > 0.0) {
            return Err(NarrateError::invalid_config(format!(
                "window must be a positive number of seconds, got {}",
                self.window
            )));
        }
        if !(self.stride.is_finite() && self.stride > 0.0) {
            return Err(NarrateError::invalid_config(format!(
                "stride must be a positive number of seconds, got {}",
                self.stride
            )));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(NarrateError::invalid_config(format!(
                "iou_threshold must be within [0, 1], got {}",
                self.iou_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.min_det_conf) {
            return Err(NarrateError::invalid_config(format!(
                "min_det_conf must be within [0, 1], got {}",
                self.min_det_conf
            )));
        }
        if let Some(max_seconds) = self.max_seconds {
            if max_seconds.is_nan() || max_seconds < 0.0 {
                return Err(NarrateError::invalid_config(format!(
                    "max_seconds cannot be negative, got {}",
                    max_seconds
                )));
            }
        }
        Ok(())
    }

    /// Tracker settings derived from this config.
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            iou_threshold: self.iou_threshold,
            max_age: self.max_age,
            matching: self.matching,
            evict_retired: self.evict_retired,
        }
    }

    /// True when `label` passes the allow-list.
    pub fn allows_label(&self, label: &str) -> bool {
        self.allowed_labels
            .as_ref()
            .map_or(true, |labels| labels.contains(label))
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|s| s.trim().parse().ok())
}

/// Parse a comma-separated label list. Empty lists mean "no filter".
pub fn parse_label_list(raw: &str) -> Option<BTreeSet<String>> {
    let labels: BTreeSet<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if labels.is_empty() {
        None
    } else {
        Some(labels)
    }
}
