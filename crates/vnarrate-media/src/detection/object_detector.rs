//! Object detection using a YOLOv8 ONNX model.
//!
//! Accepts detection (`[1, 84, N]`) and segmentation (`[1, 116, N]`) heads;
//! mask coefficients past the 80 class scores are ignored. Boxes come back
//! in source-frame pixels.

use std::path::Path;
use std::sync::Mutex;

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::ArrayView2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info, warn};
use vnarrate_models::{BBox, Entity};

use super::Detector;
use crate::decode::Frame;
use crate::error::{NarrateError, NarrateResult};
use crate::geometry::iou;

/// COCO class names (80 classes).
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck",
    "boat", "traffic light", "fire hydrant", "stop sign", "parking meter", "bench",
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
    "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove",
    "skateboard", "surfboard", "tennis racket", "bottle", "wine glass", "cup",
    "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
    "toothbrush",
];

const BOX_FEATURES: usize = 4;

/// Configuration for the YOLOv8 detector.
#[derive(Debug, Clone)]
pub struct YoloDetectorConfig {
    /// Path to ONNX model file
    pub model_path: String,
    /// IoU threshold for per-class NMS
    pub nms_threshold: f64,
    /// Square model input size
    pub input_size: u32,
}

impl Default for YoloDetectorConfig {
    fn default() -> Self {
        Self {
            model_path: crate::config::DEFAULT_MODEL_PATH.to_string(),
            nms_threshold: 0.45,
            input_size: 640,
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    bbox: BBox,
    class_id: usize,
    confidence: f64,
}

/// YOLOv8 detector backed by ONNX Runtime.
pub struct YoloDetector {
    session: Mutex<Session>,
    config: YoloDetectorConfig,
}

impl YoloDetector {
    /// Load the model.
    ///
    /// Returns error if the model file doesn't exist or cannot be loaded.
    pub fn new(config: YoloDetectorConfig) -> NarrateResult<Self> {
        let model_path = Path::new(&config.model_path);
        if !model_path.exists() {
            return Err(NarrateError::model_not_found(&config.model_path));
        }

        let session = Mutex::new(create_session(model_path)?);
        info!(
            model_path = %config.model_path,
            input_size = config.input_size,
            "YOLOv8 detector initialized"
        );

        Ok(Self { session, config })
    }

    /// Detect objects in an RGB frame.
    pub fn detect(&self, image: &RgbImage, min_confidence: f64) -> NarrateResult<Vec<Entity>> {
        let input = self.preprocess(image)?;
        let (dims, data) = self.run_inference(input)?;
        let candidates = self.postprocess(&dims, &data, image.width(), image.height(), min_confidence)?;
        let kept = non_maximum_suppression(candidates, self.config.nms_threshold);

        debug!(count = kept.len(), "Object detection completed");

        Ok(kept
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                let label = COCO_CLASSES
                    .get(c.class_id)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| c.class_id.to_string());
                Entity::new(i as u64 + 1, label, c.bbox, c.confidence)
            })
            .collect())
    }

    /// Resize to the model input, scale to [0, 1], lay out as NCHW.
    fn preprocess(&self, image: &RgbImage) -> NarrateResult<Value> {
        let size = self.config.input_size;
        let resized = image::imageops::resize(image, size, size, FilterType::Triangle);
        let side = size as usize;

        let mut chw: Vec<f32> = vec![0.0; 3 * side * side];
        for (x, y, pixel) in resized.enumerate_pixels() {
            let offset = y as usize * side + x as usize;
            for c in 0..3 {
                chw[c * side * side + offset] = f32::from(pixel[c]) / 255.0;
            }
        }

        let shape = vec![1usize, 3, side, side];
        Tensor::from_array((shape, chw.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| NarrateError::detection_failed(format!("Failed to create tensor: {}", e)))
    }

    fn run_inference(&self, input: Value) -> NarrateResult<(Vec<usize>, Vec<f32>)> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| NarrateError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| NarrateError::detection_failed(format!("ONNX inference failed: {}", e)))?;

        let output = outputs
            .get("output0")
            .ok_or_else(|| NarrateError::detection_failed("Missing output0 tensor"))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| NarrateError::detection_failed(format!("Failed to extract tensor: {}", e)))?;

        let dims = shape.iter().map(|&d| d.max(0) as usize).collect();
        Ok((dims, data.to_vec()))
    }

    /// Decode `[1, features, boxes]` into thresholded pixel-space candidates.
    fn postprocess(
        &self,
        dims: &[usize],
        data: &[f32],
        width: u32,
        height: u32,
        min_confidence: f64,
    ) -> NarrateResult<Vec<Candidate>> {
        let num_classes = COCO_CLASSES.len();
        let (features, boxes) = match dims {
            [1, f, b] if *f >= BOX_FEATURES + num_classes => (*f, *b),
            _ => {
                return Err(NarrateError::detection_failed(format!(
                    "Unexpected output shape: {:?}",
                    dims
                )))
            }
        };

        let table = ArrayView2::from_shape((features, boxes), data)
            .map_err(|e| NarrateError::detection_failed(format!("Failed to reshape output: {}", e)))?;

        let input_size = self.config.input_size as f64;
        let (fw, fh) = (f64::from(width), f64::from(height));
        let scale_w = fw / input_size;
        let scale_h = fh / input_size;

        let mut candidates = Vec::new();
        for i in 0..boxes {
            let (best_class, best_score) = (0..num_classes)
                .map(|c| (c, f64::from(table[[BOX_FEATURES + c, i]])))
                .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });

            if best_score < min_confidence {
                continue;
            }

            let cx = f64::from(table[[0, i]]);
            let cy = f64::from(table[[1, i]]);
            let w = f64::from(table[[2, i]]);
            let h = f64::from(table[[3, i]]);

            let x = ((cx - w / 2.0) * scale_w).clamp(0.0, fw);
            let y = ((cy - h / 2.0) * scale_h).clamp(0.0, fh);
            let bw = (w * scale_w).min(fw - x);
            let bh = (h * scale_h).min(fh - y);

            candidates.push(Candidate {
                bbox: BBox::new(x, y, bw, bh),
                class_id: best_class,
                confidence: best_score,
            });
        }

        Ok(candidates)
    }
}

impl Detector for YoloDetector {
    fn infer(&self, frame: &Frame, min_confidence: f64) -> Vec<Entity> {
        let Some(image) = frame.image.as_ref() else {
            debug!(frame_index = frame.index, "Frame has no pixels, skipping detection");
            return Vec::new();
        };

        match self.detect(image, min_confidence) {
            Ok(entities) => entities,
            Err(e) => {
                warn!(frame_index = frame.index, error = %e, "Detection failed, treating frame as empty");
                Vec::new()
            }
        }
    }

    fn name(&self) -> &str {
        "yolov8-seg"
    }

    fn uses_ai(&self) -> bool {
        true
    }
}

/// Greedy per-class NMS, highest confidence first.
fn non_maximum_suppression(mut candidates: Vec<Candidate>, threshold: f64) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let suppressed = keep
            .iter()
            .any(|k| k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > threshold);
        if !suppressed {
            keep.push(candidate);
        }
    }
    keep
}

/// Create ONNX Runtime session with automatic execution provider selection.
fn create_session(model_path: &Path) -> NarrateResult<Session> {
    let model_bytes = std::fs::read(model_path)?;

    let builder = Session::builder()
        .map_err(|e| NarrateError::internal(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| NarrateError::internal(format!("Failed to set optimization level: {}", e)))?;

    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!("Using CoreML execution provider for object detection");
                return Ok(session);
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    info!("Using CPU execution provider for object detection");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| NarrateError::model_not_found(format!("{}: {}", model_path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x: f64, class_id: usize, confidence: f64) -> Candidate {
        Candidate {
            bbox: BBox::new(x, 0.0, 100.0, 100.0),
            class_id,
            confidence,
        }
    }

    #[test]
    fn test_coco_classes() {
        assert_eq!(COCO_CLASSES[0], "person");
        assert_eq!(COCO_CLASSES[2], "car");
        assert_eq!(COCO_CLASSES.len(), 80);
    }

    #[test]
    fn test_config_default() {
        let config = YoloDetectorConfig::default();
        assert_eq!(config.input_size, 640);
        assert!((config.nms_threshold - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_nms_suppresses_same_class_only() {
        let kept = non_maximum_suppression(
            vec![
                candidate(0.0, 0, 0.6),
                candidate(5.0, 0, 0.9),
                candidate(5.0, 2, 0.5),
                candidate(500.0, 0, 0.4),
            ],
            0.45,
        );
        let summary: Vec<_> = kept.iter().map(|c| (c.class_id, c.confidence)).collect();
        assert_eq!(summary, vec![(0, 0.9), (2, 0.5), (0, 0.4)]);
    }

    #[test]
    fn test_missing_model() {
        let result = YoloDetector::new(YoloDetectorConfig {
            model_path: "/nonexistent/model.onnx".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(NarrateError::ModelNotFound(_))));
    }
}
