//! Detections replayed from a JSONL file.
//!
//! Each line holds one frame:
//!
//! ```json
//! {"frame_index": 0, "timestamp": 0.0, "detections": [{"id": 1, "label": "person", "bbox": {"x": 10, "y": 20, "w": 30, "h": 60}, "score": 0.9}]}
//! ```
//!
//! `timestamp` is optional. Replay runs need no video: `frame_source` turns
//! the recorded frames into image-less frames.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;
use vnarrate_models::Entity;

use super::Detector;
use crate::decode::{Frame, IterFrameSource};
use crate::error::{NarrateError, NarrateResult};

/// One recorded frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRecord {
    pub frame_index: u64,
    #[serde(default)]
    pub timestamp: Option<f64>,
    #[serde(default)]
    pub detections: Vec<Entity>,
}

/// Detector answering from recorded detections.
#[derive(Debug, Clone)]
pub struct ReplayDetector {
    by_frame: HashMap<u64, Vec<Entity>>,
    /// Recorded frames in file order, first occurrence of each index
    frames: Vec<(u64, Option<f64>)>,
}

impl ReplayDetector {
    /// Load records from a JSONL file. Blank lines are skipped.
    pub fn from_path(path: impl AsRef<Path>) -> NarrateResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(NarrateError::FileNotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let records = parse_records(&contents)?;

        info!(
            path = %path.display(),
            frames = records.len(),
            "Replay detections loaded"
        );

        Ok(Self::from_records(records))
    }

    pub fn from_records(records: impl IntoIterator<Item = ReplayRecord>) -> Self {
        let mut by_frame: HashMap<u64, Vec<Entity>> = HashMap::new();
        let mut frames = Vec::new();

        for record in records {
            let entry = by_frame.entry(record.frame_index).or_insert_with(|| {
                frames.push((record.frame_index, record.timestamp));
                Vec::new()
            });
            entry.extend(record.detections);
        }

        Self { by_frame, frames }
    }

    /// Number of distinct recorded frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Image-less frames for every recorded frame, in file order.
    ///
    /// Records without a timestamp are placed at `position / fps`.
    pub fn frame_source(&self, fps: u32) -> IterFrameSource<std::vec::IntoIter<Frame>> {
        let out_fps = f64::from(fps.max(1));
        let frames: Vec<Frame> = self
            .frames
            .iter()
            .enumerate()
            .map(|(position, &(index, timestamp))| {
                Frame::without_image(index, timestamp.unwrap_or(position as f64 / out_fps))
            })
            .collect();

        IterFrameSource::named(frames.into_iter(), "replay")
    }
}

fn parse_records(contents: &str) -> NarrateResult<Vec<ReplayRecord>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .map_err(|e| NarrateError::replay(format!("line {}: {}", n + 1, e)))
        })
        .collect()
}

impl Detector for ReplayDetector {
    fn infer(&self, frame: &Frame, min_confidence: f64) -> Vec<Entity> {
        self.by_frame
            .get(&frame.index)
            .map(|entities| {
                entities
                    .iter()
                    .filter(|e| e.score >= min_confidence)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn name(&self) -> &str {
        "replay"
    }

    fn uses_ai(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::FrameSource;
    use std::io::Write;
    use vnarrate_models::BBox;

    const SAMPLE: &str = r#"{"frame_index": 0, "timestamp": 0.0, "detections": [{"id": 1, "label": "person", "bbox": {"x": 10, "y": 20, "w": 30, "h": 60}, "score": 0.9}, {"id": 2, "label": "dog", "bbox": {"x": 100, "y": 20, "w": 30, "h": 20}, "score": 0.1}]}

{"frame_index": 4, "detections": []}
"#;

    #[test]
    fn test_parse_and_filter_by_confidence() {
        let detector = ReplayDetector::from_records(parse_records(SAMPLE).unwrap());
        assert_eq!(detector.frame_count(), 2);

        let entities = detector.infer(&Frame::without_image(0, 0.0), 0.25);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].label, "person");
        assert_eq!(entities[0].bbox, BBox::new(10.0, 20.0, 30.0, 60.0));

        assert_eq!(detector.infer(&Frame::without_image(0, 0.0), 0.0).len(), 2);
        assert!(detector.infer(&Frame::without_image(99, 0.0), 0.0).is_empty());
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let err = parse_records("{\"frame_index\": 0}\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let detector = ReplayDetector::from_path(file.path()).unwrap();
        assert_eq!(detector.frame_count(), 2);

        assert!(matches!(
            ReplayDetector::from_path("/nonexistent/detections.jsonl"),
            Err(NarrateError::FileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_frame_source_fills_missing_timestamps() {
        let detector = ReplayDetector::from_records(parse_records(SAMPLE).unwrap());
        let mut source = detector.frame_source(8);
        assert_eq!(source.name(), "replay");

        let first = source.next_frame().await.unwrap();
        assert_eq!((first.index, first.timestamp), (0, 0.0));
        assert!(first.image.is_none());

        let second = source.next_frame().await.unwrap();
        assert_eq!(second.index, 4);
        assert!((second.timestamp - 0.125).abs() < 1e-9);
        assert!(source.next_frame().await.is_none());
    }
}
