#![deny(unreachable_patterns)]
//! Temporal narration over per-frame object detections.
//!
//! This crate provides:
//! - Frame sampling from video via FFmpeg, or replayed detections
//! - Pluggable detector backends with construction-time fallback
//! - IoU tracking with persistent identities
//! - Motion, action and interaction heuristics per time window
//! - Caption and summary composition, SRT/VTT/JSONL export

pub mod actions;
pub mod compose;
pub mod config;
pub mod decode;
pub mod detection;
pub mod error;
pub mod export;
pub mod geometry;
pub mod graph;
pub mod motion;
pub mod pipeline;
pub mod probe;
pub mod tracker;

pub use actions::{classify_action, heuristic_action};
pub use compose::{build_summary, caption_from_event, compose_captions, summarize_events};
pub use config::PipelineConfig;
pub use decode::{FfmpegFrameSource, Frame, FrameSource, IterFrameSource};
pub use detection::{Detector, DetectorBuilder, MockDetector, ReplayDetector};
pub use error::{NarrateError, NarrateResult};
pub use export::{write_artifacts, write_events_jsonl, write_srt, write_summary, write_vtt, ArtifactPaths};
pub use geometry::iou;
pub use graph::infer_interactions;
pub use motion::{direction_from_velocity, summarize_motion, MotionSummary};
pub use pipeline::{run, EventWindow, NarrativePipeline, RunOutput, RunStats};
pub use probe::{probe_video, VideoInfo};
pub use tracker::{MatchingMode, Track, TrackId, Tracker, TrackerConfig};
