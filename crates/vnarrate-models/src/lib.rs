//! Shared data models for the VideoNarrate pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Bounding boxes and per-frame detector entities
//! - Motion, action, and interaction hypotheses
//! - Timestamped events with provenance
//! - Caption lines and label-frequency summaries
//! - Detector backend selection
//! - Subtitle timestamp formatting

pub mod bbox;
pub mod caption;
pub mod detector_backend;
pub mod entity;
pub mod event;
pub mod timestamp;

// Re-export common types
pub use bbox::BBox;
pub use caption::{CaptionLine, LabelCount, SceneSummary, Summary};
pub use detector_backend::{DetectorBackend, DetectorBackendParseError};
pub use entity::Entity;
pub use event::{Action, Direction, Event, Interaction, InteractionKind, Motion, Provenance};
pub use timestamp::{format_srt_timestamp, format_vtt_timestamp, parse_timestamp, TimestampError};
