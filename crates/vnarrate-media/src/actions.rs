//! Heuristic action labels from motion summaries.

use vnarrate_models::Action;

use crate::motion::{summarize_motion, MotionSummary};
use crate::tracker::Track;

/// Source tag recorded on every heuristic action.
pub const HEURISTIC_SOURCE: &str = "heuristic";

/// Below this speed (px/s) a subject is treated as not moving.
const STILL_SPEED: f64 = 2.0;

/// Below this speed (px/s) a moving subject is slow.
const SLOW_SPEED: f64 = 20.0;

const MIN_CONFIDENCE: f64 = 0.5;
const MAX_CONFIDENCE: f64 = 0.9;
const MAX_ACCEL_BOOST: f64 = 0.2;
const ACCEL_SCALE: f64 = 30.0;

/// Speed band of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpeedBand {
    Still,
    Slow,
    Fast,
}

impl SpeedBand {
    fn from_speed(speed: f64) -> Self {
        if speed < STILL_SPEED {
            SpeedBand::Still
        } else if speed < SLOW_SPEED {
            SpeedBand::Slow
        } else {
            SpeedBand::Fast
        }
    }

    fn base_confidence(&self) -> f64 {
        match self {
            SpeedBand::Still => 0.55,
            SpeedBand::Slow => 0.65,
            SpeedBand::Fast => 0.70,
        }
    }

    fn verb(&self, is_person: bool) -> &'static str {
        match (self, is_person) {
            (SpeedBand::Still, true) => "standing",
            (SpeedBand::Still, false) => "stopped",
            (SpeedBand::Slow, true) => "walking",
            (SpeedBand::Slow, false) => "moving",
            (SpeedBand::Fast, true) => "running",
            (SpeedBand::Fast, false) => "driving",
        }
    }
}

/// Classify what a subject with the given label and motion is doing.
///
/// People stand, walk or run; anything else is stopped, moving or driving.
/// Stronger acceleration raises confidence, bounded to `[0.5, 0.9]`.
pub fn classify_action(label: &str, motion: &MotionSummary) -> Action {
    let band = SpeedBand::from_speed(motion.speed);
    let boost = (motion.accel.abs() / ACCEL_SCALE).min(MAX_ACCEL_BOOST);
    let confidence = (band.base_confidence() + boost).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);

    Action {
        label: band.verb(label == "person").to_string(),
        confidence,
        source_model: Some(HEURISTIC_SOURCE.to_string()),
    }
}

/// Classify a track's action from its own motion.
pub fn heuristic_action(track: &Track) -> Action {
    classify_action(track.label(), &summarize_motion(track))
}
