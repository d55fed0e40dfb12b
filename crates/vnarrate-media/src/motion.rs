//! Motion summaries from track history.
//!
//! Velocity is measured on box centers, in pixels per second, over the most
//! recent steps of a track.

use vnarrate_models::{Direction, Motion};

use crate::tracker::Track;

/// Number of recent velocity samples considered.
pub const MOTION_TAIL: usize = 5;

/// Minimum time step used as a denominator.
const MIN_DT: f64 = 1e-6;

/// Velocities below this on both axes count as stationary.
const STATIONARY_EPSILON: f64 = 1e-6;

/// One axis must exceed the other by this factor to be the sole direction.
const DOMINANCE_RATIO: f64 = 1.5;

/// Speed, acceleration and heading of a track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSummary {
    /// Mean speed over the tail, pixels per second
    pub speed: f64,
    /// Speed change across the tail, per second
    pub accel: f64,
    pub direction: Direction,
}

impl Default for MotionSummary {
    fn default() -> Self {
        Self {
            speed: 0.0,
            accel: 0.0,
            direction: Direction::Stationary,
        }
    }
}

impl From<MotionSummary> for Motion {
    fn from(summary: MotionSummary) -> Self {
        Motion {
            direction: summary.direction,
            speed: summary.speed,
            accel: summary.accel,
        }
    }
}

/// A velocity sample stamped with the later of its two timestamps.
#[derive(Debug, Clone, Copy)]
struct Velocity {
    t: f64,
    vx: f64,
    vy: f64,
}

impl Velocity {
    fn magnitude(&self) -> f64 {
        self.vx.hypot(self.vy)
    }
}

fn velocities(track: &Track) -> Vec<Velocity> {
    track
        .history()
        .windows(2)
        .map(|pair| {
            let (prev, cur) = (&pair[0], &pair[1]);
            let dt = (cur.timestamp - prev.timestamp).max(MIN_DT);
            let (cx0, cy0) = prev.bbox.center();
            let (cx1, cy1) = cur.bbox.center();
            Velocity {
                t: cur.timestamp,
                vx: (cx1 - cx0) / dt,
                vy: (cy1 - cy0) / dt,
            }
        })
        .collect()
}

/// Map a velocity to a coarse compass direction.
///
/// Screen coordinates: positive `vy` points south.
pub fn direction_from_velocity(vx: f64, vy: f64) -> Direction {
    if vx.abs() < STATIONARY_EPSILON && vy.abs() < STATIONARY_EPSILON {
        return Direction::Stationary;
    }

    let east = vx > 0.0;
    let south = vy > 0.0;

    if vx.abs() > DOMINANCE_RATIO * vy.abs() {
        return if east { Direction::East } else { Direction::West };
    }
    if vy.abs() > DOMINANCE_RATIO * vx.abs() {
        return if south { Direction::South } else { Direction::North };
    }

    match (south, east) {
        (true, true) => Direction::SouthEast,
        (true, false) => Direction::SouthWest,
        (false, true) => Direction::NorthEast,
        (false, false) => Direction::NorthWest,
    }
}

/// Summarize a track's recent motion.
///
/// Tracks with fewer than two history points are stationary with zero speed.
pub fn summarize_motion(track: &Track) -> MotionSummary {
    let samples = velocities(track);
    let tail = &samples[samples.len().saturating_sub(MOTION_TAIL)..];

    let (Some(first), Some(last)) = (tail.first(), tail.last()) else {
        return MotionSummary::default();
    };

    let speed = tail.iter().map(Velocity::magnitude).sum::<f64>() / tail.len() as f64;

    let accel = if tail.len() >= 2 {
        let span = (last.t - first.t).max(MIN_DT);
        (last.magnitude() - first.magnitude()) / span
    } else {
        0.0
    };

    MotionSummary {
        speed,
        accel,
        direction: direction_from_velocity(last.vx, last.vy),
    }
}
