//! Axis-aligned bounding box in frame pixel coordinates.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Bounding box in pixel coordinates (left, top, width, height).
///
/// Degenerate boxes (zero width or height) are legal; they simply
/// contribute zero area to overlap computations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BBox {
    /// Left edge x-coordinate
    pub x: f64,
    /// Top edge y-coordinate
    pub y: f64,
    /// Box width
    pub w: f64,
    /// Box height
    pub h: f64,
}

impl BBox {
    /// Create a new bounding box.
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Center point `(cx, cy)`.
    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Right edge x-coordinate.
    #[inline]
    pub fn x2(&self) -> f64 {
        self.x + self.w
    }

    /// Bottom edge y-coordinate.
    #[inline]
    pub fn y2(&self) -> f64 {
        self.y + self.h
    }

    /// Box area in pixels.
    #[inline]
    pub fn area(&self) -> f64 {
        self.w * self.h
    }
}
