//! Box geometry shared by the tracker and the interaction grapher.

use vnarrate_models::BBox;

/// Added to IoU denominators so two zero-area boxes yield 0 instead of NaN.
pub const IOU_EPSILON: f64 = 1e-6;

/// Intersection over Union of two boxes, in `[0, 1]`.
pub fn iou(a: &BBox, b: &BBox) -> f64 {
    let ix1 = a.x.max(b.x);
    let iy1 = a.y.max(b.y);
    let ix2 = a.x2().min(b.x2());
    let iy2 = a.y2().min(b.y2());

    let inter_w = (ix2 - ix1).max(0.0);
    let inter_h = (iy2 - iy1).max(0.0);
    let intersection = inter_w * inter_h;

    let union = a.area() + b.area() - intersection + IOU_EPSILON;
    intersection / union
}

/// Squared distance between two box centers.
#[inline]
pub fn center_distance_sq(a: &BBox, b: &BBox) -> f64 {
    let (ax, ay) = a.center();
    let (bx, by) = b.center();
    let dx = bx - ax;
    let dy = by - ay;
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_identical_boxes() {
        let a = BBox::new(10.0, 10.0, 50.0, 40.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_symmetric_and_bounded() {
        let boxes = [
            BBox::new(0.0, 0.0, 10.0, 10.0),
            BBox::new(5.0, 5.0, 10.0, 10.0),
            BBox::new(20.0, 20.0, 5.0, 5.0),
            BBox::new(2.0, 2.0, 0.0, 0.0),
            BBox::new(0.0, 0.0, 100.0, 1.0),
        ];
        for a in &boxes {
            for b in &boxes {
                let ab = iou(a, b);
                assert_eq!(ab, iou(b, a));
                assert!((0.0..=1.0).contains(&ab));
            }
        }
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 0.0, 10.0, 10.0);
        // 50 / (100 + 100 - 50)
        assert!((iou(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_degenerate_boxes() {
        let a = BBox::new(3.0, 3.0, 0.0, 0.0);
        assert_eq!(iou(&a, &a), 0.0);
        let disjoint = BBox::new(100.0, 100.0, 1.0, 1.0);
        assert_eq!(iou(&BBox::new(0.0, 0.0, 1.0, 1.0), &disjoint), 0.0);
    }

    #[test]
    fn test_center_distance_sq() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(3.0, 4.0, 10.0, 10.0);
        assert!((center_distance_sq(&a, &b) - 25.0).abs() < 1e-9);
    }
}
