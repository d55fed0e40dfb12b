//! Pairwise interaction inference between live tracks.

use vnarrate_models::{Interaction, InteractionKind};

use crate::geometry::center_distance_sq;
use crate::tracker::{Track, TrackId};

/// Labels treated as vehicles when paired with a person.
pub const VEHICLE_LABELS: &[&str] = &["car", "truck", "bus", "vehicle"];

const YIELDING_CONFIDENCE: f64 = 0.6;
const NEARBY_CONFIDENCE: f64 = 0.5;

fn is_vehicle(label: &str) -> bool {
    VEHICLE_LABELS.contains(&label)
}

fn classify_pair(a: &str, b: &str) -> Interaction {
    let person_and_vehicle = (a == "person" && is_vehicle(b)) || (b == "person" && is_vehicle(a));
    if person_and_vehicle {
        Interaction {
            kind: InteractionKind::YieldingPassing,
            confidence: YIELDING_CONFIDENCE,
        }
    } else {
        Interaction {
            kind: InteractionKind::Nearby,
            confidence: NEARBY_CONFIDENCE,
        }
    }
}

/// Close-pair interactions among `tracks`.
///
/// Two tracks are close when their centers are nearer than twice the mean of
/// their four side lengths. Pairs come out as `(earlier, later)` in input
/// order. All pairs are compared.
pub fn infer_interactions(tracks: &[&Track]) -> Vec<(TrackId, TrackId, Interaction)> {
    let mut pairs = Vec::new();

    for (i, a) in tracks.iter().enumerate() {
        for b in &tracks[i + 1..] {
            let (ba, bb) = (a.bbox(), b.bbox());
            let threshold = (ba.w + bb.w + ba.h + bb.h) / 4.0;
            let limit = 2.0 * threshold;
            if center_distance_sq(ba, bb) < limit * limit {
                pairs.push((a.id(), b.id(), classify_pair(a.label(), b.label())));
            }
        }
    }

    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::HistoryPoint;
    use vnarrate_models::BBox;

    fn track(id: TrackId, label: &str, x: f64, y: f64) -> Track {
        Track::from_history(
            id,
            label,
            0.9,
            vec![HistoryPoint {
                frame_index: 0,
                timestamp: 0.0,
                bbox: BBox::new(x, y, 40.0, 80.0),
            }],
        )
    }

    #[test]
    fn test_person_near_car_is_yielding() {
        let person = track(1, "person", 100.0, 100.0);
        let car = track(2, "car", 130.0, 100.0);
        let pairs = infer_interactions(&[&person, &car]);
        assert_eq!(pairs.len(), 1);
        let (a, b, interaction) = pairs[0];
        assert_eq!((a, b), (1, 2));
        assert_eq!(interaction.kind, InteractionKind::YieldingPassing);
        assert!((interaction.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_same_labels_are_nearby() {
        let a = track(1, "person", 100.0, 100.0);
        let b = track(2, "person", 130.0, 100.0);
        let pairs = infer_interactions(&[&a, &b]);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].2.kind, InteractionKind::Nearby);
        assert!((pairs[0].2.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_two_vehicles_are_nearby() {
        let a = track(1, "car", 100.0, 100.0);
        let b = track(2, "truck", 110.0, 100.0);
        assert_eq!(infer_interactions(&[&a, &b])[0].2.kind, InteractionKind::Nearby);
    }

    #[test]
    fn test_far_pairs_are_ignored() {
        // Threshold is (40 + 40 + 80 + 80) / 4 = 60, so the limit is 120.
        let a = track(1, "person", 0.0, 0.0);
        let b = track(2, "car", 120.0, 0.0);
        let c = track(3, "dog", 119.0, 0.0);
        let pairs = infer_interactions(&[&a, &b, &c]);
        let ids: Vec<_> = pairs.iter().map(|(x, y, _)| (*x, *y)).collect();
        assert_eq!(ids, vec![(1, 3), (2, 3)]);
    }

    #[test]
    fn test_single_track_has_no_pairs() {
        let a = track(1, "person", 0.0, 0.0);
        assert!(infer_interactions(&[&a]).is_empty());
        assert!(infer_interactions(&[]).is_empty());
    }
}
