//! IoU-based tracker for maintaining object identity across frames.
//!
//! Each detection is matched against live tracks of the same label by
//! Intersection over Union. Unmatched detections open new tracks with fresh
//! ids; tracks unmatched for more than `max_age` frames retire.
//!
//! Retired tracks stay in the identity table for the rest of the run unless
//! `evict_retired` is set. Ids are never reused either way.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vnarrate_models::{BBox, Entity};

use crate::geometry::iou;

/// Persistent track identifier. Starts at 1 and only grows.
pub type TrackId = u64;

/// How detections in one frame compete for tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchingMode {
    /// Every detection picks its best track on its own; two detections may
    /// pick the same track and the later one wins.
    #[default]
    Independent,
    /// Greedy one-to-one: a matched track leaves the pool for the rest of
    /// the frame.
    Exclusive,
}

impl MatchingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchingMode::Independent => "independent",
            MatchingMode::Exclusive => "exclusive",
        }
    }
}

impl fmt::Display for MatchingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MatchingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "independent" => Ok(MatchingMode::Independent),
            "exclusive" | "greedy" => Ok(MatchingMode::Exclusive),
            _ => Err(format!("Unknown matching mode: {}", s)),
        }
    }
}

/// Tracker settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    /// Minimum IoU (exclusive) for a detection to match a track
    pub iou_threshold: f64,
    /// Frames a track may go unmatched before it retires
    pub max_age: u64,
    pub matching: MatchingMode,
    /// Remove retired tracks from the identity table
    pub evict_retired: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.3,
            max_age: 30,
            matching: MatchingMode::Independent,
            evict_retired: false,
        }
    }
}

/// One observation in a track's history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryPoint {
    pub frame_index: u64,
    pub timestamp: f64,
    pub bbox: BBox,
}

/// A persistent identity.
#[derive(Debug, Clone)]
pub struct Track {
    id: TrackId,
    label: String,
    bbox: BBox,
    score: f64,
    history: Vec<HistoryPoint>,
    alive: bool,
}

impl Track {
    fn new(id: TrackId, label: String, bbox: BBox, score: f64) -> Self {
        Self {
            id,
            label,
            bbox,
            score,
            history: Vec::new(),
            alive: true,
        }
    }

    /// Build a track from an explicit history, e.g. for analysis outside a
    /// tracker run. Current bbox is the last history entry.
    pub fn from_history(
        id: TrackId,
        label: impl Into<String>,
        score: f64,
        history: Vec<HistoryPoint>,
    ) -> Self {
        let bbox = history
            .last()
            .map(|p| p.bbox)
            .unwrap_or(BBox::new(0.0, 0.0, 0.0, 0.0));
        Self {
            id,
            label: label.into(),
            bbox,
            score,
            history,
            alive: true,
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn bbox(&self) -> &BBox {
        &self.bbox
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn history(&self) -> &[HistoryPoint] {
        &self.history
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Snapshot of the current state as an event entity.
    pub fn to_entity(&self) -> Entity {
        Entity::new(self.id, self.label.clone(), self.bbox, self.score)
    }

    fn update(&mut self, frame_index: u64, timestamp: f64, bbox: BBox, score: f64) {
        self.bbox = bbox;
        self.score = score;

        let point = HistoryPoint {
            frame_index,
            timestamp,
            bbox,
        };
        // A second match in the same frame overwrites that frame's entry so
        // history stays strictly increasing.
        match self.history.last_mut() {
            Some(last) if last.frame_index == frame_index => *last = point,
            _ => self.history.push(point),
        }
    }
}

/// IoU tracker owning the identity table.
pub struct Tracker {
    config: TrackerConfig,
    /// Identity table; ids are monotonic so key order is creation order
    tracks: BTreeMap<TrackId, Track>,
    /// Live track id -> last matched frame index
    last_seen: HashMap<TrackId, u64>,
    next_id: TrackId,
    evicted: usize,
}

impl Tracker {
    /// Create a new tracker.
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: BTreeMap::new(),
            last_seen: HashMap::new(),
            next_id: 1,
            evicted: 0,
        }
    }

    /// Process one frame of detections and return the live tracks.
    ///
    /// Matching is evaluated against the state before this frame; tracks
    /// opened in this frame are not candidates for other detections in the
    /// same frame.
    pub fn step(&mut self, frame_index: u64, timestamp: f64, detections: &[Entity]) -> Vec<&Track> {
        let assigned = self.assign(detections);

        // Update matched tracks in detection order; the last update wins.
        for (det, track_id) in detections.iter().zip(&assigned) {
            let Some(track_id) = track_id else {
                continue;
            };
            if let Some(track) = self.tracks.get_mut(track_id) {
                track.update(frame_index, timestamp, det.bbox, det.score);
                self.last_seen.insert(*track_id, frame_index);
            }
        }

        // Open tracks for unmatched detections.
        for (det, track_id) in detections.iter().zip(&assigned) {
            if track_id.is_some() {
                continue;
            }
            let id = self.next_id;
            self.next_id += 1;

            let mut track = Track::new(id, det.label.clone(), det.bbox, det.score);
            track.update(frame_index, timestamp, det.bbox, det.score);
            self.tracks.insert(id, track);
            self.last_seen.insert(id, frame_index);
            counter!("vnarrate_tracks_created_total").increment(1);
        }

        self.retire_stale(frame_index);

        self.live_tracks()
    }

    /// Best-matching live track per detection.
    fn assign(&self, detections: &[Entity]) -> Vec<Option<TrackId>> {
        let mut claimed: HashSet<TrackId> = HashSet::new();
        let mut assigned = Vec::with_capacity(detections.len());

        for det in detections {
            let mut best_iou = 0.0;
            let mut best_track: Option<TrackId> = None;

            for track in self.tracks.values() {
                if !track.alive || track.label != det.label {
                    continue;
                }
                if self.config.matching == MatchingMode::Exclusive && claimed.contains(&track.id) {
                    continue;
                }
                let overlap = iou(&track.bbox, &det.bbox);
                if overlap > self.config.iou_threshold && overlap > best_iou {
                    best_iou = overlap;
                    best_track = Some(track.id);
                }
            }

            if let Some(track_id) = best_track {
                claimed.insert(track_id);
            }
            assigned.push(best_track);
        }

        assigned
    }

    fn retire_stale(&mut self, frame_index: u64) {
        let max_age = self.config.max_age;
        let stale: Vec<TrackId> = self
            .last_seen
            .iter()
            .filter(|&(_, &last)| frame_index.saturating_sub(last) > max_age)
            .map(|(&id, _)| id)
            .collect();

        for id in stale {
            self.last_seen.remove(&id);
            if self.config.evict_retired {
                self.tracks.remove(&id);
                self.evicted += 1;
            } else if let Some(track) = self.tracks.get_mut(&id) {
                track.alive = false;
            }
            debug!(track_id = id, frame_index, "Track retired");
        }
    }

    /// Live tracks in creation order.
    pub fn live_tracks(&self) -> Vec<&Track> {
        self.tracks.values().filter(|t| t.alive).collect()
    }

    /// Look up any track still held in the identity table.
    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    /// Every track in the identity table, retired ones included.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    /// Number of tracks in the identity table.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Get the number of live tracks.
    pub fn live_count(&self) -> usize {
        self.last_seen.len()
    }

    /// Number of tracks that have retired, evicted or not.
    pub fn retired_count(&self) -> usize {
        self.tracks.values().filter(|t| !t.alive).count() + self.evicted
    }

    /// Total ids handed out so far.
    pub fn created_count(&self) -> u64 {
        self.next_id - 1
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: &str, x: f64, y: f64) -> Entity {
        Entity::new(0, label, BBox::new(x, y, 50.0, 50.0), 0.9)
    }

    fn live_ids(tracks: &[&Track]) -> Vec<TrackId> {
        tracks.iter().map(|t| t.id()).collect()
    }

    #[test]
    fn test_tracker_new_detections() {
        let mut tracker = Tracker::default();
        let tracks = tracker.step(0, 0.0, &[det("person", 100.0, 100.0), det("car", 300.0, 300.0)]);
        assert_eq!(live_ids(&tracks), vec![1, 2]);
        assert_eq!(tracks[0].label(), "person");
        assert_eq!(tracks[1].label(), "car");
    }

    #[test]
    fn test_tracker_matching_keeps_identity() {
        let mut tracker = Tracker::default();
        tracker.step(0, 0.0, &[det("person", 100.0, 100.0)]);
        let tracks = tracker.step(1, 0.125, &[det("person", 105.0, 105.0)]);
        assert_eq!(live_ids(&tracks), vec![1]);
        assert_eq!(tracks[0].bbox().x, 105.0);
        assert_eq!(tracks[0].history().len(), 2);
    }

    #[test]
    fn test_tracker_label_mismatch_opens_new_track() {
        let mut tracker = Tracker::default();
        tracker.step(0, 0.0, &[det("person", 100.0, 100.0)]);
        let tracks = tracker.step(1, 0.125, &[det("dog", 100.0, 100.0)]);
        assert_eq!(live_ids(&tracks), vec![1, 2]);
        assert_eq!(tracker.get(1).unwrap().history().len(), 1);
    }

    #[test]
    fn test_track_ids_strictly_increasing() {
        let mut tracker = Tracker::new(TrackerConfig {
            max_age: 0,
            ..Default::default()
        });
        let mut seen = Vec::new();
        for frame in 0..10u64 {
            // Far apart every frame, so every detection opens a track.
            let x = frame as f64 * 1000.0;
            let tracks = tracker.step(frame, frame as f64, &[det("person", x, 0.0), det("car", x, 500.0)]);
            for t in tracks {
                if !seen.contains(&t.id()) {
                    seen.push(t.id());
                }
            }
        }
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(tracker.created_count(), 20);
    }

    #[test]
    fn test_history_length_matches_matched_frames() {
        let mut tracker = Tracker::default();
        for frame in 0..12u64 {
            tracker.step(frame, frame as f64 * 0.125, &[det("person", 100.0 + frame as f64, 100.0)]);
        }
        let track = tracker.get(1).unwrap();
        assert_eq!(track.history().len(), 12);
        assert!(track
            .history()
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp && w[0].frame_index < w[1].frame_index));
    }

    #[test]
    fn test_tracker_gap_handling() {
        let mut tracker = Tracker::new(TrackerConfig {
            max_age: 2,
            ..Default::default()
        });
        tracker.step(0, 0.0, &[det("person", 100.0, 100.0)]);

        assert_eq!(tracker.step(1, 1.0, &[]).len(), 1);
        assert_eq!(tracker.step(2, 2.0, &[]).len(), 1);
        // 3 - 0 > 2
        assert!(tracker.step(3, 3.0, &[]).is_empty());

        // Same box again: the retired track is not revived.
        let tracks = tracker.step(4, 4.0, &[det("person", 100.0, 100.0)]);
        assert_eq!(live_ids(&tracks), vec![2]);
        assert!(!tracker.get(1).unwrap().is_alive());
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.retired_count(), 1);
    }

    #[test]
    fn test_evict_retired_drops_table_entry() {
        let mut tracker = Tracker::new(TrackerConfig {
            max_age: 0,
            evict_retired: true,
            ..Default::default()
        });
        tracker.step(0, 0.0, &[det("person", 100.0, 100.0)]);
        tracker.step(1, 1.0, &[]);
        assert!(tracker.get(1).is_none());
        assert_eq!(tracker.retired_count(), 1);

        let tracks = tracker.step(2, 2.0, &[det("person", 100.0, 100.0)]);
        assert_eq!(live_ids(&tracks), vec![2]);
    }

    #[test]
    fn test_independent_matching_allows_shared_track() {
        let mut tracker = Tracker::default();
        tracker.step(0, 0.0, &[det("person", 100.0, 100.0)]);

        let tracks = tracker.step(1, 1.0, &[det("person", 102.0, 100.0), det("person", 98.0, 100.0)]);
        // Both detections land on track 1; the later one wins.
        assert_eq!(live_ids(&tracks), vec![1]);
        let track = tracker.get(1).unwrap();
        assert_eq!(track.bbox().x, 98.0);
        assert_eq!(track.history().len(), 2);
    }

    #[test]
    fn test_exclusive_matching_opens_second_track() {
        let mut tracker = Tracker::new(TrackerConfig {
            matching: MatchingMode::Exclusive,
            ..Default::default()
        });
        tracker.step(0, 0.0, &[det("person", 100.0, 100.0)]);

        let tracks = tracker.step(1, 1.0, &[det("person", 102.0, 100.0), det("person", 98.0, 100.0)]);
        assert_eq!(live_ids(&tracks), vec![1, 2]);
        assert_eq!(tracker.get(1).unwrap().bbox().x, 102.0);
    }

    #[test]
    fn test_best_iou_wins_and_ties_go_to_first() {
        let mut tracker = Tracker::default();
        tracker.step(0, 0.0, &[det("person", 100.0, 100.0), det("person", 120.0, 100.0)]);

        // Equidistant from both tracks: first in table order wins.
        tracker.step(1, 1.0, &[det("person", 110.0, 100.0)]);
        assert_eq!(tracker.get(1).unwrap().history().len(), 2);
        assert_eq!(tracker.get(2).unwrap().history().len(), 1);

        // Closer to track 2.
        tracker.step(2, 2.0, &[det("person", 121.0, 100.0)]);
        assert_eq!(tracker.get(2).unwrap().history().len(), 2);
    }

    #[test]
    fn test_empty_frames_are_valid() {
        let mut tracker = Tracker::default();
        assert!(tracker.step(0, 0.0, &[]).is_empty());
        assert!(tracker.is_empty());
        assert_eq!(tracker.live_count(), 0);
    }
}
