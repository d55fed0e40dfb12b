//! Windowed event synthesis over tracked detections.
//!
//! Frames flow through detection, tracking and a rolling time window. Once
//! the buffered span reaches the window length, the live tracks of the most
//! recent frame are turned into events and the window slides forward by the
//! stride.

use std::collections::VecDeque;

use metrics::counter;
use serde::Serialize;
use tracing::{debug, info};
use vnarrate_models::{Entity, Event, Provenance};

use crate::actions::classify_action;
use crate::config::PipelineConfig;
use crate::decode::FrameSource;
use crate::detection::Detector;
use crate::error::NarrateResult;
use crate::graph::infer_interactions;
use crate::motion::summarize_motion;
use crate::tracker::{Track, TrackId, Tracker};

#[derive(Debug, Clone)]
struct WindowSample {
    frame_index: u64,
    timestamp: f64,
    /// Live track ids after this frame, in creation order
    snapshot: Vec<TrackId>,
}

/// Time and frame span of the buffered samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowBounds {
    pub start: f64,
    pub end: f64,
    pub first_frame: u64,
    pub last_frame: u64,
}

/// Rolling buffer of per-frame snapshots.
#[derive(Debug, Clone)]
pub struct EventWindow {
    window: f64,
    stride: f64,
    samples: VecDeque<WindowSample>,
}

impl EventWindow {
    pub fn new(window: f64, stride: f64) -> Self {
        Self {
            window,
            stride,
            samples: VecDeque::new(),
        }
    }

    /// Append one frame's live-track snapshot.
    pub fn push(&mut self, frame_index: u64, timestamp: f64, snapshot: Vec<TrackId>) {
        self.samples.push_back(WindowSample {
            frame_index,
            timestamp,
            snapshot,
        });
    }

    /// Seconds between the first and last buffered sample.
    pub fn span(&self) -> f64 {
        match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }

    /// True once the buffered span covers the window length.
    pub fn is_full(&self) -> bool {
        !self.samples.is_empty() && self.span() >= self.window
    }

    /// Drop samples from the front while the span is at least one stride.
    ///
    /// With `stride >= window` the buffer is cleared so emitted windows are
    /// disjoint. Otherwise the newest sample always survives.
    pub fn slide(&mut self) {
        if self.stride >= self.window {
            self.samples.clear();
            return;
        }
        while self.samples.len() > 1 && self.span() >= self.stride {
            self.samples.pop_front();
        }
    }

    pub fn bounds(&self) -> Option<WindowBounds> {
        let first = self.samples.front()?;
        let last = self.samples.back()?;
        Some(WindowBounds {
            start: first.timestamp,
            end: last.timestamp,
            first_frame: first.frame_index,
            last_frame: last.frame_index,
        })
    }

    /// Live track ids of the most recent sample.
    pub fn latest_snapshot(&self) -> Option<&[TrackId]> {
        self.samples.back().map(|s| s.snapshot.as_slice())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStats {
    pub frames_processed: u64,
    pub windows_emitted: u64,
    pub subject_events: u64,
    pub interaction_events: u64,
    pub tracks_created: u64,
    /// Media time where the run stopped early because of `max_seconds`
    pub halted_at: Option<f64>,
}

impl RunStats {
    pub fn events_emitted(&self) -> u64 {
        self.subject_events + self.interaction_events
    }
}

/// Output of a full run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub events: Vec<Event>,
    pub stats: RunStats,
}

/// Frame-by-frame event synthesis.
pub struct NarrativePipeline {
    config: PipelineConfig,
    tracker: Tracker,
    window: EventWindow,
    detector_name: String,
    stats: RunStats,
    /// Samples were pushed since the last emission
    unemitted: bool,
    halted: bool,
}

impl NarrativePipeline {
    /// Create a pipeline. `detector_name` is recorded in provenance.
    pub fn new(config: PipelineConfig, detector_name: impl Into<String>) -> Self {
        let tracker = Tracker::new(config.tracker_config());
        let window = EventWindow::new(config.window, config.stride);
        Self {
            config,
            tracker,
            window,
            detector_name: detector_name.into(),
            stats: RunStats::default(),
            unemitted: false,
            halted: false,
        }
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn window(&self) -> &EventWindow {
        &self.window
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// True if a frame at `timestamp` lies past `max_seconds`.
    pub fn exceeds_limit(&self, timestamp: f64) -> bool {
        self.config.max_seconds.is_some_and(|max| timestamp > max)
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Feed one frame's detections and return any events it completes.
    ///
    /// Frames past `max_seconds` halt the pipeline; later frames are ignored.
    pub fn process_frame(&mut self, frame_index: u64, timestamp: f64, detections: &[Entity]) -> Vec<Event> {
        if self.halted {
            return Vec::new();
        }
        if self.exceeds_limit(timestamp) {
            self.halt(timestamp);
            return Vec::new();
        }

        let kept: Vec<Entity> = detections
            .iter()
            .filter(|d| self.config.allows_label(&d.label))
            .cloned()
            .collect();

        let snapshot: Vec<TrackId> = self
            .tracker
            .step(frame_index, timestamp, &kept)
            .iter()
            .map(|t| t.id())
            .collect();

        self.window.push(frame_index, timestamp, snapshot);
        self.unemitted = true;
        self.stats.frames_processed += 1;
        counter!("vnarrate_frames_processed_total").increment(1);

        if !self.window.is_full() {
            return Vec::new();
        }

        let events = self.emit();
        self.window.slide();
        events
    }

    /// End of stream. Emits the trailing partial window only when
    /// `flush_partial_window` is set.
    pub fn finish(&mut self) -> Vec<Event> {
        self.stats.tracks_created = self.tracker.created_count();

        if !self.config.flush_partial_window || !self.unemitted || self.window.is_empty() {
            if !self.window.is_empty() && self.unemitted {
                debug!(samples = self.window.len(), span = self.window.span(), "Dropping partial window");
            }
            return Vec::new();
        }

        self.emit()
    }

    fn halt(&mut self, timestamp: f64) {
        self.halted = true;
        self.stats.halted_at = Some(timestamp);
        info!(
            timestamp,
            max_seconds = ?self.config.max_seconds,
            "Reached max_seconds, stopping"
        );
    }

    /// Events for the current window, built from the latest snapshot.
    fn emit(&mut self) -> Vec<Event> {
        let (Some(bounds), Some(snapshot)) = (self.window.bounds(), self.window.latest_snapshot()) else {
            return Vec::new();
        };

        // The snapshot comes from the same `step` call, so every id resolves.
        let tracks: Vec<&Track> = snapshot.iter().filter_map(|&id| self.tracker.get(id)).collect();

        let provenance = Provenance::for_detector(bounds.first_frame, bounds.last_frame, self.detector_name.as_str());
        let mut events = Vec::with_capacity(tracks.len());

        for track in &tracks {
            let motion = summarize_motion(track);
            let action = classify_action(track.label(), &motion);
            events.push(
                Event::new(bounds.start, bounds.end)
                    .with_subject(track.to_entity())
                    .with_motion(motion.into())
                    .with_action(action)
                    .with_provenance(provenance.clone()),
            );
        }
        let subject_count = events.len();

        for (a, b, interaction) in infer_interactions(&tracks) {
            let (Some(subject), Some(object)) = (self.tracker.get(a), self.tracker.get(b)) else {
                continue;
            };
            events.push(
                Event::new(bounds.start, bounds.end)
                    .with_subject(subject.to_entity())
                    .with_object(object.to_entity())
                    .with_interaction(interaction)
                    .with_provenance(provenance.clone()),
            );
        }
        let interaction_count = events.len() - subject_count;

        debug!(
            start = bounds.start,
            end = bounds.end,
            first_frame = bounds.first_frame,
            last_frame = bounds.last_frame,
            subjects = subject_count,
            interactions = interaction_count,
            "Window emitted"
        );

        counter!("vnarrate_events_emitted_total", "kind" => "subject").increment(subject_count as u64);
        counter!("vnarrate_events_emitted_total", "kind" => "interaction").increment(interaction_count as u64);

        self.stats.windows_emitted += 1;
        self.stats.subject_events += subject_count as u64;
        self.stats.interaction_events += interaction_count as u64;
        self.unemitted = false;

        events
    }
}

/// Drive a pipeline over every frame of `source`.
///
/// Frames are consumed one at a time; detection, tracking and emission for
/// a frame finish before the next frame is requested.
pub async fn run(
    config: &PipelineConfig,
    source: &mut dyn FrameSource,
    detector: &dyn Detector,
) -> NarrateResult<RunOutput> {
    config.validate()?;

    info!(
        source = source.name(),
        detector = detector.name(),
        uses_ai = detector.uses_ai(),
        fps = config.fps,
        window = config.window,
        stride = config.stride,
        "Starting narration run"
    );

    let mut pipeline = NarrativePipeline::new(config.clone(), detector.name());
    let mut events = Vec::new();

    while let Some(frame) = source.next_frame().await {
        if pipeline.exceeds_limit(frame.timestamp) {
            pipeline.halt(frame.timestamp);
            break;
        }

        let detections = detector.infer(&frame, config.min_det_conf);
        events.extend(pipeline.process_frame(frame.index, frame.timestamp, &detections));
    }
    events.extend(pipeline.finish());

    let stats = pipeline.stats().clone();
    info!(
        frames = stats.frames_processed,
        windows = stats.windows_emitted,
        events = stats.events_emitted(),
        tracks = stats.tracks_created,
        "Narration run finished"
    );

    Ok(RunOutput { events, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{Frame, IterFrameSource};
    use crate::detection::MockDetector;
    use vnarrate_models::{BBox, Direction, InteractionKind};

    fn person(x: f64) -> Entity {
        Entity::new(0, "person", BBox::new(x, 100.0, 40.0, 80.0), 0.9)
    }

    fn car(x: f64) -> Entity {
        Entity::new(0, "car", BBox::new(x, 100.0, 80.0, 60.0), 0.8)
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            window: 2.5,
            stride: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_window_full_and_slide() {
        let mut window = EventWindow::new(2.5, 1.0);
        for i in 0..3u64 {
            window.push(i, i as f64, vec![]);
            assert!(!window.is_full());
        }
        window.push(3, 3.0, vec![]);
        assert!(window.is_full());

        window.slide();
        assert!(window.span() < 1.0);
        assert_eq!(window.len(), 1);
        assert_eq!(window.bounds().unwrap().first_frame, 3);
    }

    #[test]
    fn test_slide_keeps_overlap() {
        let mut window = EventWindow::new(2.0, 0.5);
        for i in 0..=8u64 {
            window.push(i, i as f64 * 0.25, vec![]);
        }
        window.slide();
        // Span 2.0 -> pop until < 0.5: samples at 1.75 and 2.0 remain.
        assert_eq!(window.len(), 2);
        assert!((window.bounds().unwrap().start - 1.75).abs() < 1e-9);
    }

    #[test]
    fn test_slide_stride_ge_window_is_disjoint() {
        let mut window = EventWindow::new(1.0, 2.0);
        for i in 0..=2u64 {
            window.push(i, i as f64 * 0.5, vec![]);
        }
        assert!(window.is_full());
        window.slide();
        assert!(window.is_empty());

        let mut pipeline = NarrativePipeline::new(
            PipelineConfig {
                window: 1.0,
                stride: 2.0,
                ..Default::default()
            },
            "mock",
        );
        let mut events = Vec::new();
        for i in 0..=8u64 {
            events.extend(pipeline.process_frame(i, i as f64 * 0.5, &[person(100.0)]));
        }

        let spans: Vec<(f64, f64)> = events.iter().map(|e| (e.start, e.end)).collect();
        assert_eq!(spans, vec![(0.0, 1.0), (1.5, 2.5), (3.0, 4.0)]);
        for pair in spans.windows(2) {
            assert!(pair[1].0 > pair[0].1, "windows overlap: {:?} then {:?}", pair[0], pair[1]);
        }
        assert_eq!(pipeline.stats().windows_emitted, 3);
    }

    #[test]
    fn test_slide_equal_stride_and_window() {
        let mut window = EventWindow::new(1.0, 1.0);
        window.push(0, 0.0, vec![]);
        window.push(1, 1.0, vec![]);
        window.slide();
        assert!(window.is_empty());
    }

    #[test]
    fn test_first_emission_uses_latest_snapshot_only() {
        let mut pipeline = NarrativePipeline::new(
            PipelineConfig {
                max_age: 0,
                ..config()
            },
            "mock",
        );

        // A car seen only at t=0 retires before the window fills.
        assert!(pipeline.process_frame(0, 0.0, &[person(100.0), car(600.0)]).is_empty());
        assert!(pipeline.process_frame(1, 1.0, &[person(105.0)]).is_empty());
        assert!(pipeline.process_frame(2, 2.0, &[person(110.0)]).is_empty());

        let events = pipeline.process_frame(3, 3.0, &[person(115.0)]);
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.subjects[0].label, "person");
        assert_eq!(event.subjects[0].id, 1);
        assert_eq!((event.start, event.end), (0.0, 3.0));
        assert_eq!(event.provenance.as_ref().unwrap().frames, (0, 3));
        assert_eq!(
            event.provenance.as_ref().unwrap().models.get("detector").map(String::as_str),
            Some("mock")
        );
        assert_eq!(event.motion.unwrap().direction, Direction::East);
        assert_eq!(event.action.as_ref().unwrap().label, "walking");

        assert!(pipeline.window().span() < 1.0);
    }

    #[test]
    fn test_interaction_events_follow_subjects() {
        let mut pipeline = NarrativePipeline::new(config(), "mock");
        let mut events = Vec::new();
        for i in 0..4u64 {
            events.extend(pipeline.process_frame(i, i as f64, &[person(100.0), car(130.0)]));
        }

        assert_eq!(events.len(), 3);
        assert!(events[0].interaction.is_none() && events[1].interaction.is_none());

        let pair = &events[2];
        assert_eq!(pair.subjects[0].label, "person");
        assert_eq!(pair.objects[0].label, "car");
        assert_eq!(pair.interaction.unwrap().kind, InteractionKind::YieldingPassing);
        assert!(pair.motion.is_none() && pair.action.is_none());
        assert_eq!(pipeline.stats().interaction_events, 1);
    }

    #[test]
    fn test_label_filter_drops_detections() {
        let allowed = crate::config::parse_label_list("car");
        let mut pipeline = NarrativePipeline::new(
            PipelineConfig {
                allowed_labels: allowed,
                ..config()
            },
            "mock",
        );
        for i in 0..4u64 {
            pipeline.process_frame(i, i as f64, &[person(100.0), car(400.0)]);
        }
        assert_eq!(pipeline.tracker().len(), 1);
        assert_eq!(pipeline.tracker().get(1).unwrap().label(), "car");
    }

    #[test]
    fn test_max_seconds_halts() {
        let mut pipeline = NarrativePipeline::new(
            PipelineConfig {
                max_seconds: Some(1.0),
                ..config()
            },
            "mock",
        );
        pipeline.process_frame(0, 0.0, &[person(100.0)]);
        pipeline.process_frame(1, 1.0, &[person(100.0)]);
        pipeline.process_frame(2, 1.5, &[person(100.0)]);
        pipeline.process_frame(3, 0.5, &[person(100.0)]);

        assert!(pipeline.is_halted());
        assert_eq!(pipeline.stats().frames_processed, 2);
        assert_eq!(pipeline.stats().halted_at, Some(1.5));
    }

    #[test]
    fn test_partial_window_dropped_by_default() {
        let mut pipeline = NarrativePipeline::new(config(), "mock");
        pipeline.process_frame(0, 0.0, &[person(100.0)]);
        pipeline.process_frame(1, 1.0, &[person(100.0)]);
        assert!(pipeline.finish().is_empty());
    }

    #[test]
    fn test_flush_partial_window() {
        let mut pipeline = NarrativePipeline::new(
            PipelineConfig {
                flush_partial_window: true,
                ..config()
            },
            "mock",
        );
        pipeline.process_frame(0, 0.0, &[person(100.0)]);
        pipeline.process_frame(1, 1.0, &[person(100.0)]);

        let events = pipeline.finish();
        assert_eq!(events.len(), 1);
        assert_eq!((events[0].start, events[0].end), (0.0, 1.0));
        assert_eq!(events[0].action.as_ref().unwrap().label, "standing");
    }

    #[test]
    fn test_flush_skips_already_emitted_window() {
        let mut pipeline = NarrativePipeline::new(
            PipelineConfig {
                flush_partial_window: true,
                ..config()
            },
            "mock",
        );
        for i in 0..4u64 {
            pipeline.process_frame(i, i as f64, &[person(100.0)]);
        }
        assert_eq!(pipeline.stats().windows_emitted, 1);
        assert!(pipeline.finish().is_empty());
    }

    #[tokio::test]
    async fn test_run_with_no_frames() {
        let mut source = IterFrameSource::from_frames(Vec::new());
        let output = run(&config(), &mut source, &MockDetector::new()).await.unwrap();
        assert!(output.events.is_empty());
        assert_eq!(output.stats, RunStats::default());
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_config() {
        let mut source = IterFrameSource::from_frames(vec![Frame::without_image(0, 0.0)]);
        let bad = PipelineConfig {
            stride: 0.0,
            ..config()
        };
        assert!(run(&bad, &mut source, &MockDetector::new()).await.is_err());
    }
}
