//! Timestamped narrative events and the hypotheses they carry.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entity::Entity;

/// Coarse compass direction in screen coordinates (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum Direction {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "S")]
    South,
    #[serde(rename = "E")]
    East,
    #[serde(rename = "W")]
    West,
    #[serde(rename = "N->E")]
    NorthEast,
    #[serde(rename = "N->W")]
    NorthWest,
    #[serde(rename = "S->E")]
    SouthEast,
    #[serde(rename = "S->W")]
    SouthWest,
    #[default]
    #[serde(rename = "stationary")]
    Stationary,
}

impl Direction {
    /// All directions, cardinal first.
    pub const ALL: &'static [Direction] = &[
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
        Direction::NorthEast,
        Direction::NorthWest,
        Direction::SouthEast,
        Direction::SouthWest,
        Direction::Stationary,
    ];

    /// Wire form, e.g. `"S->E"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::North => "N",
            Direction::South => "S",
            Direction::East => "E",
            Direction::West => "W",
            Direction::NorthEast => "N->E",
            Direction::NorthWest => "N->W",
            Direction::SouthEast => "S->E",
            Direction::SouthWest => "S->W",
            Direction::Stationary => "stationary",
        }
    }

    /// Phrase used in captions ("northeast", "in place", ...).
    pub fn phrase(&self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
            Direction::NorthEast => "northeast",
            Direction::NorthWest => "northwest",
            Direction::SouthEast => "southeast",
            Direction::SouthWest => "southwest",
            Direction::Stationary => "in place",
        }
    }

    pub fn is_stationary(&self) -> bool {
        matches!(self, Direction::Stationary)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Motion summary of one track over its recent history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Motion {
    pub direction: Direction,
    /// Pixels per second
    pub speed: f64,
    /// Change in speed per second
    pub accel: f64,
}

/// Action hypothesis for a single subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Action {
    pub label: String,
    pub confidence: f64,
    pub source_model: Option<String>,
}

/// Kind of pairwise relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum InteractionKind {
    #[serde(rename = "nearby")]
    Nearby,
    #[serde(rename = "yielding/passing")]
    YieldingPassing,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Nearby => "nearby",
            InteractionKind::YieldingPassing => "yielding/passing",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pairwise interaction hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: InteractionKind,
    pub confidence: f64,
}

/// Which frames and models produced an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Provenance {
    /// Inclusive frame index range `[first, last]`
    pub frames: (u64, u64),
    /// Role (e.g. `"detector"`) to backend name
    #[serde(default)]
    pub models: BTreeMap<String, String>,
}

impl Provenance {
    /// Provenance for a frame span produced by the named detector backend.
    pub fn for_detector(first_frame: u64, last_frame: u64, detector: impl Into<String>) -> Self {
        let mut models = BTreeMap::new();
        models.insert("detector".to_string(), detector.into());
        Self {
            frames: (first_frame, last_frame),
            models,
        }
    }
}

/// Unit of pipeline output.
///
/// Spans `[start, end)` in seconds. Subject-only events carry motion and
/// action; subject+object events carry an interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Event {
    pub start: f64,
    pub end: f64,
    pub subjects: Vec<Entity>,
    #[serde(default)]
    pub objects: Vec<Entity>,
    pub action: Option<Action>,
    pub interaction: Option<Interaction>,
    pub motion: Option<Motion>,
    pub provenance: Option<Provenance>,
    pub caption: Option<String>,
}

impl Event {
    /// Event with no entities and no hypotheses.
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            subjects: Vec::new(),
            objects: Vec::new(),
            action: None,
            interaction: None,
            motion: None,
            provenance: None,
            caption: None,
        }
    }

    pub fn with_subject(mut self, subject: Entity) -> Self {
        self.subjects.push(subject);
        self
    }

    pub fn with_object(mut self, object: Entity) -> Self {
        self.objects.push(object);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_motion(mut self, motion: Motion) -> Self {
        self.motion = Some(motion);
        self
    }

    pub fn with_interaction(mut self, interaction: Interaction) -> Self {
        self.interaction = Some(interaction);
        self
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Subject and object labels, subjects first.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.subjects
            .iter()
            .chain(self.objects.iter())
            .map(|e| e.label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;

    #[test]
    fn test_direction_wire_names() {
        assert_eq!(serde_json::to_string(&Direction::SouthEast).unwrap(), "\"S->E\"");
        assert_eq!(
            serde_json::to_string(&Direction::Stationary).unwrap(),
            "\"stationary\""
        );
        for d in Direction::ALL {
            let parsed: Direction =
                serde_json::from_str(&format!("\"{}\"", d.as_str())).unwrap();
            assert_eq!(parsed, *d);
        }
    }

    #[test]
    fn test_interaction_type_field() {
        let i = Interaction {
            kind: InteractionKind::YieldingPassing,
            confidence: 0.6,
        };
        let json = serde_json::to_value(i).unwrap();
        assert_eq!(json["type"], "yielding/passing");
    }

    #[test]
    fn test_event_json_has_all_fields() {
        let ev = Event::new(0.0, 2.5)
            .with_subject(Entity::new(1, "person", BBox::new(0.0, 0.0, 1.0, 1.0), 0.9))
            .with_provenance(Provenance::for_detector(0, 20, "mock"));
        let json = serde_json::to_value(&ev).unwrap();
        let obj = json.as_object().unwrap();
        for key in [
            "start",
            "end",
            "subjects",
            "objects",
            "action",
            "interaction",
            "motion",
            "provenance",
            "caption",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(obj.len(), 9);
        assert!(json["action"].is_null());
        assert_eq!(json["provenance"]["frames"], serde_json::json!([0, 20]));
        assert_eq!(json["provenance"]["models"]["detector"], "mock");
    }

    #[test]
    fn test_event_labels_order() {
        let ev = Event::new(0.0, 1.0)
            .with_subject(Entity::new(1, "person", BBox::new(0.0, 0.0, 1.0, 1.0), 1.0))
            .with_object(Entity::new(2, "car", BBox::new(0.0, 0.0, 1.0, 1.0), 1.0));
        let labels: Vec<&str> = ev.labels().collect();
        assert_eq!(labels, vec!["person", "car"]);
    }
}
