//! Detector entities.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::bbox::BBox;

/// One labeled, scored box.
///
/// Detectors emit entities with a frame-local `id`; inside events the `id`
/// carries the persistent track id instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Entity {
    pub id: u64,
    pub label: String,
    pub bbox: BBox,
    #[serde(default = "default_score")]
    pub score: f64,
    /// Segmentation mask, reserved (always null in output)
    #[serde(default)]
    pub mask: Option<serde_json::Value>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

fn default_score() -> f64 {
    1.0
}

impl Entity {
    /// Create an entity with no mask and no attributes.
    pub fn new(id: u64, label: impl Into<String>, bbox: BBox, score: f64) -> Self {
        Self {
            id,
            label: label.into(),
            bbox,
            score,
            mask: None,
            attributes: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_json_shape() {
        let e = Entity::new(3, "person", BBox::new(0.0, 0.0, 10.0, 20.0), 0.8);
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["label"], "person");
        assert!(json["mask"].is_null());
        assert!(json["attributes"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_entity_deserialize_defaults() {
        let e: Entity = serde_json::from_str(
            r#"{"id": 1, "label": "car", "bbox": {"x": 1, "y": 2, "w": 3, "h": 4}}"#,
        )
        .unwrap();
        assert_eq!(e.score, 1.0);
        assert!(e.attributes.is_empty());
    }
}
