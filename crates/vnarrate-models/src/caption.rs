//! Caption lines and aggregate summaries.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One subtitle cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionLine {
    pub t_start: f64,
    pub t_end: f64,
    pub text: String,
    pub confidence: f64,
}

/// Occurrence count of one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

/// Label-frequency summary for one scene.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct SceneSummary {
    /// Most frequent labels, descending by count
    pub entities: Vec<LabelCount>,
    pub events_count: usize,
}

/// Contents of the summary artifact.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Summary {
    pub scenes: Vec<SceneSummary>,
}
