//! Natural-language captions and label summaries.

use vnarrate_models::{CaptionLine, Event, LabelCount, SceneSummary, Summary};

/// Labels listed in a scene summary.
pub const SUMMARY_TOP_LABELS: usize = 5;

/// Caption text for an event.
///
/// A non-empty attached caption is returned as is. Otherwise the text is
/// composed from the first subject, its action and heading, and the first
/// object.
pub fn caption_from_event(event: &Event) -> String {
    if let Some(caption) = event.caption.as_deref().filter(|c| !c.is_empty()) {
        return caption.to_string();
    }

    let subject = event.subjects.first();
    let object = event.objects.first();
    let mut parts: Vec<String> = Vec::new();

    if let Some(subject) = subject {
        let verb = event.action.as_ref().map_or("moves", |a| a.label.as_str());
        match event.motion.filter(|m| !m.direction.is_stationary()) {
            Some(motion) => parts.push(format!(
                "a {} {} towards the {}",
                subject.label,
                verb,
                motion.direction.phrase()
            )),
            None => parts.push(format!("a {} {}", subject.label, verb)),
        }
    }

    if let Some(object) = object {
        if subject.is_some() {
            parts.push(format!("near a {}", object.label));
        } else {
            parts.push(format!("a {} is visible", object.label));
        }
    }

    if parts.is_empty() {
        parts.push("A scene unfolds".to_string());
    }

    format!("{}.", parts.join(" "))
}

/// One caption line per event, in event order.
pub fn compose_captions(events: &[Event]) -> Vec<CaptionLine> {
    events
        .iter()
        .map(|event| CaptionLine {
            t_start: event.start,
            t_end: event.end,
            text: caption_from_event(event),
            confidence: 1.0,
        })
        .collect()
}

/// Most frequent subject and object labels across `events`.
///
/// Ties keep first-seen order.
pub fn summarize_events(events: &[Event]) -> SceneSummary {
    let mut counts: Vec<LabelCount> = Vec::new();
    for label in events.iter().flat_map(Event::labels) {
        match counts.iter_mut().find(|c| c.label == label) {
            Some(entry) => entry.count += 1,
            None => counts.push(LabelCount {
                label: label.to_string(),
                count: 1,
            }),
        }
    }

    // Stable sort keeps first-seen order among equal counts.
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(SUMMARY_TOP_LABELS);

    SceneSummary {
        entities: counts,
        events_count: events.len(),
    }
}

/// Summary artifact: a single scene covering every event.
pub fn build_summary(events: &[Event]) -> Summary {
    Summary {
        scenes: vec![summarize_events(events)],
    }
}
