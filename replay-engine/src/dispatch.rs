//! Event-to-action resolution
//!
//! Turns a [`TimelineEvent`] into the collaborator call it stands for, with
//! cell references resolved against the loaded segment:
//!
//! | event | action |
//! |---|---|
//! | `show_cell` | reveal and highlight the cell |
//! | `type_code` | typewriter reveal into the cell input |
//! | `execute_cell` | notebook execute transition with the recorded output |
//! | `audio_start`, `audio_end`, `segment_end`, `showOutput` | none |
//! | `showPrompt`, `showBullet` | none, other surfaces |
//!
//! An explicit cell id always wins over an index.

use crate::timeline::{EventKind, SegmentCell, SegmentData, TimelineEvent};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum EventAction {
    Show {
        cell_id: String,
    },
    Type {
        cell_id: String,
        text: String,
        duration: Duration,
    },
    Execute {
        cell_id: String,
        output: Option<String>,
    },
    /// State-transition markers with nothing to draw
    Bookkeeping(EventKind),
    /// Meant for a terminal or slide surface
    NotApplicable(EventKind),
    Unrecognized(String),
    /// The event names no cell this segment knows
    Unresolved(EventKind),
}

/// Explicit id, else the segment cell at the event's index
fn target<'a>(event: &'a TimelineEvent, segment: &'a SegmentData) -> Option<(String, Option<&'a SegmentCell>)> {
    if let Some(id) = event.cell_id() {
        return Some((id.to_string(), segment.find(id)));
    }
    let cell = segment.cell(event.cell_index()?)?;
    Some((cell.id.clone(), Some(cell)))
}

pub fn resolve_action(
    event: &TimelineEvent,
    segment: &SegmentData,
    default_typing: Duration,
) -> EventAction {
    let kind = event.kind.clone();
    match &event.kind {
        EventKind::ShowCell => match target(event, segment) {
            Some((cell_id, _)) => EventAction::Show { cell_id },
            None => EventAction::Unresolved(kind),
        },
        EventKind::TypeCode => match target(event, segment) {
            Some((cell_id, cell)) => {
                let text = event
                    .text()
                    .map(str::to_string)
                    .or_else(|| cell.and_then(|c| c.content.clone()))
                    .unwrap_or_default();
                let duration = event
                    .duration_ms()
                    .map(Duration::from_millis)
                    .unwrap_or(default_typing);
                EventAction::Type {
                    cell_id,
                    text,
                    duration,
                }
            }
            None => EventAction::Unresolved(kind),
        },
        EventKind::ExecuteCell => match target(event, segment) {
            Some((cell_id, cell)) => {
                let output = event
                    .output()
                    .map(str::to_string)
                    .or_else(|| cell.and_then(|c| c.output.clone()));
                EventAction::Execute { cell_id, output }
            }
            None => EventAction::Unresolved(kind),
        },
        EventKind::AudioStart | EventKind::AudioEnd | EventKind::SegmentEnd | EventKind::ShowOutput => {
            EventAction::Bookkeeping(kind)
        }
        EventKind::ShowPrompt | EventKind::ShowBullet => EventAction::NotApplicable(kind),
        EventKind::Unrecognized(name) => EventAction::Unrecognized(name.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn segment() -> SegmentData {
        SegmentData::new(vec![
            SegmentCell {
                content: Some("import numpy as np".to_string()),
                ..SegmentCell::new("", None)
            },
            SegmentCell::new("plot", Some("<Figure 640x480>")),
        ])
    }

    const DEFAULT: Duration = Duration::from_millis(2000);

    #[test]
    fn test_show_by_index_and_id() {
        let by_index = TimelineEvent::new(0, EventKind::ShowCell, json!({"cellIndex": 0}));
        assert_eq!(
            resolve_action(&by_index, &segment(), DEFAULT),
            EventAction::Show { cell_id: "cell_0".to_string() }
        );

        // Explicit ids are passed through even if the segment lacks them
        let by_id = TimelineEvent::new(0, EventKind::ShowCell, json!({"cellId": "ghost", "cellIndex": 0}));
        assert_eq!(
            resolve_action(&by_id, &segment(), DEFAULT),
            EventAction::Show { cell_id: "ghost".to_string() }
        );
    }

    #[test]
    fn test_type_payload_and_defaults() {
        let seconds = TimelineEvent::new(
            0,
            EventKind::TypeCode,
            json!({"cellIndex": 1, "code": "plt.show()", "duration": 1.5}),
        );
        assert_eq!(
            resolve_action(&seconds, &segment(), DEFAULT),
            EventAction::Type {
                cell_id: "plot".to_string(),
                text: "plt.show()".to_string(),
                duration: Duration::from_millis(1500),
            }
        );

        let bare = TimelineEvent::new(0, EventKind::TypeCode, json!({"cellIndex": 0}));
        assert_eq!(
            resolve_action(&bare, &segment(), DEFAULT),
            EventAction::Type {
                cell_id: "cell_0".to_string(),
                text: "import numpy as np".to_string(),
                duration: DEFAULT,
            }
        );
    }

    #[test]
    fn test_execute_output_lookup() {
        let by_index = TimelineEvent::new(0, EventKind::ExecuteCell, json!({"cellIndex": 1}));
        assert_eq!(
            resolve_action(&by_index, &segment(), DEFAULT),
            EventAction::Execute {
                cell_id: "plot".to_string(),
                output: Some("<Figure 640x480>".to_string()),
            }
        );

        let id_wins = TimelineEvent::new(0, EventKind::ExecuteCell, json!({"cellId": "cell_0", "cellIndex": 1}));
        assert_eq!(
            resolve_action(&id_wins, &segment(), DEFAULT),
            EventAction::Execute { cell_id: "cell_0".to_string(), output: None }
        );
    }

    #[test]
    fn test_unresolvable_and_passive_events() {
        let out_of_range = TimelineEvent::new(0, EventKind::ExecuteCell, json!({"cellIndex": 9}));
        assert_eq!(
            resolve_action(&out_of_range, &segment(), DEFAULT),
            EventAction::Unresolved(EventKind::ExecuteCell)
        );

        let bullet = TimelineEvent::new(0, EventKind::ShowBullet, json!({"text": "Why pandas?"}));
        assert_eq!(
            resolve_action(&bullet, &segment(), DEFAULT),
            EventAction::NotApplicable(EventKind::ShowBullet)
        );

        let end = TimelineEvent::new(0, EventKind::SegmentEnd, json!({}));
        assert_eq!(
            resolve_action(&end, &segment(), DEFAULT),
            EventAction::Bookkeeping(EventKind::SegmentEnd)
        );

        let future = TimelineEvent::new(0, EventKind::from_name("zoom_in"), json!({}));
        assert_eq!(
            resolve_action(&future, &segment(), DEFAULT),
            EventAction::Unrecognized("zoom_in".to_string())
        );
    }
}
