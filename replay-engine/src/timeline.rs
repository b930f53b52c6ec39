//! Timeline and segment data model
//!
//! A [`Timeline`] is the scripted event list for one segment plus its total
//! duration. Two wire formats are accepted:
//!
//! ```json
//! { "total_duration_ms": 2000,
//!   "events": [ { "time_ms": 0, "type": "show_cell", "data": { "cellId": "c1" } } ] }
//! ```
//!
//! and the timeline generator's seconds-based output:
//!
//! ```json
//! { "segment_id": 3, "total_duration": 2.0,
//!   "events": [ { "time": 0.0, "action": "focusCell", "params": { "cellIndex": 0 } } ] }
//! ```
//!
//! Events are kept in the order given. The engine never sorts them.

use crate::error::TimelineError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

// ============================================================================
// EVENT KIND
// ============================================================================

/// Closed set of event types, with an explicit catch-all
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    AudioStart,
    AudioEnd,
    SegmentEnd,
    /// `show_cell` / `focusCell`
    ShowCell,
    /// `type_code` / `startTyping`
    TypeCode,
    /// `execute_cell` / `executeCell`
    ExecuteCell,
    /// Output is revealed by the execute transition already
    ShowOutput,
    /// Terminal-surface event
    ShowPrompt,
    /// Slide-surface event
    ShowBullet,
    /// Anything newer than this engine
    Unrecognized(String),
}

impl EventKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "audio_start" => EventKind::AudioStart,
            "audio_end" => EventKind::AudioEnd,
            "segment_end" => EventKind::SegmentEnd,
            "show_cell" | "focusCell" => EventKind::ShowCell,
            "type_code" | "startTyping" => EventKind::TypeCode,
            "execute_cell" | "executeCell" => EventKind::ExecuteCell,
            "showOutput" | "show_output" => EventKind::ShowOutput,
            "showPrompt" | "show_prompt" => EventKind::ShowPrompt,
            "showBullet" | "show_bullet" => EventKind::ShowBullet,
            other => EventKind::Unrecognized(other.to_string()),
        }
    }

    /// Canonical wire name
    pub fn name(&self) -> &str {
        match self {
            EventKind::AudioStart => "audio_start",
            EventKind::AudioEnd => "audio_end",
            EventKind::SegmentEnd => "segment_end",
            EventKind::ShowCell => "show_cell",
            EventKind::TypeCode => "type_code",
            EventKind::ExecuteCell => "execute_cell",
            EventKind::ShowOutput => "showOutput",
            EventKind::ShowPrompt => "showPrompt",
            EventKind::ShowBullet => "showBullet",
            EventKind::Unrecognized(name) => name,
        }
    }
}

impl From<String> for EventKind {
    fn from(name: String) -> Self {
        EventKind::from_name(&name)
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.name().to_string()
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// One timed instruction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEvent {
    pub time_ms: u64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: Map<String, Value>,
}

impl TimelineEvent {
    pub fn new(time_ms: u64, kind: EventKind, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { time_ms, kind, data }
    }

    fn field(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().find_map(|k| self.data.get(*k)).filter(|v| !v.is_null())
    }

    /// Explicit cell id
    pub fn cell_id(&self) -> Option<&str> {
        self.field(&["cellId", "cell_id"]).and_then(Value::as_str)
    }

    /// Index into the loaded segment's cells
    pub fn cell_index(&self) -> Option<usize> {
        self.field(&["cellIndex", "cell_index"])
            .and_then(Value::as_u64)
            .map(|i| i as usize)
    }

    /// Text to type (`text` or `code`)
    pub fn text(&self) -> Option<&str> {
        self.field(&["text", "code"]).and_then(Value::as_str)
    }

    /// Typing duration from `duration_ms`, or `duration` in seconds
    pub fn duration_ms(&self) -> Option<u64> {
        if let Some(ms) = self.field(&["duration_ms", "durationMs"]).and_then(Value::as_f64) {
            return Some(ms.max(0.0).round() as u64);
        }
        self.field(&["duration"])
            .and_then(Value::as_f64)
            .map(secs_to_ms)
    }

    /// Recorded output carried on the event itself
    pub fn output(&self) -> Option<&str> {
        self.field(&["output"]).and_then(Value::as_str)
    }
}

fn secs_to_ms(secs: f64) -> u64 {
    (secs.max(0.0) * 1000.0).round() as u64
}

// ============================================================================
// TIMELINE
// ============================================================================

/// Scripted event list for one segment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireTimeline")]
pub struct Timeline {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_id: Option<u64>,
    pub events: Vec<TimelineEvent>,
    pub total_duration_ms: u64,
}

impl Timeline {
    pub fn new(events: Vec<TimelineEvent>, total_duration_ms: u64) -> Self {
        Self {
            segment_id: None,
            events,
            total_duration_ms,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, TimelineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// One past the last event at or before `time_ms`
    ///
    /// Full linear scan, so out-of-order timelines still get a defined answer.
    pub fn index_after(&self, time_ms: u64) -> usize {
        self.events
            .iter()
            .rposition(|e| e.time_ms <= time_ms)
            .map(|i| i + 1)
            .unwrap_or(0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireEvent {
    Millis {
        time_ms: u64,
        #[serde(rename = "type")]
        kind: EventKind,
        #[serde(default)]
        data: Map<String, Value>,
    },
    Seconds {
        time: f64,
        action: EventKind,
        #[serde(default)]
        params: Map<String, Value>,
    },
}

#[derive(Deserialize)]
struct WireTimeline {
    #[serde(default)]
    segment_id: Option<u64>,
    #[serde(default)]
    events: Vec<WireEvent>,
    total_duration_ms: Option<u64>,
    total_duration: Option<f64>,
}

impl TryFrom<WireTimeline> for Timeline {
    type Error = TimelineError;

    fn try_from(wire: WireTimeline) -> Result<Self, Self::Error> {
        let events: Vec<TimelineEvent> = wire
            .events
            .into_iter()
            .map(|event| match event {
                WireEvent::Millis { time_ms, kind, data } => TimelineEvent { time_ms, kind, data },
                WireEvent::Seconds { time, action, params } => TimelineEvent {
                    time_ms: secs_to_ms(time),
                    kind: action,
                    data: params,
                },
            })
            .collect();

        let total_duration_ms = match (wire.total_duration_ms, wire.total_duration) {
            (Some(ms), _) => ms,
            (None, Some(secs)) if secs.is_finite() => secs_to_ms(secs),
            (None, Some(secs)) => {
                return Err(TimelineError::Invalid(format!("total_duration is not finite: {}", secs)))
            }
            (None, None) => {
                let latest = events.iter().map(|e| e.time_ms).max().unwrap_or(0);
                debug!("Timeline has no total duration, using latest event at {}ms", latest);
                latest
            }
        };

        Ok(Timeline {
            segment_id: wire.segment_id,
            events,
            total_duration_ms,
        })
    }
}

// ============================================================================
// SEGMENT
// ============================================================================

/// One cell definition of a segment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentCell {
    /// Empty ids are replaced by `cell_{index}` on load
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default, alias = "type")]
    pub cell_type: Option<String>,
    /// Markdown text, or the code a later `type_code` event will type
    #[serde(default, alias = "code", alias = "source")]
    pub content: Option<String>,
}

impl SegmentCell {
    pub fn new(id: impl Into<String>, output: Option<&str>) -> Self {
        Self {
            id: id.into(),
            output: output.map(str::to_string),
            ..Default::default()
        }
    }
}

/// Cell definitions for one loaded segment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireSegment")]
pub struct SegmentData {
    pub cells: Vec<SegmentCell>,
}

#[derive(Deserialize)]
struct WireSegment {
    #[serde(default, alias = "code_cells")]
    cells: Vec<SegmentCell>,
}

impl From<WireSegment> for SegmentData {
    fn from(wire: WireSegment) -> Self {
        SegmentData::new(wire.cells)
    }
}

impl SegmentData {
    /// Build segment data, filling in missing cell ids
    pub fn new(mut cells: Vec<SegmentCell>) -> Self {
        for (i, cell) in cells.iter_mut().enumerate() {
            if cell.id.is_empty() {
                cell.id = format!("cell_{}", i);
            }
        }
        Self { cells }
    }

    pub fn from_json(json: &str) -> Result<Self, TimelineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn cell(&self, index: usize) -> Option<&SegmentCell> {
        self.cells.get(index)
    }

    pub fn find(&self, id: &str) -> Option<&SegmentCell> {
        self.cells.iter().find(|c| c.id == id)
    }
}
