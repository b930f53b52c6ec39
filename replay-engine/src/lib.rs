//! # Replay Engine
//!
//! Plays a scripted notebook take: a segment's timeline of `show_cell`,
//! `type_code` and `execute_cell` events is dispatched to the notebook
//! renderer and typewriter in sync with the narration clip.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ host app: segment + timeline + audio URL, progress/complete UI    │
//! └───────────────┬───────────────────────────────────▲──────────────┘
//!                 │ load_segment / play / pause / seek│ callbacks,
//!                 ▼                                   │ PlaybackStatus
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ PlaybackEngine    timers ─► dispatch ─► notebook / typewriter     │
//! │        ▲                                                         │
//! │        └── time base: AudioController clock, else wall clock     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`engine`] - [`PlaybackEngine`], the scheduler and state machine
//! - [`timeline`] - [`Timeline`], [`TimelineEvent`], [`SegmentData`] and JSON parsing
//! - [`dispatch`] - event-to-action resolution against the loaded segment
//! - [`audio`] - [`AudioController`], WAV decoding and the recorder tap
//! - [`config`] - [`PlaybackConfig`] from TOML/YAML/JSON
//! - [`shared_state`] - dirty-tracked [`PlaybackStatus`] for UI polling
//!
//! ## Usage
//!
//! ```rust,ignore
//! use replay_engine::{PlaybackConfig, PlaybackEngine, SegmentData, Timeline};
//!
//! let engine = PlaybackEngine::new(PlaybackConfig::load()?);
//! engine.set_on_progress(|pos, total| println!("{pos}/{total}"));
//! engine.set_on_complete(|| println!("take finished"));
//!
//! let segment = SegmentData::from_json(&segment_json)?;
//! let timeline = Timeline::from_json(&timeline_json)?;
//! engine.load_segment(segment, timeline, Some("audio/segment_1.wav")).await;
//! engine.play();
//! ```

pub mod audio;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod shared_state;
pub mod timeline;
pub mod timers;

pub use audio::{AudioController, AudioSession, AudioTap, DecodedAudio};
pub use config::{NotebookConfig, PlaybackConfig, TypewriterConfig, CONFIG_PATH_ENV};
pub use dispatch::{resolve_action, EventAction};
pub use engine::{CompleteCallback, PlaybackEngine, ProgressCallback};
pub use error::{AudioLoadError, ConfigError, PlaybackError, PlaybackResult, TimelineError};
pub use shared_state::{DirtyValue, EngineState, PlaybackStatus};
pub use timeline::{EventKind, SegmentCell, SegmentData, Timeline, TimelineEvent};
pub use timers::TimerSet;
