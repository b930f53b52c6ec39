//! Shared status state with dirty tracking
//!
//! The engine writes, the host UI polls. Reads take a cheap atomic check first
//! so an unchanged status costs no lock.
//!
//! ```rust,ignore
//! if let Some(status) = engine.status().read_if_dirty() {
//!     progress_bar.set(status.position_ms, status.total_ms);
//! }
//! ```

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// Single value with a dirty flag
#[derive(Debug, Default)]
pub struct DirtyValue<T> {
    value: RwLock<T>,
    dirty: AtomicBool,
}

impl<T: Clone> DirtyValue<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
            dirty: AtomicBool::new(true),
        }
    }

    pub fn set(&self, value: T) {
        *self.value.write() = value;
        self.dirty.store(true, Ordering::Release);
    }

    /// Mutate in place and mark dirty
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.value.write());
        self.dirty.store(true, Ordering::Release);
    }

    pub fn read(&self) -> T {
        self.value.read().clone()
    }

    /// Returns the value only if it changed since the last dirty read
    pub fn read_if_dirty(&self) -> Option<T> {
        if self.dirty.swap(false, Ordering::AcqRel) {
            Some(self.read())
        } else {
            None
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }
}

// ============================================================================
// PLAYBACK STATUS
// ============================================================================

/// Engine lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Nothing loaded, loaded but never played, or stopped
    #[default]
    Idle,
    Playing,
    /// Position frozen, resumable
    Paused,
    /// Reached the end; reopened by `seek` or a new load
    Finished,
}

impl EngineState {
    pub fn is_playing(&self) -> bool {
        matches!(self, EngineState::Playing)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, EngineState::Finished)
    }
}

/// Snapshot the host UI renders from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlaybackStatus {
    pub state: EngineState,
    pub position_ms: u64,
    pub total_ms: u64,
    pub event_index: usize,
    pub has_audio: bool,
}
