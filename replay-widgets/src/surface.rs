//! Text surfaces
//!
//! A [`TextSurface`] is anything the typewriter can reveal text into. The
//! notebook hands out [`CellInput`] handles, which share their buffer with the
//! cell that owns them so typed characters show up in the next snapshot.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Mutable text target for character-by-character reveal
pub trait TextSurface: Send + Sync {
    /// Replace the whole text
    fn set_text(&self, text: &str);

    /// Append one character
    fn push_char(&self, ch: char);

    /// Current text, without the cursor
    fn text(&self) -> String;

    /// Show or hide the typing cursor
    fn set_cursor(&self, cursor: Option<char>);
}

#[derive(Debug, Default)]
struct InputBuffer {
    text: String,
    cursor: Option<char>,
}

/// Editable input area of a notebook cell
///
/// Cloning yields another handle onto the same buffer.
#[derive(Debug, Clone)]
pub struct CellInput {
    buffer: Arc<RwLock<InputBuffer>>,
    /// Change flag shared with the owning notebook
    dirty: Arc<AtomicBool>,
}

impl CellInput {
    /// Create a detached input with its own change flag
    pub fn new(content: &str) -> Self {
        Self::with_dirty_flag(content, Arc::new(AtomicBool::new(false)))
    }

    /// Create an input that reports changes through `dirty`
    pub fn with_dirty_flag(content: &str, dirty: Arc<AtomicBool>) -> Self {
        Self {
            buffer: Arc::new(RwLock::new(InputBuffer {
                text: content.to_string(),
                cursor: None,
            })),
            dirty,
        }
    }

    /// Text as it should be drawn, including the cursor if one is shown
    pub fn display_text(&self) -> String {
        let buffer = self.buffer.read();
        match buffer.cursor {
            Some(cursor) => {
                let mut shown = buffer.text.clone();
                shown.push(cursor);
                shown
            }
            None => buffer.text.clone(),
        }
    }

    /// Cursor currently shown, if any
    pub fn cursor(&self) -> Option<char> {
        self.buffer.read().cursor
    }

    /// Number of characters currently revealed
    pub fn char_count(&self) -> usize {
        self.buffer.read().text.chars().count()
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }
}

impl Default for CellInput {
    fn default() -> Self {
        Self::new("")
    }
}

impl TextSurface for CellInput {
    fn set_text(&self, text: &str) {
        {
            let mut buffer = self.buffer.write();
            buffer.text.clear();
            buffer.text.push_str(text);
        }
        self.mark_dirty();
    }

    fn push_char(&self, ch: char) {
        self.buffer.write().text.push(ch);
        self.mark_dirty();
    }

    fn text(&self) -> String {
        self.buffer.read().text.clone()
    }

    fn set_cursor(&self, cursor: Option<char>) {
        let changed = {
            let mut buffer = self.buffer.write();
            let changed = buffer.cursor != cursor;
            buffer.cursor = cursor;
            changed
        };
        if changed {
            self.mark_dirty();
        }
    }
}
