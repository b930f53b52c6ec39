//! # Replay Widgets
//!
//! Rendering-side building blocks for Replay Studio's scripted notebook takes.
//!
//! ## Modules
//!
//! - [`surface`] - [`TextSurface`] trait and the shared [`CellInput`] buffer
//! - [`notebook`] - [`NotebookRenderer`], the simulated Jupyter surface
//! - [`typewriter`] - [`TypewriterEngine`], paced character-by-character reveal
//!
//! Both the renderer and the typewriter spawn tokio timers, so their animating
//! operations must run inside a tokio runtime. Neither one owns a clock; the
//! playback engine decides when they are driven.
//!
//! ```rust,ignore
//! use replay_widgets::{CellKind, NotebookRenderer, TypewriterEngine, TypewriterOptions};
//! use std::{sync::Arc, time::Duration};
//!
//! let notebook = NotebookRenderer::default();
//! notebook.add_cell("c1", CellKind::Code, "", None);
//! notebook.show_cell("c1");
//!
//! let typewriter = TypewriterEngine::default();
//! let input = notebook.cell_input("c1").unwrap();
//! typewriter
//!     .type_text(Arc::new(input), "x = 1", Duration::from_millis(500), TypewriterOptions::default())
//!     .wait()
//!     .await;
//! notebook.execute_cell("c1", Some("1"));
//! ```

pub mod notebook;
pub mod surface;
pub mod typewriter;

pub use notebook::{
    CellKind, CellSnapshot, ExecutionStatus, NotebookRenderer, NotebookSnapshot,
    DEFAULT_SETTLE_DELAY,
};
pub use surface::{CellInput, TextSurface};
pub use typewriter::{PacingConfig, TypewriterEngine, TypewriterOptions, TypingHandle, TypingOutcome};
