//! Notebook Renderer - simulated Jupyter execution surface
//!
//! Holds an ordered set of addressable cells and animates the notebook the
//! way a live kernel would:
//! - cells start hidden and are revealed one by one
//! - one cell at a time carries the active highlight
//! - executing a cell shows `In [*]:` for a fixed settle delay, then assigns the
//!   next number from a single shared execution counter and reveals the output
//!
//! Lookups by unknown id are no-ops. Timelines may reference cells that a later
//! segment state adds, so a miss is never an error here.
//!
//! The host UI polls [`NotebookRenderer::snapshot_if_dirty`] on its frame timer.

use crate::surface::{CellInput, TextSurface};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Settle delay between the busy indicator and the executed state
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(600);

// ============================================================================
// DATA MODELS
// ============================================================================

/// Cell flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    #[default]
    Code,
    Markdown,
}

impl CellKind {
    /// Parse a notebook cell type name; anything that is not markdown is code
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" | "text" => CellKind::Markdown,
            _ => CellKind::Code,
        }
    }
}

/// Execution state of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    Idle,
    /// Waiting for the settle delay, label shows `[*]`
    Busy,
    Executed,
}

#[derive(Debug)]
struct CellState {
    id: String,
    kind: CellKind,
    input: CellInput,
    visible: bool,
    active: bool,
    status: ExecutionStatus,
    execution_count: Option<u32>,
    output: Option<String>,
}

impl CellState {
    fn label(&self) -> String {
        match self.kind {
            CellKind::Markdown => String::new(),
            CellKind::Code => match (self.status, self.execution_count) {
                (ExecutionStatus::Busy, _) => "In [*]:".to_string(),
                (_, Some(count)) => format!("In [{}]:", count),
                (_, None) => "In [ ]:".to_string(),
            },
        }
    }

    fn snapshot(&self) -> CellSnapshot {
        CellSnapshot {
            id: self.id.clone(),
            kind: self.kind,
            content: self.input.display_text(),
            visible: self.visible,
            active: self.active,
            status: self.status,
            label: self.label(),
            execution_count: self.execution_count,
            output: self.output.clone(),
        }
    }
}

/// Render-ready view of one cell
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSnapshot {
    pub id: String,
    pub kind: CellKind,
    /// Input text including the typing cursor, if shown
    pub content: String,
    pub visible: bool,
    pub active: bool,
    pub status: ExecutionStatus,
    /// Prompt label, e.g. `In [3]:`
    pub label: String,
    pub execution_count: Option<u32>,
    pub output: Option<String>,
}

/// Render-ready view of the whole notebook
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookSnapshot {
    pub cells: Vec<CellSnapshot>,
    pub execution_counter: u32,
}

// ============================================================================
// NOTEBOOK RENDERER
// ============================================================================

#[derive(Debug, Default)]
struct NotebookInner {
    cells: Vec<CellState>,
    /// Shared kernel counter, bumped only by the execute transition
    execution_counter: u32,
    /// Pending settle tasks, aborted by `clear()`
    pending: Vec<JoinHandle<()>>,
    /// Bumped by `clear()` so stale settle tasks leave the new surface alone
    generation: u64,
}

impl NotebookInner {
    fn cell_mut(&mut self, id: &str) -> Option<&mut CellState> {
        self.cells.iter_mut().find(|c| c.id == id)
    }

    fn cell(&self, id: &str) -> Option<&CellState> {
        self.cells.iter().find(|c| c.id == id)
    }
}

/// Simulated notebook surface
///
/// Cheap to clone; all clones drive the same notebook.
#[derive(Debug, Clone)]
pub struct NotebookRenderer {
    inner: Arc<Mutex<NotebookInner>>,
    dirty: Arc<AtomicBool>,
    settle_delay: Duration,
}

impl Default for NotebookRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_DELAY)
    }
}

impl NotebookRenderer {
    /// Create an empty notebook with the given execute settle delay
    pub fn new(settle_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(NotebookInner::default())),
            dirty: Arc::new(AtomicBool::new(false)),
            settle_delay,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Register a new hidden cell
    ///
    /// A second registration under an existing id is ignored.
    pub fn add_cell(&self, id: &str, kind: CellKind, content: &str, execution_count: Option<u32>) {
        let mut inner = self.inner.lock();
        if inner.cell(id).is_some() {
            log::warn!("Notebook: cell '{}' already registered, ignoring", id);
            return;
        }

        inner.cells.push(CellState {
            id: id.to_string(),
            kind,
            input: CellInput::with_dirty_flag(content, self.dirty.clone()),
            visible: false,
            active: false,
            status: ExecutionStatus::Idle,
            execution_count,
            output: None,
        });
        drop(inner);
        self.mark_dirty();
    }

    /// Reveal a cell
    pub fn show_cell(&self, id: &str) {
        let mut inner = self.inner.lock();
        match inner.cell_mut(id) {
            Some(cell) => {
                cell.visible = true;
                drop(inner);
                self.mark_dirty();
            }
            None => log::debug!("Notebook: show_cell on unknown cell '{}'", id),
        }
    }

    /// Highlight exactly one cell, clearing any previous highlight
    pub fn set_active_cell(&self, id: &str) {
        let mut inner = self.inner.lock();
        if inner.cell(id).is_none() {
            log::debug!("Notebook: set_active_cell on unknown cell '{}'", id);
            return;
        }
        for cell in inner.cells.iter_mut() {
            cell.active = cell.id == id;
        }
        drop(inner);
        self.mark_dirty();
    }

    /// Id of the highlighted cell
    pub fn active_cell(&self) -> Option<String> {
        self.inner
            .lock()
            .cells
            .iter()
            .find(|c| c.active)
            .map(|c| c.id.clone())
    }

    /// Input surface of a cell, for the typewriter to write into
    pub fn cell_input(&self, id: &str) -> Option<CellInput> {
        self.inner.lock().cell(id).map(|c| c.input.clone())
    }

    /// Replace a cell's input text
    pub fn update_cell_content(&self, id: &str, content: &str) {
        // The input handle flags the change itself
        if let Some(input) = self.cell_input(id) {
            input.set_text(content);
        }
    }

    /// Run the simulated execute transition
    ///
    /// The cell goes busy immediately; after the settle delay it receives the
    /// next execution number and `output` (when non-empty) is revealed. Must be
    /// called from within a tokio runtime.
    pub fn execute_cell(&self, id: &str, output: Option<&str>) {
        let mut inner = self.inner.lock();
        let generation = inner.generation;
        match inner.cell_mut(id) {
            Some(cell) => cell.status = ExecutionStatus::Busy,
            None => {
                log::debug!("Notebook: execute_cell on unknown cell '{}'", id);
                return;
            }
        }

        let notebook = self.inner.clone();
        let dirty = self.dirty.clone();
        let delay = self.settle_delay;
        let cell_id = id.to_string();
        let output = output.filter(|o| !o.is_empty()).map(str::to_string);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let mut inner = notebook.lock();
            if inner.generation != generation {
                return;
            }
            inner.execution_counter += 1;
            let count = inner.execution_counter;
            if let Some(cell) = inner.cell_mut(&cell_id) {
                cell.status = ExecutionStatus::Executed;
                cell.execution_count = Some(count);
                if output.is_some() {
                    cell.output = output;
                }
                log::debug!("Notebook: cell '{}' executed as [{}]", cell_id, count);
            }
            dirty.store(true, Ordering::Release);
        });

        inner.pending.retain(|h| !h.is_finished());
        inner.pending.push(handle);
        drop(inner);
        self.mark_dirty();
    }

    /// Whether the cell finished an execute transition
    pub fn is_executed(&self, id: &str) -> bool {
        self.inner
            .lock()
            .cell(id)
            .map(|c| c.status == ExecutionStatus::Executed)
            .unwrap_or(false)
    }

    /// Whether the cell has been revealed
    pub fn is_visible(&self, id: &str) -> bool {
        self.inner.lock().cell(id).map(|c| c.visible).unwrap_or(false)
    }

    /// Current value of the shared execution counter
    pub fn execution_counter(&self) -> u32 {
        self.inner.lock().execution_counter
    }

    /// Cell ids in display order
    pub fn cell_ids(&self) -> Vec<String> {
        self.inner.lock().cells.iter().map(|c| c.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().cells.is_empty()
    }

    /// Reset the whole surface, cancelling pending execute transitions
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        for handle in inner.pending.drain(..) {
            handle.abort();
        }
        inner.cells.clear();
        inner.execution_counter = 0;
        inner.generation += 1;
        drop(inner);
        self.mark_dirty();
    }

    /// Full render snapshot
    pub fn snapshot(&self) -> NotebookSnapshot {
        let inner = self.inner.lock();
        NotebookSnapshot {
            cells: inner.cells.iter().map(CellState::snapshot).collect(),
            execution_counter: inner.execution_counter,
        }
    }

    /// Snapshot only if something changed since the last call
    pub fn snapshot_if_dirty(&self) -> Option<NotebookSnapshot> {
        if self.dirty.swap(false, Ordering::AcqRel) {
            Some(self.snapshot())
        } else {
            None
        }
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notebook_with(ids: &[&str]) -> NotebookRenderer {
        let notebook = NotebookRenderer::default();
        for id in ids {
            notebook.add_cell(id, CellKind::Code, "", None);
        }
        notebook
    }

    #[test]
    fn test_cells_start_hidden() {
        let notebook = notebook_with(&["c1", "c2"]);
        assert_eq!(notebook.len(), 2);
        assert!(!notebook.is_visible("c1"));

        notebook.show_cell("c1");
        assert!(notebook.is_visible("c1"));
        assert!(!notebook.is_visible("c2"));
    }

    #[test]
    fn test_duplicate_id_is_ignored() {
        let notebook = NotebookRenderer::default();
        notebook.add_cell("c1", CellKind::Code, "first", None);
        notebook.add_cell("c1", CellKind::Markdown, "second", None);

        assert_eq!(notebook.len(), 1);
        assert_eq!(notebook.snapshot().cells[0].content, "first");
    }

    #[test]
    fn test_active_cell_is_exclusive() {
        let notebook = notebook_with(&["a", "b", "c"]);
        notebook.set_active_cell("a");
        notebook.set_active_cell("c");

        let active: Vec<_> = notebook
            .snapshot()
            .cells
            .into_iter()
            .filter(|c| c.active)
            .map(|c| c.id)
            .collect();
        assert_eq!(active, vec!["c"]);

        // Unknown ids leave the highlight where it was
        notebook.set_active_cell("zzz");
        assert_eq!(notebook.active_cell().as_deref(), Some("c"));
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let notebook = notebook_with(&["c1"]);
        notebook.show_cell("missing");
        notebook.update_cell_content("missing", "x");
        assert!(notebook.cell_input("missing").is_none());
        assert!(!notebook.is_executed("missing"));
    }

    #[test]
    fn test_labels() {
        let notebook = NotebookRenderer::default();
        notebook.add_cell("code", CellKind::Code, "", None);
        notebook.add_cell("restored", CellKind::Code, "", Some(7));
        notebook.add_cell("md", CellKind::Markdown, "# Title", None);

        let snap = notebook.snapshot();
        assert_eq!(snap.cells[0].label, "In [ ]:");
        assert_eq!(snap.cells[1].label, "In [7]:");
        assert_eq!(snap.cells[2].label, "");
    }

    #[test]
    fn test_cell_kind_from_name() {
        assert_eq!(CellKind::from_name("markdown"), CellKind::Markdown);
        assert_eq!(CellKind::from_name(" Markdown "), CellKind::Markdown);
        assert_eq!(CellKind::from_name("code"), CellKind::Code);
        assert_eq!(CellKind::from_name("python"), CellKind::Code);
    }

    #[test]
    fn test_dirty_tracking() {
        let notebook = notebook_with(&["c1"]);
        assert!(notebook.snapshot_if_dirty().is_some());
        assert!(notebook.snapshot_if_dirty().is_none());

        notebook.update_cell_content("c1", "x = 1");
        let snap = notebook.snapshot_if_dirty().expect("content change should flag");
        assert_eq!(snap.cells[0].content, "x = 1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_settles_after_delay() {
        let notebook = notebook_with(&["c1"]);
        notebook.execute_cell("c1", Some("1"));

        let snap = notebook.snapshot();
        assert_eq!(snap.cells[0].status, ExecutionStatus::Busy);
        assert_eq!(snap.cells[0].label, "In [*]:");
        assert_eq!(snap.cells[0].output, None);

        tokio::time::sleep(Duration::from_millis(599)).await;
        assert!(!notebook.is_executed("c1"));

        tokio::time::sleep(Duration::from_millis(2)).await;
        let snap = notebook.snapshot();
        assert_eq!(snap.cells[0].status, ExecutionStatus::Executed);
        assert_eq!(snap.cells[0].label, "In [1]:");
        assert_eq!(snap.cells[0].output.as_deref(), Some("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execution_counter_is_global() {
        let notebook = notebook_with(&["a", "b"]);
        notebook.execute_cell("a", None);
        tokio::time::sleep(Duration::from_millis(700)).await;
        notebook.execute_cell("b", Some(""));
        tokio::time::sleep(Duration::from_millis(700)).await;
        notebook.execute_cell("a", None);
        tokio::time::sleep(Duration::from_millis(700)).await;

        let snap = notebook.snapshot();
        assert_eq!(snap.execution_counter, 3);
        assert_eq!(snap.cells[0].execution_count, Some(3));
        assert_eq!(snap.cells[1].execution_count, Some(2));
        // Empty output is not revealed
        assert_eq!(snap.cells[1].output, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_pending_execution() {
        let notebook = notebook_with(&["c1"]);
        notebook.execute_cell("c1", Some("out"));
        notebook.clear();
        notebook.add_cell("c1", CellKind::Code, "", None);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!notebook.is_executed("c1"));
        assert_eq!(notebook.execution_counter(), 0);
    }
}
