//! Playback engine
//!
//! Drives the notebook through a segment's timeline against the narration
//! clock.
//!
//! ```text
//!            load_segment
//!                 │
//!                 ▼
//!   stop ──►   Idle ──play──► Playing ──pause──► Paused
//!                 ▲             │  ▲               │
//!                 │             │  └─────play──────┘
//!                 │     audio end / wall clock ≥ total
//!                 │             ▼
//!                 └──stop── Finished ──seek──► Paused
//! ```
//!
//! ## Time base
//!
//! With a decoded clip the audio controller's clock is authoritative and its
//! natural end finishes playback. Without one, position is wall-clock time
//! since `play()` plus the offset it started from, and the progress loop
//! finishes playback once position reaches the timeline's total.
//!
//! ## Scheduling
//!
//! `play()` arms one timer per not-yet-applied event, relative to a single
//! base instant. Events already behind the start position are applied at
//! once. Every timer body re-checks state and a scheduling epoch, so a timer
//! that survives cancellation can never fire into a later session. A per-event
//! `applied` flag keeps pause/seek/resume from running anything twice.

use crate::audio::{AudioController, AudioSession, DecodedAudio};
use crate::config::PlaybackConfig;
use crate::dispatch::{resolve_action, EventAction};
use crate::error::PlaybackResult;
use crate::shared_state::{DirtyValue, EngineState, PlaybackStatus};
use crate::timeline::{SegmentData, Timeline, TimelineEvent};
use crate::timers::TimerSet;
use parking_lot::{Mutex, RwLock};
use replay_widgets::{CellKind, NotebookRenderer, TextSurface, TypewriterEngine};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Progress callback: `(position_ms, total_ms)`
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Completion callback, fired once per play-through
pub type CompleteCallback = Arc<dyn Fn() + Send + Sync>;

/// How an event's effect is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatch {
    /// On schedule, animations run
    Live,
    /// Catch-up or flush: the event is in the past, so its end state is shown
    Immediate,
}

struct EngineCore {
    state: EngineState,
    timeline: Option<Arc<Timeline>>,
    segment: Arc<SegmentData>,
    audio: Option<Arc<DecodedAudio>>,
    pause_offset_ms: u64,
    event_index: usize,
    applied: Vec<bool>,
    /// Event whose live reveal the typewriter last started
    typing_event: Option<usize>,
    /// Wall-clock base for the current play session
    started_at: Option<Instant>,
    /// Bumped whenever scheduling is torn down
    epoch: u64,
    load_generation: u64,
    timers: TimerSet,
    progress_task: Option<JoinHandle<()>>,
    audio_watch: Option<JoinHandle<()>>,
}

impl EngineCore {
    fn new() -> Self {
        Self {
            state: EngineState::Idle,
            timeline: None,
            segment: Arc::new(SegmentData::default()),
            audio: None,
            pause_offset_ms: 0,
            event_index: 0,
            applied: Vec::new(),
            typing_event: None,
            started_at: None,
            epoch: 0,
            load_generation: 0,
            timers: TimerSet::new(),
            progress_task: None,
            audio_watch: None,
        }
    }

    fn total_ms(&self) -> u64 {
        self.timeline.as_ref().map(|t| t.total_duration_ms).unwrap_or(0)
    }

    /// Cancel every timer and task of the current session
    fn halt(&mut self) {
        self.timers.cancel_all();
        if let Some(task) = self.progress_task.take() {
            task.abort();
        }
        if let Some(task) = self.audio_watch.take() {
            task.abort();
        }
        self.started_at = None;
        self.epoch += 1;
    }
}

struct EngineInner {
    config: PlaybackConfig,
    audio: AudioController,
    typewriter: TypewriterEngine,
    notebook: NotebookRenderer,
    core: Mutex<EngineCore>,
    status: DirtyValue<PlaybackStatus>,
    /// Held while callbacks run; completion never interleaves with a progress frame
    emit: Mutex<()>,
    on_progress: RwLock<Option<ProgressCallback>>,
    on_complete: RwLock<Option<CompleteCallback>>,
}

/// Timeline scheduler
///
/// Cheap to clone; clones drive the same session. All operations except
/// construction must run inside a tokio runtime.
#[derive(Clone)]
pub struct PlaybackEngine {
    inner: Arc<EngineInner>,
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new(PlaybackConfig::default())
    }
}

impl PlaybackEngine {
    pub fn new(config: PlaybackConfig) -> Self {
        let audio = AudioController::new(config.volume);
        let typewriter = TypewriterEngine::new(config.typewriter.pacing());
        let notebook = NotebookRenderer::new(config.notebook.settle_delay());
        Self::with_components(config, audio, typewriter, notebook)
    }

    /// Build around existing collaborators
    pub fn with_components(
        config: PlaybackConfig,
        audio: AudioController,
        typewriter: TypewriterEngine,
        notebook: NotebookRenderer,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                config,
                audio,
                typewriter,
                notebook,
                core: Mutex::new(EngineCore::new()),
                status: DirtyValue::new(PlaybackStatus::default()),
                emit: Mutex::new(()),
                on_progress: RwLock::new(None),
                on_complete: RwLock::new(None),
            }),
        }
    }

    fn downgrade(&self) -> Weak<EngineInner> {
        Arc::downgrade(&self.inner)
    }

    fn upgrade(weak: &Weak<EngineInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    // ========================================================================
    // COLLABORATORS & CALLBACKS
    // ========================================================================

    pub fn config(&self) -> &PlaybackConfig {
        &self.inner.config
    }

    pub fn notebook(&self) -> &NotebookRenderer {
        &self.inner.notebook
    }

    pub fn audio(&self) -> &AudioController {
        &self.inner.audio
    }

    pub fn typewriter(&self) -> &TypewriterEngine {
        &self.inner.typewriter
    }

    pub fn set_on_progress(&self, callback: impl Fn(u64, u64) + Send + Sync + 'static) {
        let callback: ProgressCallback = Arc::new(callback);
        *self.inner.on_progress.write() = Some(callback);
    }

    pub fn set_on_complete(&self, callback: impl Fn() + Send + Sync + 'static) {
        let callback: CompleteCallback = Arc::new(callback);
        *self.inner.on_complete.write() = Some(callback);
    }

    /// Dirty-tracked status for UI polling
    pub fn status(&self) -> &DirtyValue<PlaybackStatus> {
        &self.inner.status
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn state(&self) -> EngineState {
        self.inner.core.lock().state
    }

    /// Current position by the time-base rule, clamped to the total
    pub fn position_ms(&self) -> u64 {
        let core = self.inner.core.lock();
        self.position_locked(&core)
    }

    pub fn pause_offset_ms(&self) -> u64 {
        self.inner.core.lock().pause_offset_ms
    }

    pub fn event_index(&self) -> usize {
        self.inner.core.lock().event_index
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.inner.core.lock().total_ms()
    }

    /// Whether a decoded clip drives the time base
    pub fn has_audio(&self) -> bool {
        self.inner.core.lock().audio.is_some()
    }

    fn position_locked(&self, core: &EngineCore) -> u64 {
        let position = match core.state {
            EngineState::Playing if core.audio.is_some() => {
                (self.inner.audio.current_time() * 1000.0).round() as u64
            }
            EngineState::Playing => {
                let elapsed = core
                    .started_at
                    .map(|s| s.elapsed().as_millis() as u64)
                    .unwrap_or(0);
                core.pause_offset_ms + elapsed
            }
            _ => core.pause_offset_ms,
        };
        position.min(core.total_ms())
    }

    fn publish(&self, core: &EngineCore) {
        self.inner.status.set(PlaybackStatus {
            state: core.state,
            position_ms: self.position_locked(core),
            total_ms: core.total_ms(),
            event_index: core.event_index,
            has_audio: core.audio.is_some(),
        });
    }

    // ========================================================================
    // TRANSPORT
    // ========================================================================

    /// Replace the loaded segment and reset playback to the start
    ///
    /// A clip that fails to load or decode is logged and playback falls back
    /// to wall-clock timing; the load itself never fails.
    pub async fn load_segment(&self, segment: SegmentData, timeline: Timeline, audio_url: Option<&str>) {
        let generation = {
            let mut core = self.inner.core.lock();
            core.halt();
            self.inner.audio.stop();
            self.inner.typewriter.stop();

            let notebook = &self.inner.notebook;
            notebook.clear();
            for cell in &segment.cells {
                let kind = CellKind::from_name(cell.cell_type.as_deref().unwrap_or("code"));
                let content = match kind {
                    CellKind::Markdown => cell.content.as_deref().unwrap_or(""),
                    CellKind::Code => "",
                };
                notebook.add_cell(&cell.id, kind, content, None);
            }

            info!(
                "Loaded segment: {} cells, {} events, {}ms",
                segment.cells.len(),
                timeline.len(),
                timeline.total_duration_ms
            );

            core.applied = vec![false; timeline.len()];
            core.typing_event = None;
            core.timeline = Some(Arc::new(timeline));
            core.segment = Arc::new(segment);
            core.audio = None;
            core.pause_offset_ms = 0;
            core.event_index = 0;
            core.state = EngineState::Idle;
            core.load_generation += 1;
            self.publish(&core);
            core.load_generation
        };

        let Some(url) = audio_url.filter(|u| !u.trim().is_empty()) else {
            return;
        };

        match self.inner.audio.load_audio(url).await {
            Ok(buffer) => {
                let mut core = self.inner.core.lock();
                if core.load_generation != generation {
                    debug!("Discarding audio for a superseded segment: {}", url);
                    return;
                }
                if core.state.is_playing() {
                    warn!("Playback started before {} decoded, staying on wall clock", url);
                    return;
                }
                core.audio = Some(buffer);
                self.publish(&core);
            }
            Err(e) => {
                warn!("Audio unavailable, using wall-clock timing: {}", e);
            }
        }
    }

    /// Parse segment and timeline JSON, then [`load_segment`](Self::load_segment)
    ///
    /// Malformed JSON is rejected before anything is torn down.
    pub async fn load_segment_json(
        &self,
        segment_json: &str,
        timeline_json: &str,
        audio_url: Option<&str>,
    ) -> PlaybackResult<()> {
        let segment = SegmentData::from_json(segment_json)?;
        let timeline = Timeline::from_json(timeline_json)?;
        self.load_segment(segment, timeline, audio_url).await;
        Ok(())
    }

    /// Start or resume from the current position
    ///
    /// No-op without a timeline, while playing, or once finished.
    pub fn play(&self) {
        let mut core = self.inner.core.lock();
        if core.timeline.is_none() {
            debug!("play() ignored, no timeline loaded");
            return;
        }
        match core.state {
            EngineState::Playing => return,
            EngineState::Finished => {
                debug!("play() ignored, playback finished; seek or reload first");
                return;
            }
            EngineState::Idle | EngineState::Paused => {}
        }
        self.start_locked(&mut core);
    }

    /// Freeze at the current position
    pub fn pause(&self) {
        let mut core = self.inner.core.lock();
        if !core.state.is_playing() {
            return;
        }
        core.pause_offset_ms = self.position_locked(&core);
        core.halt();
        self.inner.audio.pause();
        // Frozen rather than cancelled so the reveal picks up on resume
        self.inner.typewriter.pause();
        core.state = EngineState::Paused;
        info!("Paused at {}ms", core.pause_offset_ms);
        self.publish(&core);
    }

    /// Halt and rewind to zero
    pub fn stop(&self) {
        let mut core = self.inner.core.lock();
        core.halt();
        self.inner.audio.stop();
        self.inner.typewriter.stop();
        core.pause_offset_ms = 0;
        core.event_index = 0;
        core.applied.iter_mut().for_each(|a| *a = false);
        core.typing_event = None;
        core.state = EngineState::Idle;
        info!("Stopped");
        self.publish(&core);
    }

    /// Jump to `time_ms`, clamped to the timeline
    ///
    /// Keeps playing if it was playing; otherwise only the position moves and
    /// the skipped events are applied by the next `play()`.
    pub fn seek(&self, time_ms: u64) {
        let mut core = self.inner.core.lock();
        let Some(timeline) = core.timeline.clone() else {
            debug!("seek() ignored, no timeline loaded");
            return;
        };

        let target = time_ms.min(timeline.total_duration_ms);
        let was_playing = core.state.is_playing();

        core.halt();
        self.inner.audio.pause();

        let index = timeline.index_after(target);
        // A reveal behind the target stays applied, so it lands complete;
        // one at or past it is re-armed below and restarts from scratch
        match core.typing_event.take() {
            Some(event) if event < index => self.inner.typewriter.skip(),
            _ => self.inner.typewriter.stop(),
        }
        core.event_index = index;
        for applied in core.applied.iter_mut().skip(index) {
            *applied = false;
        }
        core.pause_offset_ms = target;
        core.state = EngineState::Paused;
        debug!("Seek to {}ms, event index {}", target, index);

        if was_playing {
            self.start_locked(&mut core);
        } else {
            self.publish(&core);
        }
    }

    fn start_locked(&self, core: &mut EngineCore) {
        let Some(timeline) = core.timeline.clone() else {
            return;
        };
        let from = core.pause_offset_ms;

        core.halt();
        let epoch = core.epoch;
        core.state = EngineState::Playing;
        core.started_at = Some(Instant::now());

        if let Some(buffer) = core.audio.clone() {
            let session = self.inner.audio.play(buffer, from as f64 / 1000.0);
            core.audio_watch = Some(tokio::spawn(Self::watch_audio(self.downgrade(), epoch, session)));
        }

        self.inner.typewriter.resume();
        self.schedule_events(core, &timeline, from, epoch);

        let interval = self.inner.config.frame_interval();
        core.progress_task = Some(tokio::spawn(Self::progress_loop(self.downgrade(), epoch, interval)));

        info!(
            "Playing from {}ms ({})",
            from,
            if core.audio.is_some() { "audio clock" } else { "wall clock" }
        );
        self.publish(core);
    }

    // ========================================================================
    // SCHEDULING
    // ========================================================================

    fn schedule_events(&self, core: &mut EngineCore, timeline: &Timeline, from: u64, epoch: u64) {
        let mut armed = 0;
        for (index, event) in timeline.events.iter().enumerate() {
            if core.applied[index] {
                continue;
            }
            if event.time_ms < from {
                self.apply_event(core, index, event, Dispatch::Immediate);
                continue;
            }

            let weak = self.downgrade();
            core.timers.arm(Duration::from_millis(event.time_ms - from), async move {
                if let Some(engine) = Self::upgrade(&weak) {
                    engine.fire_due(epoch, index);
                }
            });
            armed += 1;
        }
        debug!("Armed {} event timers from {}ms", armed, from);
    }

    /// Timer body for event `index`
    ///
    /// Also applies any earlier-indexed event due at the same moment, so
    /// equal-time events run in timeline order whatever order their timers
    /// wake in.
    fn fire_due(&self, epoch: u64, index: usize) {
        let mut core = self.inner.core.lock();
        if !core.state.is_playing() || core.epoch != epoch {
            debug!("Stale timer for event {} ignored", index);
            return;
        }
        if core.applied.get(index) != Some(&false) {
            return;
        }
        let Some(timeline) = core.timeline.clone() else {
            return;
        };

        let due = timeline.events[index].time_ms;
        for (i, event) in timeline.events.iter().enumerate().take(index + 1) {
            if !core.applied[i] && event.time_ms <= due {
                self.apply_event(&mut core, i, event, Dispatch::Live);
            }
        }
        self.publish(&core);
    }

    fn apply_event(&self, core: &mut EngineCore, index: usize, event: &TimelineEvent, mode: Dispatch) {
        core.applied[index] = true;
        core.event_index = core.event_index.max(index + 1);

        let action = resolve_action(event, &core.segment, self.inner.config.default_typing_duration());
        debug!("Event {} at {}ms: {:?} ({:?})", index, event.time_ms, action, mode);
        if self.perform(action, mode) {
            core.typing_event = Some(index);
        }
    }

    /// Apply one action; `true` if a live reveal started
    fn perform(&self, action: EventAction, mode: Dispatch) -> bool {
        let notebook = &self.inner.notebook;
        match action {
            EventAction::Show { cell_id } => {
                notebook.show_cell(&cell_id);
                notebook.set_active_cell(&cell_id);
            }
            EventAction::Type { cell_id, text, duration } => {
                let Some(input) = notebook.cell_input(&cell_id) else {
                    debug!("No input surface for cell '{}', skipping type_code", cell_id);
                    return false;
                };
                // A reveal still running belongs to an earlier event; finish it
                self.inner.typewriter.skip();
                match mode {
                    Dispatch::Live => {
                        input.set_text("");
                        // Completion is observed through the surface, not awaited
                        let _ = self.inner.typewriter.type_text(
                            Arc::new(input),
                            &text,
                            duration,
                            self.inner.config.typewriter.options(),
                        );
                        return true;
                    }
                    Dispatch::Immediate => input.set_text(&text),
                }
            }
            EventAction::Execute { cell_id, output } => {
                notebook.execute_cell(&cell_id, output.as_deref());
            }
            EventAction::Bookkeeping(kind) | EventAction::NotApplicable(kind) => {
                debug!("'{}' has no effect on the notebook", kind.name());
            }
            EventAction::Unrecognized(name) => {
                warn!("Unrecognized timeline event type '{}', skipping", name);
            }
            EventAction::Unresolved(kind) => {
                debug!("'{}' names no known cell, skipping", kind.name());
            }
        }
        false
    }

    // ========================================================================
    // PROGRESS & COMPLETION
    // ========================================================================

    async fn progress_loop(weak: Weak<EngineInner>, epoch: u64, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(engine) = Self::upgrade(&weak) else {
                break;
            };
            if !engine.progress_tick(epoch) {
                break;
            }
        }
    }

    /// One progress frame; `false` once this session is over
    fn progress_tick(&self, epoch: u64) -> bool {
        let emit = self.inner.emit.lock();
        let (position, total, finished) = {
            let core = self.inner.core.lock();
            if !core.state.is_playing() || core.epoch != epoch {
                return false;
            }
            let position = self.position_locked(&core);
            let total = core.total_ms();
            // With audio, only the clip's own end finishes playback
            let finished = core.audio.is_none() && position >= total;
            (position, total, finished)
        };

        if finished {
            drop(emit);
            self.finish(epoch);
            return false;
        }

        let callback = self.inner.on_progress.read().clone();
        if let Some(callback) = callback {
            callback(position, total);
        }
        true
    }

    async fn watch_audio(weak: Weak<EngineInner>, epoch: u64, session: AudioSession) {
        let id = session.id();
        if !session.ended().await {
            return;
        }
        debug!("Audio session {} ended", id);
        if let Some(engine) = Self::upgrade(&weak) {
            engine.finish(epoch);
        }
    }

    /// Enter Finished, flush every unapplied event, then report
    fn finish(&self, epoch: u64) {
        let _emit = self.inner.emit.lock();
        let total = {
            let mut core = self.inner.core.lock();
            if !core.state.is_playing() || core.epoch != epoch {
                return;
            }
            // May abort the calling task; nothing below awaits
            core.halt();
            core.state = EngineState::Finished;
            // A reveal running past the total lands complete
            self.inner.typewriter.skip();
            core.typing_event = None;

            if let Some(timeline) = core.timeline.clone() {
                let mut flushed = 0;
                for (index, event) in timeline.events.iter().enumerate() {
                    if !core.applied[index] {
                        self.apply_event(&mut core, index, event, Dispatch::Immediate);
                        flushed += 1;
                    }
                }
                if flushed > 0 {
                    debug!("Flushed {} events at finish", flushed);
                }
                core.event_index = timeline.len();
            }

            let total = core.total_ms();
            core.pause_offset_ms = total;
            info!("Playback finished at {}ms", total);
            self.publish(&core);
            total
        };

        let progress = self.inner.on_progress.read().clone();
        if let Some(progress) = progress {
            progress(total, total);
        }
        let complete = self.inner.on_complete.read().clone();
        if let Some(complete) = complete {
            complete();
        }
    }
}
