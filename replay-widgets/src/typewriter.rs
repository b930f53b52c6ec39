//! Typewriter Engine - character-by-character text reveal
//!
//! Reveals a string into a [`TextSurface`] so that typing roughly fills a
//! requested duration. The base per-character delay is `duration / chars`, then:
//!
//! | character | adjustment |
//! |-----------|------------|
//! | any | +/- random jitter (default up to 30%) |
//! | `\n` | + newline pause (150 ms) |
//! | `. : ; , ! ?` | + punctuation pause (60 ms) |
//! | space | x space factor (0.5) |
//!
//! Every delay is clamped to a 5 ms floor so tiny duration hints never spin.
//!
//! One engine runs at most one reveal. Starting another stops the previous
//! one first, and [`TypewriterEngine::stop`] resolves the pending completion
//! right away.

use crate::surface::TextSurface;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

const PUNCTUATION: [char; 6] = ['.', ':', ';', ',', '!', '?'];

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Natural pacing parameters
#[derive(Debug, Clone, PartialEq)]
pub struct PacingConfig {
    /// Max relative jitter applied to each delay (0.3 = +/-30%)
    pub jitter: f64,
    /// Extra pause after a newline
    pub newline_pause: Duration,
    /// Extra pause after `. : ; , ! ?`
    pub punctuation_pause: Duration,
    /// Multiplier for the delay after a space
    pub space_factor: f64,
    /// Floor for any single delay
    pub min_char_delay: Duration,
    /// Fixed RNG seed; `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            jitter: 0.3,
            newline_pause: Duration::from_millis(150),
            punctuation_pause: Duration::from_millis(60),
            space_factor: 0.5,
            min_char_delay: Duration::from_millis(5),
            seed: None,
        }
    }
}

/// Per-call options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypewriterOptions {
    /// Cursor shown after the revealed text while typing
    pub cursor_char: Option<char>,
}

/// How a reveal ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingOutcome {
    /// Every character was revealed at its natural pace
    Completed,
    /// `stop()` or a newer reveal cut it short
    Cancelled,
    /// `skip()` revealed the remainder at once
    Skipped,
}

/// Completion handle for one reveal
#[derive(Debug)]
pub struct TypingHandle {
    done: oneshot::Receiver<TypingOutcome>,
}

impl TypingHandle {
    /// Wait for the reveal to end
    pub async fn wait(self) -> TypingOutcome {
        self.done.await.unwrap_or(TypingOutcome::Cancelled)
    }

    fn resolved(outcome: TypingOutcome) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self { done: rx }
    }
}

// ============================================================================
// TYPEWRITER ENGINE
// ============================================================================

struct ActiveReveal {
    id: u64,
    task: JoinHandle<()>,
    done: oneshot::Sender<TypingOutcome>,
    paused: watch::Sender<bool>,
    target: Arc<dyn TextSurface>,
    /// Surface text before typing started, plus the full string being typed
    final_text: String,
}

struct TypewriterInner {
    pacing: PacingConfig,
    rng: Mutex<StdRng>,
    active: Mutex<Option<ActiveReveal>>,
    next_id: AtomicU64,
}

impl TypewriterInner {
    /// Resolve the reveal `id` if it is still the active one
    fn finish(&self, id: u64, outcome: TypingOutcome) {
        let reveal = {
            let mut active = self.active.lock();
            match active.as_ref() {
                Some(reveal) if reveal.id == id => active.take(),
                _ => None,
            }
        };
        if let Some(reveal) = reveal {
            reveal.target.set_cursor(None);
            let _ = reveal.done.send(outcome);
        }
    }
}

/// Character-by-character reveal driver
///
/// Cheap to clone; clones share the single active reveal.
#[derive(Clone)]
pub struct TypewriterEngine {
    inner: Arc<TypewriterInner>,
}

impl Default for TypewriterEngine {
    fn default() -> Self {
        Self::new(PacingConfig::default())
    }
}

impl TypewriterEngine {
    pub fn new(pacing: PacingConfig) -> Self {
        let rng = match pacing.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            inner: Arc::new(TypewriterInner {
                pacing,
                rng: Mutex::new(rng),
                active: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn pacing(&self) -> &PacingConfig {
        &self.inner.pacing
    }

    /// Start revealing `text` into `target` over roughly `duration`
    ///
    /// Any reveal already running is stopped first. Empty text resolves
    /// immediately. Must be called from within a tokio runtime.
    pub fn type_text(
        &self,
        target: Arc<dyn TextSurface>,
        text: &str,
        duration: Duration,
        options: TypewriterOptions,
    ) -> TypingHandle {
        self.stop();

        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return TypingHandle::resolved(TypingOutcome::Completed);
        }

        let delays = self.plan_delays(&chars, duration);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (done_tx, done_rx) = oneshot::channel();
        let (pause_tx, pause_rx) = watch::channel(false);
        let final_text = format!("{}{}", target.text(), text);

        log::debug!(
            "Typewriter: revealing {} chars over {}ms",
            chars.len(),
            duration.as_millis()
        );

        // Hold the slot while spawning so the task cannot finish before it is registered
        let mut active = self.inner.active.lock();
        let task = tokio::spawn(Self::run_reveal(
            self.inner.clone(),
            id,
            target.clone(),
            chars,
            delays,
            options.cursor_char,
            pause_rx,
        ));
        *active = Some(ActiveReveal {
            id,
            task,
            done: done_tx,
            paused: pause_tx,
            target,
            final_text,
        });

        TypingHandle { done: done_rx }
    }

    /// Cancel the active reveal and resolve its completion
    ///
    /// Already revealed characters stay. Idempotent.
    pub fn stop(&self) {
        let reveal = self.inner.active.lock().take();
        if let Some(reveal) = reveal {
            reveal.task.abort();
            reveal.target.set_cursor(None);
            let _ = reveal.done.send(TypingOutcome::Cancelled);
            log::debug!("Typewriter: reveal {} stopped", reveal.id);
        }
    }

    /// Reveal the rest of the active text at once
    pub fn skip(&self) {
        let reveal = self.inner.active.lock().take();
        if let Some(reveal) = reveal {
            reveal.task.abort();
            reveal.target.set_text(&reveal.final_text);
            reveal.target.set_cursor(None);
            let _ = reveal.done.send(TypingOutcome::Skipped);
        }
    }

    /// Freeze the active reveal
    pub fn pause(&self) {
        if let Some(reveal) = self.inner.active.lock().as_ref() {
            reveal.paused.send_replace(true);
        }
    }

    /// Continue a paused reveal from where it stopped
    pub fn resume(&self) {
        if let Some(reveal) = self.inner.active.lock().as_ref() {
            reveal.paused.send_replace(false);
        }
    }

    pub fn is_typing(&self) -> bool {
        self.inner.active.lock().is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.inner
            .active
            .lock()
            .as_ref()
            .map(|r| *r.paused.borrow())
            .unwrap_or(false)
    }

    /// Delay to wait after each character
    fn plan_delays(&self, chars: &[char], duration: Duration) -> Vec<Duration> {
        let pacing = &self.inner.pacing;
        let base_ms = duration.as_secs_f64() * 1000.0 / chars.len() as f64;
        let min_ms = pacing.min_char_delay.as_secs_f64() * 1000.0;
        let jitter = pacing.jitter.clamp(0.0, 1.0);
        let mut rng = self.inner.rng.lock();

        chars
            .iter()
            .map(|&ch| {
                let factor = if jitter > 0.0 {
                    1.0 + rng.gen_range(-jitter..=jitter)
                } else {
                    1.0
                };
                let mut ms = base_ms * factor;
                if ch == '\n' {
                    ms += pacing.newline_pause.as_secs_f64() * 1000.0;
                } else if PUNCTUATION.contains(&ch) {
                    ms += pacing.punctuation_pause.as_secs_f64() * 1000.0;
                } else if ch == ' ' {
                    ms *= pacing.space_factor;
                }
                Duration::from_secs_f64(ms.max(min_ms) / 1000.0)
            })
            .collect()
    }

    async fn run_reveal(
        inner: Arc<TypewriterInner>,
        id: u64,
        target: Arc<dyn TextSurface>,
        chars: Vec<char>,
        delays: Vec<Duration>,
        cursor: Option<char>,
        mut paused: watch::Receiver<bool>,
    ) {
        target.set_cursor(cursor);
        let last = chars.len() - 1;

        for (i, (ch, delay)) in chars.into_iter().zip(delays).enumerate() {
            wait_while_paused(&mut paused).await;
            target.push_char(ch);
            if i < last {
                paced_sleep(delay, &mut paused).await;
            }
        }

        inner.finish(id, TypingOutcome::Completed);
    }
}

async fn wait_while_paused(paused: &mut watch::Receiver<bool>) {
    while *paused.borrow_and_update() {
        if paused.changed().await.is_err() {
            return;
        }
    }
}

/// Sleep for `delay`, not counting time spent paused
async fn paced_sleep(delay: Duration, paused: &mut watch::Receiver<bool>) {
    let mut remaining = delay;
    loop {
        wait_while_paused(paused).await;
        let started = Instant::now();
        tokio::select! {
            _ = tokio::time::sleep(remaining) => return,
            changed = paused.changed() => {
                if changed.is_err() {
                    tokio::time::sleep(remaining).await;
                    return;
                }
                remaining = remaining.saturating_sub(started.elapsed());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady_engine() -> TypewriterEngine {
        TypewriterEngine::new(PacingConfig {
            jitter: 0.0,
            ..Default::default()
        })
    }

    #[test]
    fn test_plain_delay_is_even_split() {
        let engine = steady_engine();
        let delays = engine.plan_delays(&['a', 'b', 'c', 'd'], Duration::from_millis(400));
        assert!(delays.iter().all(|d| *d == Duration::from_millis(100)));
    }

    #[test]
    fn test_pauses_for_newline_punctuation_and_space() {
        let engine = steady_engine();
        let delays = engine.plan_delays(&['x', '\n', ',', ' '], Duration::from_millis(400));

        assert_eq!(delays[0], Duration::from_millis(100));
        assert_eq!(delays[1], Duration::from_millis(250));
        assert_eq!(delays[2], Duration::from_millis(160));
        assert_eq!(delays[3], Duration::from_millis(50));
    }

    #[test]
    fn test_delay_floor() {
        let engine = steady_engine();
        let delays = engine.plan_delays(&['a'; 100], Duration::from_millis(0));
        assert!(delays.iter().all(|d| *d == Duration::from_millis(5)));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let engine = TypewriterEngine::new(PacingConfig {
            seed: Some(42),
            ..Default::default()
        });
        let delays = engine.plan_delays(&['a'; 200], Duration::from_millis(20_000));

        for d in delays {
            let ms = d.as_secs_f64() * 1000.0;
            assert!((69.9..=130.1).contains(&ms), "delay {}ms out of range", ms);
        }
    }

    #[test]
    fn test_seeded_pacing_is_reproducible() {
        let chars: Vec<char> = "let x = 42;".chars().collect();
        let a = TypewriterEngine::new(PacingConfig { seed: Some(7), ..Default::default() });
        let b = TypewriterEngine::new(PacingConfig { seed: Some(7), ..Default::default() });

        assert_eq!(
            a.plan_delays(&chars, Duration::from_secs(1)),
            b.plan_delays(&chars, Duration::from_secs(1))
        );
    }
}
