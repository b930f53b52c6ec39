//! Narration clip playback against a virtual output clock
//!
//! There is no device sink here. A "playing" clip is a start instant plus an
//! offset, and the controller's clock is the authoritative position the
//! engine reads. Recorders pull rendered samples through [`AudioTap`].
//!
//! ```text
//!  load_audio(url) ──► decode cache ──► Arc<DecodedAudio>
//!                                            │
//!  play(buffer, offset) ──► AudioSession ◄───┘   (resolves once, on natural end)
//!  pause() / resume() / stop()                    (never resolve the session)
//!  current_time() ──► engine time base
//! ```

use super::decoder::{decode_wav, DecodedAudio};
use super::loader::fetch_bytes;
use crate::error::AudioLoadError;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// One play-through of a clip
///
/// Dropped when the clip is paused, stopped or replaced, in which case
/// [`AudioSession::ended`] resolves `false`.
#[derive(Debug)]
pub struct AudioSession {
    id: u64,
    ended: oneshot::Receiver<()>,
}

impl AudioSession {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// `true` when the clip reached its natural end
    pub async fn ended(self) -> bool {
        self.ended.await.is_ok()
    }
}

#[derive(Default)]
struct ClipState {
    buffer: Option<Arc<DecodedAudio>>,
    offset_secs: f64,
    /// Set while playing
    started_at: Option<Instant>,
    session: u64,
    end_task: Option<JoinHandle<()>>,
}

impl ClipState {
    fn position(&self) -> f64 {
        let duration = self.buffer.as_ref().map(|b| b.duration_secs()).unwrap_or(0.0);
        match self.started_at {
            Some(started) => (self.offset_secs + started.elapsed().as_secs_f64()).min(duration),
            None => self.offset_secs,
        }
    }

    fn halt(&mut self) {
        if let Some(task) = self.end_task.take() {
            task.abort();
        }
        self.started_at = None;
        self.session += 1;
    }
}

/// Decoded clips kept for reuse
pub const DEFAULT_CACHE_CAPACITY: usize = 4;

/// Most recently used decodes, oldest evicted first
struct DecodeCache {
    entries: VecDeque<(String, Arc<DecodedAudio>)>,
    capacity: usize,
}

impl DecodeCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn get(&mut self, url: &str) -> Option<Arc<DecodedAudio>> {
        let pos = self.entries.iter().position(|(u, _)| u == url)?;
        let entry = self.entries.remove(pos)?;
        let decoded = entry.1.clone();
        self.entries.push_back(entry);
        Some(decoded)
    }

    fn insert(&mut self, url: &str, decoded: Arc<DecodedAudio>) {
        self.entries.retain(|(u, _)| u != url);
        self.entries.push_back((url.to_string(), decoded));
        while self.entries.len() > self.capacity {
            if let Some((evicted, _)) = self.entries.pop_front() {
                debug!("Audio cache evicted {}", evicted);
            }
        }
    }
}

/// Decode-once clip player with an exact clock
#[derive(Clone)]
pub struct AudioController {
    clip: Arc<Mutex<ClipState>>,
    cache: Arc<Mutex<DecodeCache>>,
    volume: Arc<RwLock<f32>>,
}

impl Default for AudioController {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl AudioController {
    pub fn new(volume: f32) -> Self {
        Self::with_cache_capacity(volume, DEFAULT_CACHE_CAPACITY)
    }

    /// Keep at most `capacity` decoded clips (at least one)
    pub fn with_cache_capacity(volume: f32, capacity: usize) -> Self {
        Self {
            clip: Arc::new(Mutex::new(ClipState::default())),
            cache: Arc::new(Mutex::new(DecodeCache::new(capacity))),
            volume: Arc::new(RwLock::new(volume.clamp(0.0, 1.0))),
        }
    }

    /// URLs with a decode held, oldest first
    pub fn cached_urls(&self) -> Vec<String> {
        self.cache.lock().entries.iter().map(|(u, _)| u.clone()).collect()
    }

    /// Fetch and decode `url`, reusing an earlier decode of the same URL
    pub async fn load_audio(&self, url: &str) -> Result<Arc<DecodedAudio>, AudioLoadError> {
        let cached = self.cache.lock().get(url);
        if let Some(cached) = cached {
            debug!("Audio cache hit: {}", url);
            return Ok(cached);
        }

        let bytes = fetch_bytes(url).await?;
        let decoded = tokio::task::spawn_blocking(move || decode_wav(&bytes))
            .await
            .map_err(|e| AudioLoadError::Decode(format!("decoder task failed: {}", e)))??;
        let decoded = Arc::new(decoded);

        info!(
            "Decoded {} ({:.2}s, {} Hz, {} ch)",
            url,
            decoded.duration_secs(),
            decoded.sample_rate,
            decoded.channels
        );
        self.cache.lock().insert(url, decoded.clone());
        Ok(decoded)
    }

    /// Start `buffer` from `offset_secs`, replacing whatever was playing
    ///
    /// Must be called from within a tokio runtime.
    pub fn play(&self, buffer: Arc<DecodedAudio>, offset_secs: f64) -> AudioSession {
        let duration = buffer.duration_secs();
        let offset = offset_secs.clamp(0.0, duration);
        let (tx, rx) = oneshot::channel();

        let mut clip = self.clip.lock();
        clip.halt();
        let id = clip.session;
        clip.buffer = Some(buffer);
        clip.offset_secs = offset;
        clip.started_at = Some(Instant::now());

        let remaining = Duration::from_secs_f64(duration - offset);
        let state = self.clip.clone();
        clip.end_task = Some(tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            let mut clip = state.lock();
            if clip.session != id || clip.started_at.is_none() {
                return;
            }
            clip.started_at = None;
            clip.offset_secs = duration;
            clip.end_task = None;
            drop(clip);
            debug!("Audio session {} reached its end", id);
            let _ = tx.send(());
        }));

        debug!("Audio session {} playing from {:.3}s", id, offset);
        AudioSession { id, ended: rx }
    }

    /// Capture the position and halt output
    pub fn pause(&self) {
        let mut clip = self.clip.lock();
        if clip.started_at.is_some() {
            clip.offset_secs = clip.position();
            clip.halt();
        }
    }

    /// Continue the current clip from the captured offset
    pub fn resume(&self) -> Option<AudioSession> {
        let (buffer, offset) = {
            let clip = self.clip.lock();
            if clip.started_at.is_some() {
                return None;
            }
            (clip.buffer.clone()?, clip.offset_secs)
        };
        Some(self.play(buffer, offset))
    }

    /// Halt and rewind to zero
    pub fn stop(&self) {
        let mut clip = self.clip.lock();
        clip.halt();
        clip.offset_secs = 0.0;
    }

    /// Position in seconds: live while playing, the captured offset otherwise
    pub fn current_time(&self) -> f64 {
        self.clip.lock().position()
    }

    pub fn is_playing(&self) -> bool {
        self.clip.lock().started_at.is_some()
    }

    pub fn duration(&self) -> Option<f64> {
        self.clip.lock().buffer.as_ref().map(|b| b.duration_secs())
    }

    pub fn set_volume(&self, volume: f32) {
        *self.volume.write() = volume.clamp(0.0, 1.0);
    }

    pub fn volume(&self) -> f32 {
        *self.volume.read()
    }

    /// Output tap for recorders
    pub fn tap(&self) -> AudioTap {
        AudioTap {
            clip: self.clip.clone(),
            volume: self.volume.clone(),
        }
    }
}

/// Read side of the controller's output
#[derive(Clone)]
pub struct AudioTap {
    clip: Arc<Mutex<ClipState>>,
    volume: Arc<RwLock<f32>>,
}

impl AudioTap {
    /// Gain-applied interleaved samples of the current clip for `[from_secs, to_secs)`
    pub fn read_window(&self, from_secs: f64, to_secs: f64) -> Vec<f32> {
        let buffer = match self.clip.lock().buffer.clone() {
            Some(buffer) => buffer,
            None => return Vec::new(),
        };
        let gain = *self.volume.read();
        buffer
            .window(from_secs, to_secs)
            .iter()
            .map(|s| s * gain)
            .collect()
    }

    /// `(sample_rate, channels)` of the current clip
    pub fn format(&self) -> Option<(u32, u16)> {
        self.clip
            .lock()
            .buffer
            .as_ref()
            .map(|b| (b.sample_rate, b.channels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::encode_wav_pcm16;

    fn clip(secs: f64) -> Arc<DecodedAudio> {
        let sample_rate = 1000;
        Arc::new(DecodedAudio {
            sample_rate,
            channels: 1,
            samples: vec![0.5; (secs * sample_rate as f64) as usize],
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_resolves_on_natural_end() {
        let audio = AudioController::default();
        let session = audio.play(clip(1.0), 0.25);
        assert!(audio.is_playing());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!((audio.current_time() - 0.75).abs() < 1e-6);

        assert!(session.ended().await);
        assert!(!audio.is_playing());
        assert!((audio.current_time() - 1.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_does_not_resolve() {
        let audio = AudioController::default();
        let session = audio.play(clip(1.0), 0.0);

        tokio::time::sleep(Duration::from_millis(400)).await;
        audio.pause();
        assert!(!session.ended().await);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!((audio.current_time() - 0.4).abs() < 1e-6);

        let resumed = audio.resume().expect("clip loaded");
        assert!(audio.resume().is_none());
        assert!(resumed.ended().await);
        assert!((audio.current_time() - 1.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_rewinds() {
        let audio = AudioController::default();
        let session = audio.play(clip(2.0), 1.0);
        tokio::time::sleep(Duration::from_millis(200)).await;

        audio.stop();
        assert!(!session.ended().await);
        assert_eq!(audio.current_time(), 0.0);
        assert!(!audio.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_supersedes_session() {
        let audio = AudioController::default();
        let first = audio.play(clip(1.0), 0.0);
        let second = audio.play(clip(1.0), 0.5);

        assert!(!first.ended().await);
        assert!(second.ended().await);
    }

    #[test]
    fn test_volume_clamped_and_applied() {
        let audio = AudioController::new(3.0);
        assert_eq!(audio.volume(), 1.0);
        audio.set_volume(-1.0);
        assert_eq!(audio.volume(), 0.0);

        audio.set_volume(0.5);
        audio.clip.lock().buffer = Some(clip(1.0));
        let tap = audio.tap();
        let window = tap.read_window(0.0, 0.01);
        assert_eq!(window, vec![0.25; 10]);
        assert_eq!(tap.format(), Some((1000, 1)));
    }

    #[tokio::test]
    async fn test_decode_cache_is_bounded() {
        let dir = std::env::temp_dir();
        let urls: Vec<String> = (0..3)
            .map(|i| {
                let path = dir.join(format!("replay_engine_cache_{}.wav", i));
                std::fs::write(&path, encode_wav_pcm16(&clip(0.1))).unwrap();
                path.display().to_string()
            })
            .collect();

        let audio = AudioController::with_cache_capacity(1.0, 2);
        let first = audio.load_audio(&urls[0]).await.unwrap();
        audio.load_audio(&urls[1]).await.unwrap();
        // A hit refreshes the entry, so the second URL is evicted next
        let again = audio.load_audio(&urls[0]).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        audio.load_audio(&urls[2]).await.unwrap();
        assert_eq!(audio.cached_urls(), vec![urls[0].clone(), urls[2].clone()]);

        for url in &urls {
            std::fs::remove_file(url).ok();
        }
    }

    #[tokio::test]
    async fn test_load_failure() {
        let audio = AudioController::default();
        assert!(audio.load_audio("/missing/clip.wav").await.is_err());
        assert!(audio.load_audio("not-a-scheme://x").await.is_err());
    }
}
