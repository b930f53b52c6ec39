//! Narration audio: fetch, decode, clocked playback and the recorder tap

mod controller;
mod decoder;
mod loader;

pub use controller::{AudioController, AudioSession, AudioTap, DEFAULT_CACHE_CAPACITY};
pub use decoder::{decode_wav, encode_wav_pcm16, DecodedAudio};
pub use loader::fetch_bytes;
