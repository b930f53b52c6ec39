//! Error types
//!
//! Playback itself never fails from the caller's point of view: audio problems
//! degrade to wall-clock timing and bad event references are skipped. Errors
//! only surface from loading things (audio, config, timeline JSON).

use thiserror::Error;

/// Audio could not be fetched or decoded
#[derive(Debug, Error)]
pub enum AudioLoadError {
    #[error("failed to fetch audio from {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("failed to read audio file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
}

/// Configuration could not be loaded
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: String, message: String },

    #[error("unsupported config extension: {0}")]
    UnsupportedExtension(String),
}

/// Timeline or segment JSON is malformed
#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("invalid timeline JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid timeline: {0}")]
    Invalid(String),
}

/// Umbrella error for the crate
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error(transparent)]
    AudioLoad(#[from] AudioLoadError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Timeline(#[from] TimelineError),
}

/// Result alias for playback operations
pub type PlaybackResult<T> = Result<T, PlaybackError>;
