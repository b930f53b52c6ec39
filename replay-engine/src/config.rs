//! Playback configuration
//!
//! Loaded from TOML, YAML or JSON (picked by file extension). Every field has a
//! default, so an empty file or no file at all gives a working setup.
//!
//! Lookup order for [`PlaybackConfig::load`]:
//! 1. `REPLAY_CONFIG_PATH`
//! 2. `./replay.toml`
//! 3. `<config dir>/replay-studio/replay.toml`
//!
//! ```toml
//! frame_interval_ms = 16
//!
//! [typewriter]
//! jitter = 0.2
//! cursor_char = "|"
//!
//! [notebook]
//! settle_delay_ms = 600
//! ```

use crate::error::ConfigError;
use replay_widgets::{PacingConfig, TypewriterOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Env var naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "REPLAY_CONFIG_PATH";

const DEFAULT_CONFIG_FILE: &str = "replay.toml";

/// Top-level playback configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Progress loop cadence (display refresh)
    pub frame_interval_ms: u64,
    /// Typing duration for `type_code` events that carry none
    pub default_typing_duration_ms: u64,
    /// Initial audio gain, clamped to [0, 1]
    pub volume: f32,
    pub typewriter: TypewriterConfig,
    pub notebook: NotebookConfig,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            default_typing_duration_ms: 2000,
            volume: 1.0,
            typewriter: TypewriterConfig::default(),
            notebook: NotebookConfig::default(),
        }
    }
}

/// Typewriter pacing
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct TypewriterConfig {
    pub jitter: f64,
    pub newline_pause_ms: u64,
    pub punctuation_pause_ms: u64,
    pub space_factor: f64,
    pub min_char_delay_ms: u64,
    pub cursor_char: Option<char>,
    /// Fixed seed for reproducible takes
    pub seed: Option<u64>,
}

impl Default for TypewriterConfig {
    fn default() -> Self {
        Self {
            jitter: 0.3,
            newline_pause_ms: 150,
            punctuation_pause_ms: 60,
            space_factor: 0.5,
            min_char_delay_ms: 5,
            cursor_char: None,
            seed: None,
        }
    }
}

impl TypewriterConfig {
    pub fn pacing(&self) -> PacingConfig {
        PacingConfig {
            jitter: self.jitter,
            newline_pause: Duration::from_millis(self.newline_pause_ms),
            punctuation_pause: Duration::from_millis(self.punctuation_pause_ms),
            space_factor: self.space_factor,
            min_char_delay: Duration::from_millis(self.min_char_delay_ms),
            seed: self.seed,
        }
    }

    pub fn options(&self) -> TypewriterOptions {
        TypewriterOptions {
            cursor_char: self.cursor_char,
        }
    }
}

/// Notebook surface timing
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotebookConfig {
    pub settle_delay_ms: u64,
}

impl Default for NotebookConfig {
    fn default() -> Self {
        Self { settle_delay_ms: 600 }
    }
}

impl NotebookConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl PlaybackConfig {
    /// Load from the first config file found, or fall back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        match Self::locate() {
            Some(path) => Self::from_path(&path),
            None => {
                debug!("No playback config found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load an explicit config file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: shown.clone(),
            source,
        })?;

        let parse_err = |message: String| ConfigError::Parse {
            path: shown.clone(),
            message,
        };

        let config: PlaybackConfig = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => toml::from_str(&contents).map_err(|e| parse_err(e.to_string()))?,
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&contents).map_err(|e| parse_err(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&contents).map_err(|e| parse_err(e.to_string()))?,
            other => {
                return Err(ConfigError::UnsupportedExtension(
                    other.unwrap_or("<none>").to_string(),
                ))
            }
        };

        info!("Loaded playback config from {}", shown);
        Ok(config)
    }

    fn locate() -> Option<PathBuf> {
        if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(explicit));
        }

        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }

        let mut user = dirs::config_dir()?;
        user.push("replay-studio");
        user.push(DEFAULT_CONFIG_FILE);
        user.exists().then_some(user)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn default_typing_duration(&self) -> Duration {
        Duration::from_millis(self.default_typing_duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = PlaybackConfig::default();
        assert_eq!(config.frame_interval(), Duration::from_millis(16));
        assert_eq!(config.default_typing_duration(), Duration::from_millis(2000));
        assert_eq!(config.notebook.settle_delay(), Duration::from_millis(600));

        let pacing = config.typewriter.pacing();
        assert_eq!(pacing, PacingConfig::default());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let path = write_temp(
            "replay_config_test.toml",
            "frame_interval_ms = 33\n\n[typewriter]\njitter = 0.0\ncursor_char = \"|\"\n",
        );
        let config = PlaybackConfig::from_path(&path).unwrap();

        assert_eq!(config.frame_interval_ms, 33);
        assert_eq!(config.typewriter.jitter, 0.0);
        assert_eq!(config.typewriter.cursor_char, Some('|'));
        assert_eq!(config.typewriter.newline_pause_ms, 150);
        assert_eq!(config.notebook.settle_delay_ms, 600);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_json_and_yaml() {
        let json = write_temp("replay_config_test.json", r#"{"notebook": {"settle_delay_ms": 10}}"#);
        let yaml = write_temp("replay_config_test.yaml", "volume: 0.5\n");

        assert_eq!(PlaybackConfig::from_path(&json).unwrap().notebook.settle_delay_ms, 10);
        assert_eq!(PlaybackConfig::from_path(&yaml).unwrap().volume, 0.5);

        std::fs::remove_file(&json).ok();
        std::fs::remove_file(&yaml).ok();
    }

    #[test]
    fn test_errors() {
        let missing = PlaybackConfig::from_path("/definitely/not/here.toml");
        assert!(matches!(missing, Err(ConfigError::Read { .. })));

        let ini = write_temp("replay_config_test.ini", "x=1");
        assert!(matches!(
            PlaybackConfig::from_path(&ini),
            Err(ConfigError::UnsupportedExtension(_))
        ));
        std::fs::remove_file(&ini).ok();

        let broken = write_temp("replay_config_broken.toml", "frame_interval_ms = \"fast\"");
        assert!(matches!(
            PlaybackConfig::from_path(&broken),
            Err(ConfigError::Parse { .. })
        ));
        std::fs::remove_file(&broken).ok();
    }
}
