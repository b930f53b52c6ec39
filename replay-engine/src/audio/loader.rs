//! Audio source fetch
//!
//! `http(s)://` goes through reqwest; `file://` and bare paths are read from
//! disk. Everything else is rejected before any I/O.

use crate::error::AudioLoadError;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, PartialEq, Eq)]
enum Source {
    Http(String),
    File(PathBuf),
}

fn classify(url: &str) -> Result<Source, AudioLoadError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(AudioLoadError::Fetch {
            url: url.to_string(),
            message: "empty audio URL".to_string(),
        });
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return Ok(Source::Http(trimmed.to_string()));
    }
    if let Some(path) = trimmed.strip_prefix("file://") {
        return Ok(Source::File(PathBuf::from(path)));
    }
    if let Some((scheme, _)) = trimmed.split_once("://") {
        return Err(AudioLoadError::Fetch {
            url: url.to_string(),
            message: format!("unsupported scheme '{}'", scheme),
        });
    }
    Ok(Source::File(PathBuf::from(trimmed)))
}

/// Fetch the raw bytes behind an audio URL
pub async fn fetch_bytes(url: &str) -> Result<Vec<u8>, AudioLoadError> {
    match classify(url)? {
        Source::Http(url) => {
            debug!("Fetching audio over HTTP: {}", url);
            let fetch_err = |e: reqwest::Error| AudioLoadError::Fetch {
                url: url.clone(),
                message: e.to_string(),
            };
            let response = reqwest::get(&url)
                .await
                .and_then(|r| r.error_for_status())
                .map_err(fetch_err)?;
            let bytes = response.bytes().await.map_err(fetch_err)?;
            Ok(bytes.to_vec())
        }
        Source::File(path) => {
            debug!("Reading audio from {}", path.display());
            tokio::fs::read(&path).await.map_err(|source| AudioLoadError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(
            classify("https://cdn.example.com/a.wav").unwrap(),
            Source::Http("https://cdn.example.com/a.wav".to_string())
        );
        assert_eq!(
            classify("file:///tmp/a.wav").unwrap(),
            Source::File(PathBuf::from("/tmp/a.wav"))
        );
        assert_eq!(
            classify("audio/seg_1.wav").unwrap(),
            Source::File(PathBuf::from("audio/seg_1.wav"))
        );
        assert!(matches!(classify("ftp://host/a.wav"), Err(AudioLoadError::Fetch { .. })));
        assert!(matches!(classify("  "), Err(AudioLoadError::Fetch { .. })));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = fetch_bytes("/no/such/narration.wav").await;
        assert!(matches!(result, Err(AudioLoadError::Io { .. })));
    }
}
