//! LRCLIB synced lyrics client
//!
//! Looks up time-synchronized lyrics (LRC text) by artist, title, album and
//! duration. "No lyrics for this track" is a normal answer, not an error.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tunepipe_common::config::LyricsConfig;

/// Lyrics client errors
#[derive(Debug, Error)]
pub enum LyricsError {
    #[error("Lyrics service unavailable: {0}")]
    Upstream(String),

    #[error("Malformed lyrics response: {0}")]
    Malformed(String),
}

/// Synced lyrics capability
#[async_trait]
pub trait LyricsClient: Send + Sync {
    /// LRC text for the track, `Ok(None)` when the service has none
    async fn fetch_synced_lyrics(
        &self,
        artist: &str,
        title: &str,
        album: &str,
        duration_ms: u64,
    ) -> Result<Option<String>, LyricsError>;
}

/// `GET /get` response (only the fields we use)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LrclibRecord {
    #[serde(default)]
    synced_lyrics: Option<String>,
    #[serde(default)]
    instrumental: bool,
}

pub struct LrclibClient {
    http_client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
}

impl LrclibClient {
    pub fn new(http_client: reqwest::Client, config: &LyricsConfig, request_timeout: Duration) -> Self {
        Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout,
        }
    }
}

/// LRCLIB matches on whole seconds; fractional input is accepted
fn duration_param(duration_ms: u64) -> String {
    format!("{}.{:03}", duration_ms / 1000, duration_ms % 1000)
}

#[async_trait]
impl LyricsClient for LrclibClient {
    async fn fetch_synced_lyrics(
        &self,
        artist: &str,
        title: &str,
        album: &str,
        duration_ms: u64,
    ) -> Result<Option<String>, LyricsError> {
        let url = format!("{}/get", self.base_url);
        let duration = duration_param(duration_ms);

        tracing::debug!(artist = %artist, title = %title, duration = %duration, "Querying LRCLIB");

        let response = self
            .http_client
            .get(&url)
            .timeout(self.request_timeout)
            .query(&[
                ("artist_name", artist),
                ("track_name", title),
                ("album_name", album),
                ("duration", duration.as_str()),
            ])
            .send()
            .await
            .map_err(|e| LyricsError::Upstream(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(LyricsError::Upstream(format!("HTTP {}", status.as_u16())));
        }

        let record: LrclibRecord = response
            .json()
            .await
            .map_err(|e| LyricsError::Malformed(e.to_string()))?;

        if record.instrumental {
            return Ok(None);
        }

        Ok(record.synced_lyrics.filter(|text| !text.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_param() {
        assert_eq!(duration_param(215_041), "215.041");
        assert_eq!(duration_param(5), "0.005");
        assert_eq!(duration_param(0), "0.000");
    }

    #[test]
    fn test_record_deserialization() {
        let record: LrclibRecord = serde_json::from_str(
            r#"{"id": 1, "trackName": "x", "syncedLyrics": "[00:01.00] hi", "plainLyrics": "hi"}"#,
        )
        .unwrap();
        assert_eq!(record.synced_lyrics.as_deref(), Some("[00:01.00] hi"));
        assert!(!record.instrumental);

        let record: LrclibRecord =
            serde_json::from_str(r#"{"syncedLyrics": null, "instrumental": true}"#).unwrap();
        assert!(record.synced_lyrics.is_none());
        assert!(record.instrumental);
    }
}
