//! Catalog-side track descriptions

use serde::{Deserialize, Serialize};

/// Resolved track metadata
///
/// Immutable once resolved. Title/artist/album also key the synced lyrics
/// lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// Catalog identifier (video id)
    pub identifier: String,
    pub title: String,
    pub artist: String,
    /// Empty when the catalog has no album for the track
    pub album: String,
    /// Cover art location, if the catalog offers one
    pub cover_art_url: Option<String>,
}

/// Direct, time-limited audio stream for a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectStream {
    pub url: String,
    /// e.g. `audio/webm; codecs="opus"`
    pub mime_type: String,
    /// Bits per second
    pub bitrate: u64,
    pub approx_duration_ms: u64,
}

impl DirectStream {
    /// Media type without codec parameters
    pub fn media_type(&self) -> &str {
        self.mime_type
            .split(';')
            .next()
            .map(str::trim)
            .unwrap_or(self.mime_type.as_str())
    }
}

/// One hit from a catalog search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub identifier: String,
    pub song_name: String,
    pub artist_name: String,
    pub album_name: String,
    pub art: String,
}
