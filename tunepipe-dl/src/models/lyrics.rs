//! Synced lyric line

use serde::{Deserialize, Serialize};

/// One timed lyric line
///
/// Sequences of these are ordered ascending by `timestamp_ms`; equal
/// timestamps keep their source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricLine {
    pub text: String,
    /// Offset from the start of the track
    pub timestamp_ms: u64,
}

impl LyricLine {
    pub fn new(text: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            text: text.into(),
            timestamp_ms,
        }
    }
}
