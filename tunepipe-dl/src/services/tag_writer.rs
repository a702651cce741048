//! ID3v2.4 tag writer
//!
//! Writes title/artist/album text frames plus optional cover art (APIC),
//! unsynchronized lyrics (USLT) and synchronized lyrics (SYLT, millisecond
//! timestamps) into an existing MP3 file. Blocking; run it off the async
//! executor.

use id3::frame::{
    Lyrics, Picture, PictureType, SynchronisedLyrics, SynchronisedLyricsType, TimestampFormat,
};
use id3::{Tag, TagLike, Version};
use std::path::Path;
use thiserror::Error;

use crate::models::LyricLine;

const LYRICS_LANGUAGE: &str = "eng";

#[derive(Debug, Error)]
pub enum TagWriteError {
    #[error("ID3 write failed: {0}")]
    Id3(#[from] id3::Error),

    #[error("Cannot tag {0}: file does not exist")]
    MissingFile(String),
}

/// Front cover image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverArt {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Everything embedded into one artifact
#[derive(Debug, Clone, Default)]
pub struct TrackTags {
    pub title: String,
    pub artist: String,
    /// Empty means no TALB frame, so readers report no album
    pub album: String,
    pub plain_lyrics: Option<String>,
    /// Ordered by timestamp; empty means no SYLT frame
    pub synced_lyrics: Vec<LyricLine>,
    pub cover_art: Option<CoverArt>,
}

impl TrackTags {
    fn to_tag(&self) -> Tag {
        let mut tag = Tag::new();
        tag.set_title(self.title.as_str());
        tag.set_artist(self.artist.as_str());
        if !self.album.is_empty() {
            tag.set_album(self.album.as_str());
        }

        if let Some(cover) = &self.cover_art {
            tag.add_frame(Picture {
                mime_type: cover.mime_type.clone(),
                picture_type: PictureType::CoverFront,
                description: "Cover".to_string(),
                data: cover.data.clone(),
            });
        }

        if let Some(text) = &self.plain_lyrics {
            tag.add_frame(Lyrics {
                lang: LYRICS_LANGUAGE.to_string(),
                description: String::new(),
                text: text.clone(),
            });
        }

        if !self.synced_lyrics.is_empty() {
            let content = self
                .synced_lyrics
                .iter()
                .map(|line| {
                    // SYLT stores u32 milliseconds
                    let ms = u32::try_from(line.timestamp_ms).unwrap_or(u32::MAX);
                    (ms, line.text.clone())
                })
                .collect();
            tag.add_frame(SynchronisedLyrics {
                lang: LYRICS_LANGUAGE.to_string(),
                timestamp_format: TimestampFormat::Ms,
                content_type: SynchronisedLyricsType::Lyrics,
                description: String::new(),
                content,
            });
        }

        tag
    }
}

/// Replace any existing tag on `path` with `tags`
pub fn write_tags(path: &Path, tags: &TrackTags) -> Result<(), TagWriteError> {
    if !path.is_file() {
        return Err(TagWriteError::MissingFile(path.display().to_string()));
    }

    tags.to_tag().write_to_path(path, Version::Id3v24)?;

    tracing::debug!(
        path = %path.display(),
        cover = tags.cover_art.is_some(),
        plain_lyrics = tags.plain_lyrics.is_some(),
        synced_lines = tags.synced_lyrics.len(),
        "Tags written"
    );
    Ok(())
}
