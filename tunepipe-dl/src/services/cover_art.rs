//! Cover art download

use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use thiserror::Error;

use super::tag_writer::CoverArt;

/// Largest image we are willing to embed
const MAX_COVER_BYTES: u64 = 10 * 1024 * 1024;

/// Why cover art could not be fetched
///
/// Never fails a job; the message lands in the enrichment report.
#[derive(Debug, Error)]
pub enum CoverArtError {
    #[error("Cover art returned HTTP {0}")]
    Status(u16),

    #[error("Cover art transport error: {0}")]
    Transport(String),

    /// Declared or received size over the cap
    #[error("Cover art larger than {limit} bytes (at least {size})")]
    TooLarge { size: u64, limit: u64 },

    #[error("Cover art response was empty")]
    Empty,

    #[error("Cover art is not an image")]
    NotImage,
}

/// Fetch the image at `url`
///
/// The body is read incrementally and abandoned as soon as it passes
/// `MAX_COVER_BYTES`.
pub async fn fetch_cover_art(
    http_client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<CoverArt, CoverArtError> {
    let response = http_client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| CoverArtError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(CoverArtError::Status(status.as_u16()));
    }

    if let Some(declared_len) = response.content_length() {
        if declared_len > MAX_COVER_BYTES {
            return Err(CoverArtError::TooLarge {
                size: declared_len,
                limit: MAX_COVER_BYTES,
            });
        }
    }

    let declared = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

    let mut data = Vec::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| CoverArtError::Transport(e.to_string()))?;
        let size = (data.len() + chunk.len()) as u64;
        if size > MAX_COVER_BYTES {
            return Err(CoverArtError::TooLarge {
                size,
                limit: MAX_COVER_BYTES,
            });
        }
        data.extend_from_slice(&chunk);
    }

    if data.is_empty() {
        return Err(CoverArtError::Empty);
    }

    let mime_type = resolve_mime_type(declared.as_deref(), &data).ok_or(CoverArtError::NotImage)?;

    Ok(CoverArt { mime_type, data })
}

/// Declared image type, else sniffed from the bytes
fn resolve_mime_type(declared: Option<&str>, data: &[u8]) -> Option<String> {
    match declared {
        Some(mime) if mime.starts_with("image/") => Some(mime.to_string()),
        _ => infer::get(data)
            .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
            .map(|kind| kind.mime_type().to_string()),
    }
}
