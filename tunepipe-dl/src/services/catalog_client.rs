//! YouTube Music catalog client
//!
//! Resolves track metadata, direct audio streams, plain lyrics and search
//! results through the InnerTube JSON API. The service only consumes these
//! endpoints; ranking and availability are the catalog's business.
//!
//! "No such track" (`NotFound`) is kept apart from transport failures
//! (`Upstream`) and from responses we cannot interpret (`Malformed`).

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tunepipe_common::config::CatalogConfig;

use crate::models::{DirectStream, SearchResult, TrackMetadata};

const WEB_CLIENT_NAME: &str = "WEB_REMIX";
const WEB_CLIENT_VERSION: &str = "1.20240918.01.00";
const WEB_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Player client that answers with plain (non-ciphered) stream URLs
const ANDROID_CLIENT_NAME: &str = "ANDROID_MUSIC";
const ANDROID_CLIENT_VERSION: &str = "7.11.50";
const ANDROID_SDK_VERSION: u32 = 30;
const ANDROID_USER_AGENT: &str =
    "com.google.android.apps.youtube.music/7.11.50 (Linux; U; Android 11) gzip";

/// Search filter restricting results to songs
const SONGS_FILTER_PARAMS: &str = "EgWKAQIIAWoMEA4QChADEAQQCRAF";

const PAGE_TYPE_ARTIST: &str = "MUSIC_PAGE_TYPE_ARTIST";
const PAGE_TYPE_ALBUM: &str = "MUSIC_PAGE_TYPE_ALBUM";

/// Catalog client errors
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog has no playable track with this identifier
    #[error("Track not found: {0}")]
    NotFound(String),

    /// Network failure, timeout or non-success status
    #[error("Catalog unavailable: {0}")]
    Upstream(String),

    /// Response did not have the expected shape
    #[error("Malformed catalog response: {0}")]
    Malformed(String),
}

/// Catalog capability injected into handlers and the orchestrator
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Songs matching a free-text query
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, CatalogError>;

    /// Title, artist, album and cover art for a track
    async fn resolve_metadata(&self, track_id: &str) -> Result<TrackMetadata, CatalogError>;

    /// Direct, time-limited audio URL for a track
    async fn resolve_direct_stream(&self, track_id: &str) -> Result<DirectStream, CatalogError>;

    /// Unsynchronized lyrics text, `None` when the catalog has none
    async fn fetch_plain_lyrics(&self, track_id: &str) -> Result<Option<String>, CatalogError>;
}

/// Catalog identifiers are URL-safe base64-ish tokens
pub fn is_valid_track_id(track_id: &str) -> bool {
    !track_id.is_empty()
        && track_id.len() <= 64
        && track_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[derive(Debug, Clone, Copy)]
enum ClientProfile {
    Web,
    Android,
}

/// InnerTube-backed catalog client
pub struct YtMusicClient {
    http_client: reqwest::Client,
    base_url: String,
    hl: String,
    gl: String,
    request_timeout: Duration,
}

impl YtMusicClient {
    /// `http_client` is the process-wide client; `request_timeout` bounds
    /// every call made through this adapter.
    pub fn new(http_client: reqwest::Client, config: &CatalogConfig, request_timeout: Duration) -> Self {
        Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            hl: config.hl.clone(),
            gl: config.gl.clone(),
            request_timeout,
        }
    }

    fn context(&self, profile: ClientProfile) -> Value {
        match profile {
            ClientProfile::Web => json!({
                "client": {
                    "clientName": WEB_CLIENT_NAME,
                    "clientVersion": WEB_CLIENT_VERSION,
                    "hl": self.hl,
                    "gl": self.gl,
                }
            }),
            ClientProfile::Android => json!({
                "client": {
                    "clientName": ANDROID_CLIENT_NAME,
                    "clientVersion": ANDROID_CLIENT_VERSION,
                    "androidSdkVersion": ANDROID_SDK_VERSION,
                    "hl": self.hl,
                    "gl": self.gl,
                }
            }),
        }
    }

    async fn post(
        &self,
        endpoint: &str,
        mut body: Value,
        profile: ClientProfile,
    ) -> Result<Value, CatalogError> {
        body["context"] = self.context(profile);
        let user_agent = match profile {
            ClientProfile::Web => WEB_USER_AGENT,
            ClientProfile::Android => ANDROID_USER_AGENT,
        };
        let url = format!("{}/{}?prettyPrint=false", self.base_url, endpoint);

        tracing::debug!(endpoint = %endpoint, "Querying catalog");

        let response = self
            .http_client
            .post(&url)
            .timeout(self.request_timeout)
            .header(USER_AGENT, user_agent)
            .json(&body)
            .send()
            .await
            .map_err(|e| CatalogError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CatalogError::Upstream(format!(
                "{} returned HTTP {}: {}",
                endpoint,
                status.as_u16(),
                error_text.chars().take(200).collect::<String>()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| CatalogError::Malformed(e.to_string()))
    }

    async fn watch_next(&self, track_id: &str) -> Result<Value, CatalogError> {
        self.post(
            "next",
            json!({ "videoId": track_id, "isAudioOnly": true }),
            ClientProfile::Web,
        )
        .await
    }
}

#[async_trait]
impl CatalogClient for YtMusicClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, CatalogError> {
        let response = self
            .post(
                "search",
                json!({ "query": query, "params": SONGS_FILTER_PARAMS }),
                ClientProfile::Web,
            )
            .await?;
        let results = parse_search_response(&response);
        tracing::debug!(query = %query, count = results.len(), "Catalog search");
        Ok(results)
    }

    async fn resolve_metadata(&self, track_id: &str) -> Result<TrackMetadata, CatalogError> {
        let response = self.watch_next(track_id).await?;
        let metadata = parse_next_response(track_id, &response)?;
        tracing::info!(
            track_id = %track_id,
            title = %metadata.title,
            artist = %metadata.artist,
            "Resolved track metadata"
        );
        Ok(metadata)
    }

    async fn resolve_direct_stream(&self, track_id: &str) -> Result<DirectStream, CatalogError> {
        let response = self
            .post(
                "player",
                json!({ "videoId": track_id, "contentCheckOk": true, "racyCheckOk": true }),
                ClientProfile::Android,
            )
            .await?;
        parse_player_response(track_id, &response)
    }

    async fn fetch_plain_lyrics(&self, track_id: &str) -> Result<Option<String>, CatalogError> {
        let next = self.watch_next(track_id).await?;
        let Some(browse_id) = lyrics_browse_id(&next) else {
            return Ok(None);
        };
        let response = self
            .post("browse", json!({ "browseId": browse_id }), ClientProfile::Web)
            .await?;
        Ok(parse_lyrics_response(&response))
    }
}

// ============================================================================
// Response parsing
// ============================================================================

fn text_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

/// Largest thumbnail in a `thumbnails` array
fn last_thumbnail(thumbnails: Option<&Value>) -> Option<String> {
    thumbnails
        .and_then(Value::as_array)
        .and_then(|list| list.last())
        .and_then(|t| t.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn page_type(run: &Value) -> Option<&str> {
    text_at(
        run,
        "/navigationEndpoint/browseEndpoint/browseEndpointContextSupportedConfigs/browseEndpointContextMusicConfig/pageType",
    )
}

/// Split byline runs into (artist, album) by their link targets
///
/// Several artist runs are joined with ", ". Without any artist link the
/// first run's text stands in for the artist.
fn artist_and_album(runs: &[Value]) -> (String, String) {
    let artists: Vec<&str> = runs
        .iter()
        .filter(|run| page_type(run) == Some(PAGE_TYPE_ARTIST))
        .filter_map(|run| run.get("text").and_then(Value::as_str))
        .collect();
    let album = runs
        .iter()
        .find(|run| page_type(run) == Some(PAGE_TYPE_ALBUM))
        .and_then(|run| run.get("text").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    let artist = if artists.is_empty() {
        runs.first()
            .and_then(|run| run.get("text").and_then(Value::as_str))
            .unwrap_or_default()
            .to_string()
    } else {
        artists.join(", ")
    };

    (artist, album)
}

fn runs(value: Option<&Value>) -> &[Value] {
    value.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

/// Song shelf items from a filtered search
pub fn parse_search_response(response: &Value) -> Vec<SearchResult> {
    let sections = response
        .pointer("/contents/tabbedSearchResultsRenderer/tabs/0/tabRenderer/content/sectionListRenderer/contents")
        .and_then(Value::as_array);

    let Some(sections) = sections else {
        return Vec::new();
    };

    sections
        .iter()
        .filter_map(|section| section.pointer("/musicShelfRenderer/contents").and_then(Value::as_array))
        .flatten()
        .filter_map(|item| item.get("musicResponsiveListItemRenderer"))
        .filter_map(parse_search_item)
        .collect()
}

fn parse_search_item(item: &Value) -> Option<SearchResult> {
    let identifier = text_at(item, "/playlistItemData/videoId").or_else(|| {
        text_at(
            item,
            "/overlay/musicItemThumbnailOverlayRenderer/content/musicPlayButtonRenderer/playNavigationEndpoint/watchEndpoint/videoId",
        )
    })?;
    let song_name = text_at(
        item,
        "/flexColumns/0/musicResponsiveListItemFlexColumnRenderer/text/runs/0/text",
    )?;
    let (artist_name, album_name) = artist_and_album(runs(
        item.pointer("/flexColumns/1/musicResponsiveListItemFlexColumnRenderer/text/runs"),
    ));
    let art = last_thumbnail(item.pointer("/thumbnail/musicThumbnailRenderer/thumbnail/thumbnails"))
        .unwrap_or_default();

    Some(SearchResult {
        identifier: identifier.to_string(),
        song_name: song_name.to_string(),
        artist_name,
        album_name,
        art,
    })
}

fn watch_tabs(response: &Value) -> Option<&Vec<Value>> {
    response
        .pointer("/contents/singleColumnMusicWatchNextResultsRenderer/tabbedRenderer/watchNextTabbedResultsRenderer/tabs")
        .and_then(Value::as_array)
}

/// Track metadata from the first item of the watch queue
pub fn parse_next_response(track_id: &str, response: &Value) -> Result<TrackMetadata, CatalogError> {
    let tabs = watch_tabs(response).ok_or_else(|| CatalogError::NotFound(track_id.to_string()))?;
    let video = tabs
        .first()
        .and_then(|tab| {
            tab.pointer("/tabRenderer/content/musicQueueRenderer/content/playlistPanelRenderer/contents/0/playlistPanelVideoRenderer")
        })
        .ok_or_else(|| CatalogError::NotFound(track_id.to_string()))?;

    let title = text_at(video, "/title/runs/0/text")
        .ok_or_else(|| CatalogError::Malformed(format!("no title for {}", track_id)))?;
    let (artist, album) = artist_and_album(runs(video.pointer("/longBylineText/runs")));

    Ok(TrackMetadata {
        identifier: text_at(video, "/videoId").unwrap_or(track_id).to_string(),
        title: title.to_string(),
        artist,
        album,
        cover_art_url: last_thumbnail(video.pointer("/thumbnail/thumbnails")),
    })
}

/// Browse id of the lyrics tab, if the track has one
pub fn lyrics_browse_id(response: &Value) -> Option<String> {
    let tab = watch_tabs(response)?.get(1)?.get("tabRenderer")?;
    if tab.get("unselectable").is_some() {
        return None;
    }
    text_at(tab, "/endpoint/browseEndpoint/browseId").map(str::to_string)
}

/// Lyrics text from a lyrics browse page
pub fn parse_lyrics_response(response: &Value) -> Option<String> {
    text_at(
        response,
        "/contents/sectionListRenderer/contents/0/musicDescriptionShelfRenderer/description/runs/0/text",
    )
    .map(str::to_string)
    .filter(|text| !text.trim().is_empty())
}

/// Best audio-only format with a plain URL
///
/// `approxDurationMs` arrives as a JSON string and is parsed strictly as an
/// unsigned integer; anything else fails closed.
pub fn parse_player_response(track_id: &str, response: &Value) -> Result<DirectStream, CatalogError> {
    let playability = text_at(response, "/playabilityStatus/status").unwrap_or("UNKNOWN");
    if playability != "OK" {
        let reason = text_at(response, "/playabilityStatus/reason").unwrap_or(playability);
        tracing::debug!(track_id = %track_id, reason = %reason, "Track not playable");
        return Err(CatalogError::NotFound(track_id.to_string()));
    }

    let formats = response
        .pointer("/streamingData/adaptiveFormats")
        .and_then(Value::as_array)
        .ok_or_else(|| CatalogError::Malformed(format!("no streamingData for {}", track_id)))?;

    let best = formats
        .iter()
        .filter(|f| text_at(f, "/mimeType").is_some_and(|m| m.starts_with("audio/")))
        .filter(|f| text_at(f, "/url").is_some())
        .max_by_key(|f| f.get("bitrate").and_then(Value::as_u64).unwrap_or(0))
        .ok_or_else(|| CatalogError::NotFound(track_id.to_string()))?;

    let approx_duration_ms = parse_duration_ms(best.get("approxDurationMs"))?;

    Ok(DirectStream {
        url: text_at(best, "/url").unwrap_or_default().to_string(),
        mime_type: text_at(best, "/mimeType").unwrap_or_default().to_string(),
        bitrate: best.get("bitrate").and_then(Value::as_u64).unwrap_or(0),
        approx_duration_ms,
    })
}

/// Strict non-negative integer from a string or number field
fn parse_duration_ms(value: Option<&Value>) -> Result<u64, CatalogError> {
    match value {
        Some(Value::String(s)) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s
            .parse::<u64>()
            .map_err(|e| CatalogError::Malformed(format!("approxDurationMs {:?}: {}", s, e))),
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| CatalogError::Malformed(format!("approxDurationMs {}", n))),
        other => Err(CatalogError::Malformed(format!(
            "approxDurationMs {:?}",
            other
        ))),
    }
}
