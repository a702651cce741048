//! Shared test fixtures
//!
//! Fake catalog and lyrics providers, an in-process upstream HTTP server for
//! source audio and cover art, a fake ffmpeg script, and a service builder
//! wired like `main`.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use tunepipe_common::config::{TranscoderConfig, WorkerConfig};
use tunepipe_common::events::EventBus;
use tunepipe_common::JobStatus;
use uuid::Uuid;

use tunepipe_dl::db::{init_database_pool, jobs::load_job};
use tunepipe_dl::models::{DirectStream, DownloadJob, SearchResult, TrackMetadata};
use tunepipe_dl::services::{
    CatalogClient, CatalogError, LyricsClient, LyricsError, PipelineServices, StreamFetcher,
    Transcoder,
};
use tunepipe_dl::AppState;

pub const TRACK_ID: &str = "Wu5FY8J6P8Q";

pub const SYNCED_LRC: &str = "[ar:IU]\n[00:01.50] first line\n[00:03.25] second line\n";

pub const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
];

/// MPEG frame sync followed by filler
pub fn fake_mp3_bytes(len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len.max(4)];
    data[0] = 0xFF;
    data[1] = 0xFB;
    data[2] = 0x90;
    for (i, byte) in data.iter_mut().enumerate().skip(4) {
        *byte = (i % 251) as u8;
    }
    data
}

// ============================================================================
// Upstream server
// ============================================================================

/// Serve `router` on an ephemeral local port
pub async fn spawn_upstream(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// `/audio` (declared length, 10 chunks), `/cover.png`; everything else 404
pub fn source_router(audio: Vec<u8>) -> Router {
    let audio = Bytes::from(audio);
    Router::new()
        .route(
            "/audio",
            get(move || {
                let audio = audio.clone();
                async move { chunked_response(audio, 10) }
            }),
        )
        .route(
            "/cover.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES) }),
        )
        .fallback(|| async { StatusCode::NOT_FOUND })
}

/// Response streaming `data` in `pieces` chunks with a Content-Length header
pub fn chunked_response(data: Bytes, pieces: usize) -> Response {
    let total = data.len();
    let step = total.div_ceil(pieces.max(1)).max(1);
    let chunks: Vec<Result<Bytes, std::io::Error>> = (0..total)
        .step_by(step)
        .map(|start| Ok(data.slice(start..(start + step).min(total))))
        .collect();

    let mut response = Body::from_stream(futures::stream::iter(chunks)).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_LENGTH, total.into());
    response
}

// ============================================================================
// Fake providers
// ============================================================================

pub fn metadata(cover_art_url: Option<String>) -> TrackMetadata {
    TrackMetadata {
        identifier: TRACK_ID.to_string(),
        title: "Blueming".to_string(),
        artist: "IU".to_string(),
        album: "Love poem".to_string(),
        cover_art_url,
    }
}

/// Catalog answering from fixed data
pub struct FakeCatalog {
    pub metadata: Option<TrackMetadata>,
    pub stream_url: String,
    pub plain_lyrics: Result<Option<String>, String>,
    /// When set, `resolve_metadata` waits for a notification first
    pub gate: Option<Arc<Notify>>,
}

impl FakeCatalog {
    pub fn new(upstream: SocketAddr) -> Self {
        Self {
            metadata: Some(metadata(Some(format!("http://{}/cover.png", upstream)))),
            stream_url: format!("http://{}/audio", upstream),
            plain_lyrics: Ok(Some("plain lyric text".to_string())),
            gate: None,
        }
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, CatalogError> {
        Ok(vec![SearchResult {
            identifier: TRACK_ID.to_string(),
            song_name: format!("{} (match)", query),
            artist_name: "IU".to_string(),
            album_name: "Love poem".to_string(),
            art: "https://img.invalid/a.jpg".to_string(),
        }])
    }

    async fn resolve_metadata(&self, track_id: &str) -> Result<TrackMetadata, CatalogError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.metadata
            .clone()
            .ok_or_else(|| CatalogError::NotFound(track_id.to_string()))
    }

    async fn resolve_direct_stream(&self, track_id: &str) -> Result<DirectStream, CatalogError> {
        if self.metadata.is_none() {
            return Err(CatalogError::NotFound(track_id.to_string()));
        }
        Ok(DirectStream {
            url: self.stream_url.clone(),
            mime_type: "audio/webm; codecs=\"opus\"".to_string(),
            bitrate: 160_000,
            approx_duration_ms: 215_041,
        })
    }

    async fn fetch_plain_lyrics(&self, _track_id: &str) -> Result<Option<String>, CatalogError> {
        self.plain_lyrics.clone().map_err(CatalogError::Upstream)
    }
}

/// Lyrics provider answering from fixed data
pub struct FakeLyrics {
    pub response: Result<Option<String>, String>,
}

impl FakeLyrics {
    pub fn synced() -> Self {
        Self {
            response: Ok(Some(SYNCED_LRC.to_string())),
        }
    }
}

#[async_trait]
impl LyricsClient for FakeLyrics {
    async fn fetch_synced_lyrics(
        &self,
        _artist: &str,
        _title: &str,
        _album: &str,
        _duration_ms: u64,
    ) -> Result<Option<String>, LyricsError> {
        self.response.clone().map_err(LyricsError::Upstream)
    }
}

// ============================================================================
// Fake codec engine
// ============================================================================

/// Write an executable shell script standing in for ffmpeg
#[cfg(unix)]
pub fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-ffmpeg.sh");
    {
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        writeln!(file, "{}", body).unwrap();
        file.sync_all().unwrap();
    }
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn transcoder_config(ffmpeg_path: PathBuf) -> TranscoderConfig {
    TranscoderConfig {
        ffmpeg_path,
        bitrate: None,
        timeout_secs: 30,
    }
}

// ============================================================================
// Service
// ============================================================================

pub struct TestService {
    pub root: TempDir,
    pub state: AppState,
    pub app: Router,
}

impl TestService {
    pub async fn start(
        catalog: FakeCatalog,
        lyrics: FakeLyrics,
        ffmpeg_path: PathBuf,
        workers: WorkerConfig,
    ) -> Self {
        let root = tempfile::tempdir().unwrap();
        let db = init_database_pool(&root.path().join("tunepipe.db"))
            .await
            .unwrap();
        let http_client = reqwest::Client::new();

        let services = PipelineServices {
            catalog: Arc::new(catalog),
            lyrics: Arc::new(lyrics),
            fetcher: StreamFetcher::new(http_client.clone(), Duration::from_secs(5)),
            transcoder: Transcoder::new(&transcoder_config(ffmpeg_path)),
            http_client,
            request_timeout: Duration::from_secs(5),
        };

        let state = AppState::start(
            db,
            EventBus::new(1024),
            services,
            root.path().join("downloads"),
            &workers,
            3600,
        );
        let app = tunepipe_dl::build_router(state.clone());

        Self { root, state, app }
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.root.path().join("downloads")
    }

    /// File names currently in `downloads/`, hidden ones included
    pub fn download_entries(&self) -> Vec<String> {
        match std::fs::read_dir(self.downloads_dir()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Poll until the job is terminal
    pub async fn wait_for_terminal(&self, job_id: Uuid) -> DownloadJob {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
        loop {
            let job = load_job(&self.state.db, job_id).await.unwrap().unwrap();
            if job.status.is_terminal() {
                return job;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job {} stuck in {}",
                job_id,
                job.status
            );
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}

pub fn workers(pool_size: usize, queue_capacity: usize) -> WorkerConfig {
    WorkerConfig {
        pool_size,
        queue_capacity,
    }
}

pub fn assert_terminal(status: JobStatus) {
    assert!(status.is_terminal(), "expected terminal status, got {}", status);
}
