//! Download job pipeline
//!
//! Drives one job through resolve metadata → resolve stream → lyrics and
//! cover art (best effort) → download → transcode → embed tags → persist,
//! and owns every status write for that job.
//!
//! Output is written to a hidden staging file and renamed into `downloads/`
//! only once fully tagged. A failing or panicking pipeline removes the
//! staging file, so a job's `file_path` only ever names a complete artifact.

use futures::TryStreamExt;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tunepipe_common::events::{EventBus, TunepipeEvent};
use tunepipe_common::JobStatus;
use uuid::Uuid;

use super::catalog_client::CatalogClient;
use super::cover_art::fetch_cover_art;
use super::lrc_parser::parse_lrc;
use super::lyrics_client::LyricsClient;
use super::stream_fetcher::{ProgressTracker, StreamFetcher};
use super::tag_writer::{write_tags, CoverArt, TrackTags};
use super::transcoder::{TranscodeError, Transcoder};
use crate::db::jobs;
use crate::error::PipelineError;
use crate::models::{
    DirectStream, DownloadJob, EnrichmentReport, FieldOutcome, LyricLine, PipelineStage,
    StateTransition, TrackMetadata,
};
use crate::utils::file_naming::{artifact_path, staging_path};

/// Log target for job store write failures (stuck-job conditions)
pub const PERSISTENCE_LOG_TARGET: &str = "tunepipe::persistence";

/// Error recorded when a pipeline task panics
pub const PANIC_ERROR: &str = "pipeline task panicked";

/// External collaborators the pipeline calls
///
/// Built once at startup and shared by every job.
#[derive(Clone)]
pub struct PipelineServices {
    pub catalog: Arc<dyn CatalogClient>,
    pub lyrics: Arc<dyn LyricsClient>,
    pub fetcher: StreamFetcher,
    pub transcoder: Transcoder,
    /// Shared client for cover art downloads
    pub http_client: reqwest::Client,
    pub request_timeout: Duration,
}

/// A pipeline stage failure
#[derive(Debug)]
pub struct StageFailure {
    pub stage: PipelineStage,
    pub error: PipelineError,
}

trait AtStage<T> {
    fn at(self, stage: PipelineStage) -> Result<T, StageFailure>;
}

impl<T, E: Into<PipelineError>> AtStage<T> for Result<T, E> {
    fn at(self, stage: PipelineStage) -> Result<T, StageFailure> {
        self.map_err(|e| StageFailure {
            stage,
            error: e.into(),
        })
    }
}

/// Staging file removed on drop unless committed
struct StagingFile {
    path: PathBuf,
    committed: bool,
}

impl StagingFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically move the staging file to `destination`
    async fn commit(mut self, destination: &Path) -> std::io::Result<()> {
        tokio::fs::rename(&self.path, destination).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove staging file");
            }
        }
    }
}

/// Optional enrichment gathered before download
struct Enrichment {
    plain_lyrics: Option<String>,
    synced_lyrics: Vec<LyricLine>,
    cover_art: Option<CoverArt>,
    report: EnrichmentReport,
}

pub struct JobOrchestrator {
    db: SqlitePool,
    event_bus: EventBus,
    services: PipelineServices,
    downloads_dir: PathBuf,
}

impl JobOrchestrator {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        services: PipelineServices,
        downloads_dir: PathBuf,
    ) -> Self {
        Self {
            db,
            event_bus,
            services,
            downloads_dir,
        }
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    /// Record a new Pending job for `track_id`
    ///
    /// The identifier is freshly generated and never reused; the insert
    /// fails rather than overwrite an existing row.
    pub async fn create_job(&self, track_id: &str) -> Result<DownloadJob, PipelineError> {
        let job = DownloadJob::new(track_id);
        if let Err(e) = jobs::insert_job(&self.db, &job).await {
            tracing::error!(
                target: PERSISTENCE_LOG_TARGET,
                job_id = %job.uuid,
                error = %e,
                "Failed to create job record"
            );
            return Err(e.into());
        }

        tracing::info!(job_id = %job.uuid, track_id = %track_id, "Download job created");
        self.event_bus.emit_lossy(TunepipeEvent::JobCreated {
            job_id: job.uuid,
            track_id: track_id.to_string(),
            timestamp: job.created_at,
        });
        Ok(job)
    }

    /// Run the pipeline for a Pending job to a terminal state
    ///
    /// Stage errors become a Failed transition; nothing is returned to the
    /// submitter.
    pub async fn run_job(&self, mut job: DownloadJob) {
        let job_id = job.uuid;

        if !self.persist_transition(&mut job, JobStatus::InProgress).await {
            return;
        }
        tracing::info!(job_id = %job_id, track_id = %job.track_id, "Pipeline started");

        match self.execute(&mut job).await {
            Ok(path) => {
                let file_path = path.display().to_string();
                let expected = job.status;
                let transition = match job.complete(file_path.clone()) {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::error!(job_id = %job_id, error = %e, "Illegal completion");
                        return;
                    }
                };
                if let Err(e) = jobs::update_job(&self.db, &job, expected).await {
                    tracing::error!(
                        target: PERSISTENCE_LOG_TARGET,
                        job_id = %job_id,
                        error = %e,
                        "Failed to record completion; job left In-Progress"
                    );
                    // Unrecorded artifact; remove it so it cannot be mistaken for output
                    let _ = tokio::fs::remove_file(&path).await;
                    return;
                }
                self.emit_transition(&transition);
                self.event_bus.emit_lossy(TunepipeEvent::JobCompleted {
                    job_id,
                    file_path: file_path.clone(),
                    timestamp: transition.transitioned_at,
                });
                tracing::info!(job_id = %job_id, file_path = %file_path, "Pipeline completed");
            }
            Err(failure) => {
                tracing::warn!(
                    job_id = %job_id,
                    stage = %failure.stage,
                    error = %failure.error,
                    "Pipeline failed"
                );
                self.record_failure(&mut job, failure.stage.as_str(), &failure.error.to_string())
                    .await;
            }
        }
    }

    /// Fail a job whose pipeline task died without finishing
    pub async fn fail_abandoned(&self, job_id: Uuid, reason: &str) {
        let mut job = match jobs::load_job(&self.db, job_id).await {
            Ok(Some(job)) if !job.is_terminal() => job,
            Ok(_) => return,
            Err(e) => {
                tracing::error!(
                    target: PERSISTENCE_LOG_TARGET,
                    job_id = %job_id,
                    error = %e,
                    "Failed to load abandoned job"
                );
                return;
            }
        };
        self.record_failure(&mut job, "worker", reason).await;
    }

    async fn record_failure(&self, job: &mut DownloadJob, stage: &str, error: &str) {
        let expected = job.status;
        let transition = match job.fail(format!("{}: {}", stage, error)) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(job_id = %job.uuid, error = %e, "Illegal failure transition");
                return;
            }
        };
        if let Err(e) = jobs::update_job(&self.db, job, expected).await {
            tracing::error!(
                target: PERSISTENCE_LOG_TARGET,
                job_id = %job.uuid,
                error = %e,
                "Failed to record failure; job left {}",
                expected
            );
            return;
        }
        self.emit_transition(&transition);
        self.event_bus.emit_lossy(TunepipeEvent::JobFailed {
            job_id: job.uuid,
            stage: stage.to_string(),
            error: error.to_string(),
            timestamp: transition.transitioned_at,
        });
    }

    /// Apply and store a transition; false when it could not be stored
    async fn persist_transition(&self, job: &mut DownloadJob, next: JobStatus) -> bool {
        let expected = job.status;
        let transition = match job.transition_to(next) {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(job_id = %job.uuid, error = %e, "Illegal transition");
                return false;
            }
        };
        if let Err(e) = jobs::update_job(&self.db, job, expected).await {
            tracing::error!(
                target: PERSISTENCE_LOG_TARGET,
                job_id = %job.uuid,
                error = %e,
                "Failed to record {} -> {}",
                expected,
                next
            );
            return false;
        }
        self.emit_transition(&transition);
        true
    }

    fn emit_transition(&self, transition: &StateTransition) {
        self.event_bus.emit_lossy(TunepipeEvent::JobStateChanged {
            job_id: transition.job_id,
            old_status: transition.old_status,
            new_status: transition.new_status,
            timestamp: transition.transitioned_at,
        });
    }

    async fn execute(&self, job: &mut DownloadJob) -> Result<PathBuf, StageFailure> {
        let catalog = &self.services.catalog;

        let metadata = catalog
            .resolve_metadata(&job.track_id)
            .await
            .at(PipelineStage::ResolveMetadata)?;

        let stream = catalog
            .resolve_direct_stream(&job.track_id)
            .await
            .at(PipelineStage::ResolveStream)?;

        let enrichment = self.gather_enrichment(job.uuid, &metadata, &stream).await;
        job.enrichment = enrichment.report.clone();

        tokio::fs::create_dir_all(&self.downloads_dir)
            .await
            .at(PipelineStage::Download)?;
        let staging = StagingFile::new(staging_path(&self.downloads_dir, job.uuid));

        let source = self
            .services
            .fetcher
            .open(&stream.url)
            .await
            .at(PipelineStage::Download)?;

        let mut tracker = ProgressTracker::new(source.content_length);
        let event_bus = self.event_bus.clone();
        let job_id = job.uuid;
        let reporting_source = source.inspect_ok(|chunk| {
            if let Some(progress) = tracker.advance(chunk.len() as u64) {
                event_bus.emit_lossy(TunepipeEvent::DownloadProgress {
                    job_id,
                    bytes_received: progress.bytes_received,
                    total_bytes: progress.total_bytes.unwrap_or(0),
                    percentage: progress.percentage,
                    timestamp: chrono::Utc::now(),
                });
            }
        });

        let stats = match self
            .services
            .transcoder
            .transcode(reporting_source, staging.path())
            .await
        {
            Ok(stats) => stats,
            Err(TranscodeError::Input(e)) => return Err(e).at(PipelineStage::Download),
            Err(e) => return Err(e).at(PipelineStage::Transcode),
        };
        if let Some(progress) = tracker.finish() {
            self.event_bus.emit_lossy(TunepipeEvent::DownloadProgress {
                job_id,
                bytes_received: progress.bytes_received,
                total_bytes: 0,
                percentage: None,
                timestamp: chrono::Utc::now(),
            });
        }
        tracing::debug!(
            job_id = %job_id,
            bytes_in = stats.bytes_in,
            bytes_out = stats.bytes_out,
            "Source transcoded"
        );

        let tags = TrackTags {
            title: metadata.title.clone(),
            artist: metadata.artist.clone(),
            album: metadata.album.clone(),
            plain_lyrics: enrichment.plain_lyrics,
            synced_lyrics: enrichment.synced_lyrics,
            cover_art: enrichment.cover_art,
        };
        let tag_target = staging.path().to_path_buf();
        tokio::task::spawn_blocking(move || write_tags(&tag_target, &tags))
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))
            .at(PipelineStage::EmbedTags)?
            .at(PipelineStage::EmbedTags)?;

        let destination = artifact_path(&self.downloads_dir, &metadata.title, job.uuid);
        staging
            .commit(&destination)
            .await
            .at(PipelineStage::Persist)?;

        Ok(destination)
    }

    /// Plain lyrics, synced lyrics and cover art, each independently optional
    async fn gather_enrichment(
        &self,
        job_id: Uuid,
        metadata: &TrackMetadata,
        stream: &DirectStream,
    ) -> Enrichment {
        let services = &self.services;

        let plain = services.catalog.fetch_plain_lyrics(&metadata.identifier);
        let synced = services.lyrics.fetch_synced_lyrics(
            &metadata.artist,
            &metadata.title,
            &metadata.album,
            stream.approx_duration_ms,
        );
        let cover = async {
            match &metadata.cover_art_url {
                Some(url) => {
                    Some(fetch_cover_art(&services.http_client, url, services.request_timeout).await)
                }
                None => None,
            }
        };
        let (plain, synced, cover) = tokio::join!(plain, synced, cover);

        let mut report = EnrichmentReport::default();

        let plain_lyrics = match plain {
            Ok(Some(text)) => {
                report.plain_lyrics = FieldOutcome::Embedded;
                Some(text)
            }
            Ok(None) => {
                report.plain_lyrics = FieldOutcome::Absent;
                None
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Plain lyrics unavailable");
                report.plain_lyrics = FieldOutcome::Failed(e.to_string());
                None
            }
        };

        let synced_lyrics = match synced {
            Ok(Some(lrc)) => {
                let lines = parse_lrc(&lrc);
                report.synced_lyrics = if lines.is_empty() {
                    FieldOutcome::Absent
                } else {
                    FieldOutcome::Embedded
                };
                lines
            }
            Ok(None) => {
                report.synced_lyrics = FieldOutcome::Absent;
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Synced lyrics unavailable");
                report.synced_lyrics = FieldOutcome::Failed(e.to_string());
                Vec::new()
            }
        };

        let cover_art = match cover {
            Some(Ok(art)) => {
                report.cover_art = FieldOutcome::Embedded;
                Some(art)
            }
            Some(Err(e)) => {
                tracing::warn!(job_id = %job_id, error = %e, "Cover art unavailable");
                report.cover_art = FieldOutcome::Failed(e.to_string());
                None
            }
            None => {
                report.cover_art = FieldOutcome::Absent;
                None
            }
        };

        Enrichment {
            plain_lyrics,
            synced_lyrics,
            cover_art,
            report,
        }
    }
}
