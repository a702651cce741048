//! Download job endpoints
//!
//! Job identifiers are unauthenticated bearer tokens: anyone holding one can
//! read the job's status and download its file.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tunepipe_common::JobStatus;
use uuid::Uuid;

use super::VideoQuery;
use crate::db::jobs::load_job;
use crate::error::{ApiError, ApiResult};
use crate::models::DownloadJob;
use crate::utils::file_naming::download_filename;
use crate::AppState;

/// GET /process_mp3 response
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub status: String,
    pub uuid: Uuid,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub uuid: String,
}

/// GET /download_status response
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub uuid: Uuid,
    pub status: JobStatus,
    pub file_path: Option<String>,
}

impl From<&DownloadJob> for JobStatusResponse {
    fn from(job: &DownloadJob) -> Self {
        Self {
            uuid: job.uuid,
            status: job.status,
            file_path: job.file_path.clone(),
        }
    }
}

/// GET /process_mp3?video_id=
///
/// Accepts the job and returns its identifier without waiting for the
/// pipeline. 503 when the worker queue is full.
pub async fn process_mp3(
    State(state): State<AppState>,
    Query(params): Query<VideoQuery>,
) -> ApiResult<Json<ProcessResponse>> {
    let track_id = params.track_id()?;
    let job = state.workers.submit(track_id).await?;

    Ok(Json(ProcessResponse {
        status: "OK".to_string(),
        uuid: job.uuid,
        message: "Download Started.".to_string(),
    }))
}

async fn find_job(state: &AppState, raw_id: &str) -> ApiResult<DownloadJob> {
    let job_id = Uuid::parse_str(raw_id.trim())
        .map_err(|_| ApiError::NotFound(format!("Job not found: {}", raw_id)))?;
    load_job(&state.db, job_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", job_id)))
}

/// GET /download_status?uuid=
pub async fn download_status(
    State(state): State<AppState>,
    Query(params): Query<StatusQuery>,
) -> ApiResult<Json<JobStatusResponse>> {
    let job = find_job(&state, &params.uuid).await?;
    Ok(Json(JobStatusResponse::from(&job)))
}

/// GET /jobs/:uuid
///
/// Full record including the error and per-field enrichment outcomes.
pub async fn job_details(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<DownloadJob>> {
    Ok(Json(find_job(&state, &job_id).await?))
}

/// GET /download_mp3/:uuid
///
/// Streams the artifact of a Completed job.
pub async fn download_mp3(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let job = find_job(&state, &job_id).await?;

    let file_path = match (&job.status, &job.file_path) {
        (JobStatus::Completed, Some(path)) => std::path::PathBuf::from(path),
        _ => {
            return Err(ApiError::NotFound(format!(
                "Job {} has no file ({})",
                job.uuid, job.status
            )))
        }
    };

    let file = match tokio::fs::File::open(&file_path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(job_id = %job.uuid, path = %file_path.display(), "Artifact missing on disk");
            return Err(ApiError::NotFound(format!("File for job {} is missing", job.uuid)));
        }
        Err(e) => return Err(e.into()),
    };
    let length = file.metadata().await?.len();

    let filename = download_filename(&file_path, job.uuid);
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        filename.replace('"', "_")
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment; filename=\"track.mp3\""));

    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/mpeg"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    headers.insert(header::CONTENT_DISPOSITION, disposition);
    Ok(response)
}

/// Build job routes
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/process_mp3", get(process_mp3))
        .route("/download_status", get(download_status))
        .route("/download_mp3/:uuid", get(download_mp3))
        .route("/jobs/:uuid", get(job_details))
}
