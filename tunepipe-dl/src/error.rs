//! Error types for tunepipe-dl
//!
//! `PipelineError` is the job-level taxonomy; every stage error folds into it
//! and the orchestrator turns it into a Failed transition. `ApiError` is what
//! synchronous handlers return to HTTP callers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::catalog_client::CatalogError;
use crate::services::lyrics_client::LyricsError;
use crate::services::stream_fetcher::FetchError;
use crate::services::tag_writer::TagWriteError;
use crate::services::transcoder::TranscodeError;
use crate::services::worker_pool::SubmitError;

/// Job-level failure taxonomy
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Catalog, lyrics or stream source could not be reached or answered badly
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Track, lyrics or job absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Codec engine failure or malformed input
    #[error("Transcode failed: {0}")]
    Transcode(#[from] TranscodeError),

    /// Metadata embedding failed
    #[error("Tag write failed: {0}")]
    TagWrite(#[from] TagWriteError),

    /// Job store write failed
    #[error("Persistence failed: {0}")]
    Persistence(#[from] tunepipe_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CatalogError> for PipelineError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(id) => PipelineError::NotFound(format!("track {}", id)),
            other => PipelineError::UpstreamUnavailable(other.to_string()),
        }
    }
}

impl From<LyricsError> for PipelineError {
    fn from(err: LyricsError) -> Self {
        PipelineError::UpstreamUnavailable(err.to_string())
    }
}

impl From<FetchError> for PipelineError {
    fn from(err: FetchError) -> Self {
        PipelineError::UpstreamUnavailable(err.to_string())
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upstream catalog/lyrics service failed (502)
    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    /// Worker pool queue is full (503)
    #[error("Overloaded: {0}")]
    Overloaded(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// tunepipe-common error
    #[error("Common error: {0}")]
    Common(#[from] tunepipe_common::Error),
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(id) => ApiError::NotFound(format!("Track not found: {}", id)),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Overloaded(_) | SubmitError::Closed => ApiError::Overloaded(err.to_string()),
            SubmitError::Pipeline(e) => ApiError::Internal(e.to_string()),
            SubmitError::Aborted(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE", msg),
            ApiError::Overloaded(msg) => (StatusCode::SERVICE_UNAVAILABLE, "OVERLOADED", msg),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
            ),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Common(tunepipe_common::Error::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg)
            }
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::Upstream("x".into()), StatusCode::BAD_GATEWAY),
            (ApiError::Overloaded("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (ApiError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                ApiError::Common(tunepipe_common::Error::NotFound("job".into())),
                StatusCode::NOT_FOUND,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_catalog_not_found_maps_to_not_found() {
        let err: PipelineError = CatalogError::NotFound("abc".to_string()).into();
        assert!(matches!(err, PipelineError::NotFound(_)));

        let err: PipelineError = CatalogError::Upstream("timeout".to_string()).into();
        assert!(matches!(err, PipelineError::UpstreamUnavailable(_)));
    }

    #[test]
    fn test_full_queue_is_503() {
        let err: ApiError = SubmitError::Overloaded(16).into();
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
