//! Catalog passthrough endpoints
//!
//! Synchronous: each call goes straight to the catalog and answers with its
//! result. Unknown tracks are 404; upstream failures are 502.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::VideoQuery;
use crate::error::{ApiError, ApiResult};
use crate::models::{DirectStream, SearchResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

/// `{success, results}` envelope
#[derive(Debug, Serialize)]
pub struct ResultsResponse<T> {
    pub success: bool,
    pub results: T,
}

impl<T> ResultsResponse<T> {
    fn ok(results: T) -> Json<Self> {
        Json(Self {
            success: true,
            results,
        })
    }
}

/// POST /search
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<ResultsResponse<Vec<SearchResult>>>> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }

    let results = state.catalog.search(query).await?;
    Ok(ResultsResponse::ok(results))
}

/// GET /lyrics?video_id=
///
/// Plain (unsynchronized) lyrics text.
pub async fn lyrics(
    State(state): State<AppState>,
    Query(params): Query<VideoQuery>,
) -> ApiResult<Json<ResultsResponse<String>>> {
    let track_id = params.track_id()?;
    match state.catalog.fetch_plain_lyrics(track_id).await? {
        Some(text) => Ok(ResultsResponse::ok(text)),
        None => Err(ApiError::NotFound(format!("No lyrics for {}", track_id))),
    }
}

/// GET /direct_link?video_id=
pub async fn direct_link(
    State(state): State<AppState>,
    Query(params): Query<VideoQuery>,
) -> ApiResult<Json<ResultsResponse<DirectStream>>> {
    let track_id = params.track_id()?;
    let stream = state.catalog.resolve_direct_stream(track_id).await?;
    Ok(ResultsResponse::ok(stream))
}

/// GET /direct_stream?video_id=
///
/// Proxies the source audio bytes with the resolved media type.
pub async fn direct_stream(
    State(state): State<AppState>,
    Query(params): Query<VideoQuery>,
) -> ApiResult<Response> {
    let track_id = params.track_id()?;
    let stream = state.catalog.resolve_direct_stream(track_id).await?;
    let source = state.fetcher.open(&stream.url).await?;

    tracing::debug!(track_id = %track_id, mime_type = %stream.mime_type, "Proxying direct stream");

    let content_type = HeaderValue::from_str(stream.media_type())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let content_length = source.content_length;

    let mut response = Body::from_stream(source).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    if let Some(length) = content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }
    Ok(response)
}

/// Build catalog routes
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/search", post(search))
        .route("/lyrics", get(lyrics))
        .route("/direct_link", get(direct_link))
        .route("/direct_stream", get(direct_stream))
}
