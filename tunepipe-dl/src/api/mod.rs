//! HTTP API handlers for tunepipe-dl
//!
//! Catalog passthrough (search, lyrics, direct link/stream), download jobs,
//! health and the SSE event stream.

pub mod catalog;
pub mod health;
pub mod jobs;
pub mod sse;

pub use catalog::catalog_routes;
pub use health::health_routes;
pub use jobs::job_routes;
pub use sse::event_stream;

use serde::Deserialize;

use crate::error::ApiError;
use crate::services::catalog_client::is_valid_track_id;

/// `?video_id=` query
#[derive(Debug, Deserialize)]
pub struct VideoQuery {
    pub video_id: String,
}

impl VideoQuery {
    /// Identifier after format validation
    pub fn track_id(&self) -> Result<&str, ApiError> {
        let id = self.video_id.trim();
        if !is_valid_track_id(id) {
            return Err(ApiError::BadRequest(format!(
                "Invalid video_id: {:?}",
                self.video_id
            )));
        }
        Ok(id)
    }
}
