//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::db::jobs::count_stale_jobs;
use crate::services::job_orchestrator::PERSISTENCE_LOG_TARGET;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct WorkerStats {
    pub pool_size: usize,
    pub queue_capacity: usize,
    /// Accepted jobs not yet picked up
    pub queued: usize,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when stuck jobs exist or the store is unreadable
    pub status: String,
    pub module: String,
    pub version: String,
    pub git_hash: String,
    pub uptime_seconds: u64,
    pub workers: WorkerStats,
    /// Non-terminal jobs older than the stale threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_jobs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let (stale_jobs, last_error) = match count_stale_jobs(&state.db, state.stale_after_secs).await {
        Ok(count) => (Some(count), None),
        Err(e) => {
            tracing::error!(target: PERSISTENCE_LOG_TARGET, error = %e, "Stale job count failed");
            (None, Some(e.to_string()))
        }
    };

    let status = match (stale_jobs, &last_error) {
        (Some(0), None) => "ok",
        _ => "degraded",
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "tunepipe-dl".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("TUNEPIPE_GIT_HASH").to_string(),
        uptime_seconds,
        workers: WorkerStats {
            pool_size: state.workers.pool_size(),
            queue_capacity: state.workers.queue_capacity(),
            queued: state.workers.queued(),
        },
        stale_jobs,
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
