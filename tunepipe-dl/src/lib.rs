//! tunepipe-dl library interface
//!
//! Exposes the router, state and pipeline components for the binary and for
//! integration tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tunepipe_common::config::{HttpConfig, WorkerConfig};
use tunepipe_common::events::EventBus;

use crate::services::{CatalogClient, JobOrchestrator, PipelineServices, StreamFetcher, WorkerPool};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Job events for SSE subscribers
    pub event_bus: EventBus,
    pub catalog: Arc<dyn CatalogClient>,
    pub fetcher: StreamFetcher,
    pub workers: WorkerPool,
    /// Age at which a non-terminal job is reported as stuck
    pub stale_after_secs: u64,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Build the orchestrator and start the worker pool
    ///
    /// Must be called within a tokio runtime.
    pub fn start(
        db: SqlitePool,
        event_bus: EventBus,
        services: PipelineServices,
        downloads_dir: PathBuf,
        workers: &WorkerConfig,
        stale_after_secs: u64,
    ) -> Self {
        let catalog = Arc::clone(&services.catalog);
        let fetcher = services.fetcher.clone();
        let orchestrator = Arc::new(JobOrchestrator::new(
            db.clone(),
            event_bus.clone(),
            services,
            downloads_dir,
        ));
        let (workers, _handles) =
            WorkerPool::start(workers.pool_size, workers.queue_capacity, orchestrator);

        Self {
            db,
            event_bus,
            catalog,
            fetcher,
            workers,
            stale_after_secs,
            startup_time: Utc::now(),
        }
    }
}

/// Process-wide HTTP client
///
/// Whole-request timeouts are set per call; stream downloads rely on the
/// connect timeout plus their own idle timeout.
pub fn build_http_client(config: &HttpConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
        .user_agent(concat!("tunepipe/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::catalog_routes())
        .merge(api::job_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
