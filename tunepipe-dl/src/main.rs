//! tunepipe-dl - track download service
//!
//! Accepts download jobs over HTTP, runs each through the acquisition
//! pipeline on a bounded worker pool, and serves the tagged MP3s.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tunepipe_common::config::load_config;
use tunepipe_common::events::EventBus;

use tunepipe_dl::config::{Args, ServiceConfig};
use tunepipe_dl::services::{
    LrclibClient, PipelineServices, StreamFetcher, Transcoder, YtMusicClient,
};
use tunepipe_dl::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    let config = ServiceConfig::resolve(&args, settings).context("Invalid configuration")?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.settings.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("tunepipe_dl=info,tower_http=info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!(
        "Starting tunepipe-dl v{} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("TUNEPIPE_GIT_HASH"),
        env!("TUNEPIPE_BUILD_TIMESTAMP")
    );
    info!("Root folder: {}", config.root_folder.display());

    let downloads_dir = config.downloads_dir();
    std::fs::create_dir_all(&downloads_dir)
        .with_context(|| format!("Failed to create {}", downloads_dir.display()))?;

    let db_path = config.database_path();
    let db_pool = tunepipe_dl::db::init_database_pool(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("Database: {}", db_path.display());

    let swept = tunepipe_dl::db::jobs::sweep_interrupted_jobs(&db_pool).await?;
    if swept > 0 {
        info!(count = swept, "Marked jobs interrupted by restart as Failed");
    }

    let settings = &config.settings;
    let http_client = tunepipe_dl::build_http_client(&settings.http)?;
    let request_timeout = Duration::from_secs(settings.http.request_timeout_secs);

    let services = PipelineServices {
        catalog: Arc::new(YtMusicClient::new(
            http_client.clone(),
            &settings.catalog,
            request_timeout,
        )),
        lyrics: Arc::new(LrclibClient::new(
            http_client.clone(),
            &settings.lyrics,
            request_timeout,
        )),
        fetcher: StreamFetcher::new(
            http_client.clone(),
            Duration::from_secs(settings.http.stream_idle_timeout_secs),
        ),
        transcoder: Transcoder::new(&settings.transcoder),
        http_client,
        request_timeout,
    };

    let event_bus = EventBus::new(256);
    let state = AppState::start(
        db_pool,
        event_bus,
        services,
        downloads_dir,
        &settings.workers,
        settings.jobs.stale_after_secs,
    );

    let app = tunepipe_dl::build_router(state);

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("Listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("tunepipe-dl stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
