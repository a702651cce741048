//! Pipeline components
//!
//! External adapters (catalog, lyrics, cover art), the byte path (stream
//! fetcher, transcoder, tag writer) and the job machinery built on them.

pub mod catalog_client;
pub mod cover_art;
pub mod job_orchestrator;
pub mod lrc_parser;
pub mod lyrics_client;
pub mod stream_fetcher;
pub mod tag_writer;
pub mod transcoder;
pub mod worker_pool;

pub use catalog_client::{CatalogClient, CatalogError, YtMusicClient};
pub use cover_art::{fetch_cover_art, CoverArtError};
pub use job_orchestrator::{JobOrchestrator, PipelineServices};
pub use lrc_parser::parse_lrc;
pub use lyrics_client::{LrclibClient, LyricsClient, LyricsError};
pub use stream_fetcher::{FetchError, Progress, ProgressTracker, SourceStream, StreamFetcher};
pub use tag_writer::{write_tags, CoverArt, TagWriteError, TrackTags};
pub use transcoder::{TranscodeError, TranscodeStats, Transcoder};
pub use worker_pool::{SubmitError, WorkerPool};
