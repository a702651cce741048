//! Data models for tunepipe-dl
//!
//! - Download job record and its state machine
//! - Catalog track metadata and direct stream descriptors
//! - Parsed synced lyric lines

pub mod job;
pub mod lyrics;
pub mod track;

pub use job::{DownloadJob, EnrichmentReport, FieldOutcome, PipelineStage, StateTransition};
pub use lyrics::LyricLine;
pub use track::{DirectStream, SearchResult, TrackMetadata};
