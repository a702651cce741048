//! Download job record and state machine
//!
//! A job progresses `Pending → In-Progress → {Completed | Failed}`. Only the
//! pipeline task that owns a job mutates it, and a terminal job never changes
//! again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tunepipe_common::{Error, JobStatus, Result};
use uuid::Uuid;

/// State transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub job_id: Uuid,
    pub old_status: JobStatus,
    pub new_status: JobStatus,
    pub transitioned_at: DateTime<Utc>,
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    ResolveMetadata,
    ResolveStream,
    Download,
    Transcode,
    EmbedTags,
    Persist,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::ResolveMetadata => "resolve_metadata",
            PipelineStage::ResolveStream => "resolve_stream",
            PipelineStage::Download => "download",
            PipelineStage::Transcode => "transcode",
            PipelineStage::EmbedTags => "embed_tags",
            PipelineStage::Persist => "persist",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one optional enrichment field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOutcome {
    /// Pipeline never reached this field
    #[default]
    NotAttempted,
    /// Written into the artifact
    Embedded,
    /// Upstream had nothing for this track
    Absent,
    /// Lookup failed; the job continued without it
    Failed(String),
}

/// Per-field execution log for optional enrichment
///
/// Kept beside the job record for diagnostics; never affects job status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentReport {
    pub plain_lyrics: FieldOutcome,
    pub synced_lyrics: FieldOutcome,
    pub cover_art: FieldOutcome,
}

/// Persisted download job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadJob {
    /// Opaque job token handed to the client
    pub uuid: Uuid,

    /// Catalog identifier being acquired
    pub track_id: String,

    pub status: JobStatus,

    /// Present only once Completed
    pub file_path: Option<String>,

    /// Failure description (Failed only)
    pub error: Option<String>,

    pub enrichment: EnrichmentReport,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DownloadJob {
    /// Create a Pending job with a fresh identifier
    pub fn new(track_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            uuid: Uuid::new_v4(),
            track_id: track_id.into(),
            status: JobStatus::Pending,
            file_path: None,
            error: None,
            enrichment: EnrichmentReport::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `new_status`, rejecting illegal transitions
    pub fn transition_to(&mut self, new_status: JobStatus) -> Result<StateTransition> {
        if !self.status.can_transition_to(new_status) {
            return Err(Error::InvalidInput(format!(
                "Illegal job transition {} -> {} for {}",
                self.status, new_status, self.uuid
            )));
        }

        let transition = StateTransition {
            job_id: self.uuid,
            old_status: self.status,
            new_status,
            transitioned_at: Utc::now(),
        };
        self.status = new_status;
        self.updated_at = transition.transitioned_at;

        Ok(transition)
    }

    /// In-Progress → Completed with the artifact path
    pub fn complete(&mut self, file_path: String) -> Result<StateTransition> {
        let transition = self.transition_to(JobStatus::Completed)?;
        self.file_path = Some(file_path);
        self.error = None;
        Ok(transition)
    }

    /// Any non-terminal state → Failed
    pub fn fail(&mut self, error: impl Into<String>) -> Result<StateTransition> {
        let transition = self.transition_to(JobStatus::Failed)?;
        self.file_path = None;
        self.error = Some(error.into());
        Ok(transition)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
