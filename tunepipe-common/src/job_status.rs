//! Download job state machine vocabulary
//!
//! `Pending → In-Progress → {Completed | Failed}`. Completed and Failed are
//! terminal; nothing leaves a terminal state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Download job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Accepted and queued, pipeline not started
    #[serde(rename = "Pending")]
    Pending,
    /// Pipeline running
    #[serde(rename = "In-Progress")]
    InProgress,
    /// Artifact written and tagged
    #[serde(rename = "Completed")]
    Completed,
    /// A pipeline stage failed
    #[serde(rename = "Failed")]
    Failed,
}

impl JobStatus {
    /// Wire / storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::InProgress => "In-Progress",
            JobStatus::Completed => "Completed",
            JobStatus::Failed => "Failed",
        }
    }

    /// Completed or Failed
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self → next` is a legal transition
    ///
    /// Pending may fail directly (e.g. the job was interrupted before its
    /// worker picked it up).
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::InProgress)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::InProgress, JobStatus::Completed)
                | (JobStatus::InProgress, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(JobStatus::Pending),
            "In-Progress" => Ok(JobStatus::InProgress),
            "Completed" => Ok(JobStatus::Completed),
            "Failed" => Ok(JobStatus::Failed),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown job status: {}",
                other
            ))),
        }
    }
}
