//! # tunepipe common library
//!
//! Shared code for the tunepipe services:
//! - Error type and result alias
//! - Configuration loading and root folder resolution
//! - Job status vocabulary (the download state machine)
//! - Event types and the broadcast event bus

pub mod config;
pub mod error;
pub mod events;
pub mod job_status;

pub use error::{Error, Result};
pub use job_status::JobStatus;
