//! Utility modules for tunepipe-dl

pub mod db_retry;
pub mod file_naming;

pub use db_retry::retry_on_lock;
pub use file_naming::{artifact_path, download_filename, sanitize_title, staging_path};
