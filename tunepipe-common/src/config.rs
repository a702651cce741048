//! Configuration loading and root folder resolution
//!
//! Settings come from (highest priority first) command-line arguments,
//! environment variables, the TOML config file, and compiled defaults. This
//! module owns the TOML layer and the root folder rules; the service merges
//! its CLI arguments on top.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TUNEPIPE_CONFIG";

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV_VAR: &str = "TUNEPIPE_ROOT_FOLDER";

/// Config file name inside the platform config directory
pub const CONFIG_FILE_NAME: &str = "tunepipe.toml";

/// Contents of `tunepipe.toml`
///
/// Every section is optional; missing keys take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding `tunepipe.db` and `downloads/`
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub workers: WorkerConfig,
    pub http: HttpConfig,
    pub transcoder: TranscoderConfig,
    pub catalog: CatalogConfig,
    pub lyrics: LyricsConfig,
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "tunepipe_dl=info,tower_http=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5780,
        }
    }
}

/// Background pipeline pool sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of concurrently running pipelines
    pub pool_size: usize,
    /// Accepted jobs waiting for a worker before submissions are rejected
    pub queue_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pool_size: 2,
            queue_capacity: 16,
        }
    }
}

/// Outbound HTTP limits shared by every upstream client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout for API calls (catalog, lyrics, cover art)
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Longest silence tolerated between two chunks of a stream download
    pub stream_idle_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 20,
            connect_timeout_secs: 10,
            stream_idle_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    /// Codec engine executable
    pub ffmpeg_path: PathBuf,
    /// Target audio bitrate (e.g. "192k"); engine default when unset
    pub bitrate: Option<String>,
    pub timeout_secs: u64,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            bitrate: None,
            timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// InnerTube API root
    pub base_url: String,
    /// Interface language
    pub hl: String,
    /// Content region
    pub gl: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://music.youtube.com/youtubei/v1".to_string(),
            hl: "en".to_string(),
            gl: "US".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LyricsConfig {
    pub base_url: String,
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://lrclib.net/api".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Age after which a non-terminal job counts as stuck
    pub stale_after_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: 3600,
        }
    }
}

impl TomlConfig {
    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.workers.pool_size == 0 {
            return Err(Error::Config("workers.pool_size must be at least 1".to_string()));
        }
        if self.workers.queue_capacity == 0 {
            return Err(Error::Config(
                "workers.queue_capacity must be at least 1".to_string(),
            ));
        }
        let timeouts = [
            ("http.request_timeout_secs", self.http.request_timeout_secs),
            ("http.connect_timeout_secs", self.http.connect_timeout_secs),
            ("http.stream_idle_timeout_secs", self.http.stream_idle_timeout_secs),
            ("transcoder.timeout_secs", self.transcoder.timeout_secs),
            ("jobs.stale_after_secs", self.jobs.stale_after_secs),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than 0", name)));
            }
        }
        Ok(())
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Locate and load the config file
///
/// An explicitly named file (argument or `TUNEPIPE_CONFIG`) must exist. The
/// platform default location is optional; when absent, defaults are used.
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        return load_toml_config(path);
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return load_toml_config(Path::new(&path));
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            tracing::debug!(path = %path.display(), "Loading default config file");
            load_toml_config(&path)
        }
        _ => Ok(TomlConfig::default()),
    }
}

/// `<config_dir>/tunepipe/tunepipe.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tunepipe").join(CONFIG_FILE_NAME))
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. `TUNEPIPE_ROOT_FOLDER`
/// 3. `root_folder` in the TOML config
/// 4. OS-dependent default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    get_default_root_folder()
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tunepipe"))
        .unwrap_or_else(|| PathBuf::from("./tunepipe_data"))
}
