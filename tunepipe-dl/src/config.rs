//! Service configuration
//!
//! Merges command-line arguments (which clap also reads from `TUNEPIPE_*`
//! environment variables) over the TOML file and compiled defaults.

use clap::Parser;
use std::path::PathBuf;
use tunepipe_common::config::{resolve_root_folder, TomlConfig};
use tunepipe_common::Result;

use crate::db::DATABASE_FILE_NAME;

/// Directory under the root folder holding finished artifacts
pub const DOWNLOADS_DIR_NAME: &str = "downloads";

/// Command-line arguments
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "tunepipe-dl", version, about = "Track download, transcode and tagging service")]
pub struct Args {
    /// Port to listen on
    #[arg(long, env = "TUNEPIPE_PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "TUNEPIPE_HOST")]
    pub host: Option<String>,

    /// Folder holding the database and downloads (also TUNEPIPE_ROOT_FOLDER)
    #[arg(long)]
    pub root_folder: Option<PathBuf>,

    /// TOML config file
    #[arg(long, env = "TUNEPIPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Concurrent pipeline workers
    #[arg(long, env = "TUNEPIPE_WORKERS")]
    pub workers: Option<usize>,

    /// Accepted jobs allowed to wait for a worker
    #[arg(long, env = "TUNEPIPE_QUEUE_CAPACITY")]
    pub queue_capacity: Option<usize>,
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    /// TOML settings with command-line overrides applied
    pub settings: TomlConfig,
}

impl ServiceConfig {
    /// Apply `args` over `settings` and validate the result
    pub fn resolve(args: &Args, mut settings: TomlConfig) -> Result<Self> {
        if let Some(port) = args.port {
            settings.server.port = port;
        }
        if let Some(host) = &args.host {
            settings.server.host = host.clone();
        }
        if let Some(workers) = args.workers {
            settings.workers.pool_size = workers;
        }
        if let Some(capacity) = args.queue_capacity {
            settings.workers.queue_capacity = capacity;
        }
        settings.validate()?;

        let root_folder = resolve_root_folder(args.root_folder.as_deref(), &settings);

        Ok(Self {
            root_folder,
            settings,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.settings.server.host, self.settings.server.port)
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.root_folder.join(DOWNLOADS_DIR_NAME)
    }
}
