//! MP3 transcoding through an external ffmpeg process
//!
//! Source bytes are piped into the engine's stdin while its stdout is copied
//! to the output file, so the source is never buffered whole in memory.
//! Exit status is always checked; a non-zero exit or an empty result is a
//! failure, never a silently truncated file.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tunepipe_common::config::TranscoderConfig;

use super::stream_fetcher::FetchError;

/// Engine diagnostics kept in the error (tail of stderr)
const STDERR_TAIL_CHARS: usize = 2000;

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Source download failed while feeding the engine
    #[error("Source failed during transcode: {0}")]
    Input(#[from] FetchError),

    #[error("ffmpeg exited with {code:?}: {stderr}")]
    ExitStatus { code: Option<i32>, stderr: String },

    #[error("ffmpeg produced no output")]
    EmptyOutput,

    #[error("Transcode exceeded {0}s")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte counts of a finished transcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeStats {
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// ffmpeg wrapper
#[derive(Debug, Clone)]
pub struct Transcoder {
    ffmpeg_path: PathBuf,
    bitrate: Option<String>,
    timeout: Duration,
}

impl Transcoder {
    pub fn new(config: &TranscoderConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            bitrate: config.bitrate.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn arguments(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-i", "pipe:0", "-vn"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        if let Some(bitrate) = &self.bitrate {
            args.push("-b:a".to_string());
            args.push(bitrate.clone());
        }
        args.extend(["-f", "mp3", "pipe:1"].iter().map(|s| s.to_string()));
        args
    }

    /// Transcode `source` into an MP3 at `output_path`
    ///
    /// The output file is created (or truncated) by this call. On error its
    /// contents are unspecified; the caller owns cleanup.
    pub async fn transcode<S>(
        &self,
        source: S,
        output_path: &Path,
    ) -> Result<TranscodeStats, TranscodeError>
    where
        S: Stream<Item = Result<Bytes, FetchError>> + Send + Unpin,
    {
        match tokio::time::timeout(self.timeout, self.run(source, output_path)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    output = %output_path.display(),
                    timeout_secs = self.timeout.as_secs(),
                    "Transcode timed out, engine killed"
                );
                Err(TranscodeError::Timeout(self.timeout.as_secs()))
            }
        }
    }

    async fn run<S>(&self, mut source: S, output_path: &Path) -> Result<TranscodeStats, TranscodeError>
    where
        S: Stream<Item = Result<Bytes, FetchError>> + Send + Unpin,
    {
        let mut child = Command::new(&self.ffmpeg_path)
            .args(self.arguments())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TranscodeError::Spawn {
                program: self.ffmpeg_path.display().to_string(),
                source: e,
            })?;

        let (Some(mut stdin), Some(mut stdout), Some(mut stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(TranscodeError::Io(std::io::Error::other(
                "ffmpeg stdio not captured",
            )));
        };

        let feed = async move {
            let mut fed: u64 = 0;
            while let Some(chunk) = source.next().await {
                let chunk = chunk?;
                match stdin.write_all(&chunk).await {
                    Ok(()) => fed += chunk.len() as u64,
                    // Engine stopped reading; its exit status tells why
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => break,
                    Err(e) => return Err(TranscodeError::Io(e)),
                }
            }
            // Dropping stdin signals end of input
            drop(stdin);
            Ok::<u64, TranscodeError>(fed)
        };

        let drain = async {
            let mut file = File::create(output_path).await?;
            let written = tokio::io::copy(&mut stdout, &mut file).await?;
            file.sync_all().await?;
            Ok::<u64, std::io::Error>(written)
        };

        let diagnostics = async {
            let mut raw = Vec::new();
            let _ = stderr.read_to_end(&mut raw).await;
            String::from_utf8_lossy(&raw).into_owned()
        };

        let (fed, written, stderr_text) = tokio::join!(feed, drain, diagnostics);
        let status = child.wait().await?;

        let bytes_in = fed?;
        if !status.success() {
            return Err(TranscodeError::ExitStatus {
                code: status.code(),
                stderr: tail(&stderr_text, STDERR_TAIL_CHARS),
            });
        }
        let bytes_out = written?;
        if bytes_out == 0 {
            return Err(TranscodeError::EmptyOutput);
        }

        tracing::debug!(bytes_in, bytes_out, output = %output_path.display(), "Transcode finished");
        Ok(TranscodeStats {
            bytes_in,
            bytes_out,
        })
    }
}

fn tail(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    let count = trimmed.chars().count();
    if count <= max_chars {
        return trimmed.to_string();
    }
    trimmed.chars().skip(count - max_chars).collect()
}
