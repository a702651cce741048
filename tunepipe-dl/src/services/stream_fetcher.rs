//! Source audio download
//!
//! Opens a direct stream URL and exposes the body as a chunk stream with an
//! idle timeout between chunks. `ProgressTracker` turns byte counts into
//! throttled progress samples.

use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;

/// Unknown-length downloads report progress once per this many bytes
const UNKNOWN_LENGTH_REPORT_BYTES: u64 = 256 * 1024;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Source answered with a non-2xx status
    #[error("Source returned HTTP {0}")]
    Status(u16),

    #[error("Transport error: {0}")]
    Transport(String),

    /// No data for longer than the idle timeout
    #[error("Source stalled for {0}s")]
    Timeout(u64),

    /// Body ended before the declared Content-Length
    #[error("Source ended after {received} of {expected} bytes")]
    Incomplete { received: u64, expected: u64 },
}

/// Open source download
///
/// Yields body chunks in order. Ends with an error item on stall, transport
/// failure or short body; nothing follows an error.
pub struct SourceStream {
    /// Declared Content-Length, `None` when absent or zero
    pub content_length: Option<u64>,
    inner: BoxStream<'static, Result<Bytes, FetchError>>,
}

impl Stream for SourceStream {
    type Item = Result<Bytes, FetchError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl SourceStream {
    /// Stream over chunks already in memory
    pub fn from_chunks(chunks: Vec<Bytes>) -> Self {
        let total: u64 = chunks.iter().map(|c| c.len() as u64).sum();
        Self {
            content_length: Some(total).filter(|&n| n > 0),
            inner: futures::stream::iter(chunks.into_iter().map(Ok)).boxed(),
        }
    }
}

/// HTTP source fetcher
#[derive(Clone)]
pub struct StreamFetcher {
    http_client: reqwest::Client,
    idle_timeout: Duration,
}

impl StreamFetcher {
    pub fn new(http_client: reqwest::Client, idle_timeout: Duration) -> Self {
        Self {
            http_client,
            idle_timeout,
        }
    }

    /// Issue the GET and return the body stream
    ///
    /// Fails before any body byte is read on transport errors, a stalled
    /// response head, or a non-success status.
    pub async fn open(&self, url: &str) -> Result<SourceStream, FetchError> {
        let idle = self.idle_timeout;
        let response = tokio::time::timeout(idle, self.http_client.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout(idle.as_secs()))?
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_length = response.content_length().filter(|&n| n > 0);
        tracing::debug!(content_length = ?content_length, "Source stream opened");

        let body = response.bytes_stream();
        let inner = async_stream::stream! {
            let mut body = Box::pin(body);
            let mut received: u64 = 0;
            loop {
                match tokio::time::timeout(idle, body.next()).await {
                    Err(_) => {
                        yield Err(FetchError::Timeout(idle.as_secs()));
                        break;
                    }
                    Ok(None) => {
                        if let Some(expected) = content_length {
                            if received < expected {
                                yield Err(FetchError::Incomplete { received, expected });
                            }
                        }
                        break;
                    }
                    Ok(Some(Ok(chunk))) => {
                        received += chunk.len() as u64;
                        yield Ok(chunk);
                    }
                    Ok(Some(Err(e))) => {
                        yield Err(FetchError::Transport(e.to_string()));
                        break;
                    }
                }
            }
        };

        Ok(SourceStream {
            content_length,
            inner: inner.boxed(),
        })
    }
}

/// One progress sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub bytes_received: u64,
    pub total_bytes: Option<u64>,
    /// Two-decimal percentage; `None` for unknown length
    pub percentage: Option<f64>,
}

/// Byte counter with throttled reporting
///
/// With a known total, a sample is produced each time the whole-percent value
/// increases; 100.00 appears only once every byte has arrived, and exactly
/// once. With an unknown total, a sample is produced every
/// `UNKNOWN_LENGTH_REPORT_BYTES`.
#[derive(Debug)]
pub struct ProgressTracker {
    total: Option<u64>,
    received: u64,
    last_reported: Option<u64>,
}

impl ProgressTracker {
    pub fn new(total: Option<u64>) -> Self {
        Self {
            total: total.filter(|&n| n > 0),
            received: 0,
            last_reported: None,
        }
    }

    /// Percentage floored to hundredths, never rounded up to 100
    pub fn percentage(&self) -> Option<f64> {
        self.total.map(|total| {
            let received = self.received.min(total) as u128;
            let hundredths = received * 10_000 / total as u128;
            hundredths as f64 / 100.0
        })
    }

    fn sample(&self) -> Progress {
        Progress {
            bytes_received: self.received,
            total_bytes: self.total,
            percentage: self.percentage(),
        }
    }

    /// Count `n` more bytes, returning a sample if one is due
    pub fn advance(&mut self, n: u64) -> Option<Progress> {
        if n == 0 {
            return None;
        }
        self.received += n;

        let bucket = match self.total {
            Some(total) => self.received.min(total) as u128 * 100 / total as u128,
            None => (self.received / UNKNOWN_LENGTH_REPORT_BYTES) as u128,
        } as u64;

        if self.last_reported.map_or(true, |last| bucket > last) {
            self.last_reported = Some(bucket);
            return Some(self.sample());
        }
        None
    }

    /// Final sample for unknown-length downloads
    ///
    /// Known-length downloads already reported completion from `advance`.
    pub fn finish(&mut self) -> Option<Progress> {
        match self.total {
            None if self.received > 0 => Some(self.sample()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_floors() {
        let mut tracker = ProgressTracker::new(Some(3));
        tracker.advance(1);
        assert_eq!(tracker.percentage(), Some(33.33));
        tracker.advance(1);
        assert_eq!(tracker.percentage(), Some(66.66));
        tracker.advance(1);
        assert_eq!(tracker.percentage(), Some(100.0));
    }

    #[test]
    fn test_never_100_before_complete() {
        let mut tracker = ProgressTracker::new(Some(1_000_000));
        tracker.advance(999_999);
        assert_eq!(tracker.percentage(), Some(99.99));
    }

    #[test]
    fn test_unknown_length_has_no_percentage() {
        for total in [None, Some(0)] {
            let mut tracker = ProgressTracker::new(total);
            let sample = tracker.advance(10).unwrap();
            assert_eq!(sample.percentage, None);
            assert_eq!(sample.total_bytes, None);
        }
    }

    #[test]
    fn test_samples_monotonic_and_single_completion() {
        let mut tracker = ProgressTracker::new(Some(1000));
        let mut samples = Vec::new();
        for _ in 0..100 {
            samples.extend(tracker.advance(7));
        }
        samples.extend(tracker.advance(300));
        samples.extend(tracker.finish());

        let percentages: Vec<f64> = samples.iter().filter_map(|s| s.percentage).collect();
        assert!(percentages.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(percentages.iter().filter(|&&p| p == 100.0).count(), 1);
        assert_eq!(*percentages.last().unwrap(), 100.0);
    }

    #[test]
    fn test_unknown_length_reports_periodically() {
        let mut tracker = ProgressTracker::new(None);
        let mut count = 0;
        for _ in 0..8 {
            if tracker.advance(UNKNOWN_LENGTH_REPORT_BYTES / 2).is_some() {
                count += 1;
            }
        }
        // first chunk, then every full interval
        assert_eq!(count, 5);
        assert_eq!(tracker.finish().unwrap().bytes_received, UNKNOWN_LENGTH_REPORT_BYTES * 4);
    }

    #[tokio::test]
    async fn test_from_chunks() {
        let stream = SourceStream::from_chunks(vec![Bytes::from_static(b"ab"), Bytes::from_static(b"c")]);
        assert_eq!(stream.content_length, Some(3));
        let chunks: Vec<_> = stream.collect().await;
        assert_eq!(chunks.len(), 2);
    }
}
