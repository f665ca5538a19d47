//! Archive download with per-attempt timeout and linear retry.
//!
//! Each attempt is bounded by [`DownloadPolicy::attempt_timeout`]. A timed
//! out attempt is cancelled, its partial file removed, and the download
//! ends there: timeouts are not retried. Network errors and non-success
//! statuses are retried until [`DownloadPolicy::max_attempts`] is spent,
//! sleeping `attempt * retry_step` between attempts.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

/// Failure of a single fetch.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Local I/O failures will not improve on retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// Moves the bytes behind a URL into a local file.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write the body at `url` to `dest`, returning the byte count.
    ///
    /// `dest` is created or truncated. The future may be dropped mid-write.
    async fn fetch_to(&self, url: &str, dest: &Path) -> std::result::Result<u64, TransportError>;
}

/// [`Transport`] over HTTP(S), streaming the body to disk.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_to(&self, url: &str, dest: &Path) -> std::result::Result<u64, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus(status.as_u16()));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransportError::Network(e.to_string()))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

/// Retry and timeout settings for [`download`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    /// Delay before attempt `n + 1` is `n * retry_step`.
    pub retry_step: Duration,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout: Duration::from_secs(30),
            retry_step: Duration::from_secs(2),
        }
    }
}

/// Delay schedule growing by one `step` per failed attempt.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    step: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl LinearBackoff {
    pub fn new(policy: &DownloadPolicy) -> Self {
        Self {
            step: policy.retry_step,
            max_attempts: policy.max_attempts,
            attempt: 0,
        }
    }
}

impl Backoff for LinearBackoff {
    fn reset(&mut self) {
        self.attempt = 0;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return None;
        }
        Some(self.step * self.attempt)
    }
}

/// Download `url` into `dest` under `policy`.
///
/// On failure `dest` does not exist.
///
/// # Errors
///
/// - [`Error::DownloadTimeout`] when any attempt exceeds the timeout
/// - [`Error::DownloadFailed`] carrying the last error once attempts run out
pub async fn download(
    transport: &dyn Transport,
    url: &str,
    dest: &Path,
    policy: &DownloadPolicy,
) -> Result<u64> {
    let timeout_ms = u64::try_from(policy.attempt_timeout.as_millis()).unwrap_or(u64::MAX);
    let attempts = AtomicU32::new(0);
    let attempts = &attempts;

    backoff::future::retry(LinearBackoff::new(policy), move || async move {
        let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(url, attempt, "downloading");

        match tokio::time::timeout(policy.attempt_timeout, transport.fetch_to(url, dest)).await {
            Ok(Ok(bytes)) => {
                tracing::debug!(url, bytes, "download complete");
                Ok(bytes)
            }
            Ok(Err(e)) => {
                discard_partial(dest).await;
                tracing::warn!(url, attempt, error = %e, "download attempt failed");
                let err = Error::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                };
                if e.is_retryable() {
                    Err(backoff::Error::transient(err))
                } else {
                    Err(backoff::Error::permanent(err))
                }
            }
            Err(_) => {
                discard_partial(dest).await;
                tracing::warn!(url, attempt, timeout_ms, "download attempt timed out");
                Err(backoff::Error::permanent(Error::DownloadTimeout {
                    url: url.to_string(),
                    timeout_ms,
                }))
            }
        }
    })
    .await
}

async fn discard_partial(dest: &Path) {
    match tokio::fs::remove_file(dest).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %dest.display(), error = %e, "failed to remove partial download"),
    }
}
