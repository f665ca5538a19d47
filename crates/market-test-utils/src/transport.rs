//! [`MemoryTransport`]: serves registered byte blobs by URL.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use market_core::{Transport, TransportError};

/// A scripted failure for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Network,
    Status(u16),
}

/// In-memory [`Transport`] with scripted failures, delays and a request log.
///
/// Unknown URLs answer with HTTP 404.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    files: Mutex<HashMap<String, Vec<u8>>>,
    failures: Mutex<HashMap<String, VecDeque<Failure>>>,
    delays: Mutex<HashMap<String, Duration>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` at `url`.
    pub fn serve(&self, url: impl Into<String>, bytes: Vec<u8>) {
        self.files.lock().unwrap().insert(url.into(), bytes);
    }

    /// Fail the next `times` requests for `url` with `failure`.
    pub fn fail_next(&self, url: &str, failure: Failure, times: usize) {
        self.failures
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .extend(std::iter::repeat_n(failure, times));
    }

    /// Stall every request for `url` for `delay` after writing half the body.
    pub fn delay(&self, url: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(url.to_string(), delay);
    }

    /// Every requested URL, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        self.requests.lock().unwrap().push(url.to_string());

        let failure = self
            .failures
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(Failure::Network) => {
                return Err(TransportError::Network("connection reset".to_string()));
            }
            Some(Failure::Status(code)) => return Err(TransportError::HttpStatus(code)),
            None => {}
        }

        let Some(bytes) = self.files.lock().unwrap().get(url).cloned() else {
            return Err(TransportError::HttpStatus(404));
        };

        let delay = self.delays.lock().unwrap().get(url).copied();
        if let Some(delay) = delay {
            tokio::fs::write(dest, &bytes[..bytes.len() / 2]).await?;
            tokio::time::sleep(delay).await;
        }

        tokio::fs::write(dest, &bytes).await?;
        Ok(bytes.len() as u64)
    }
}
