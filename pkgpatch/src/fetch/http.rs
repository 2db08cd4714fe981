//! Remote patch download over HTTP(S).

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use crate::error::{PatchError, PatchResult};

/// Fetches the bytes behind a remote patch URL.
pub trait PatchDownloader {
    fn download(&self, url: &str) -> PatchResult<Vec<u8>>;
}

/// HTTP(S) downloader backed by a blocking `reqwest` client.
///
/// Created with [`HttpDownloader::new`], requests never time out, so a
/// stalled server stalls the run. Use [`HttpDownloader::with_timeout`] to
/// bound each request.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: Client,
    timeout: Option<Duration>,
}

impl HttpDownloader {
    /// Create a downloader without a request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::InvalidConfiguration`] if the TLS backend cannot
    /// be initialized.
    pub fn new() -> PatchResult<Self> {
        Self::build(None)
    }

    /// Create a downloader whose requests fail after `timeout`.
    pub fn with_timeout(timeout: Duration) -> PatchResult<Self> {
        Self::build(Some(timeout))
    }

    /// Per-request timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn build(timeout: Option<Duration>) -> PatchResult<Self> {
        // reqwest's blocking client defaults to 30 s; None lifts the limit.
        let client = Client::builder()
            .user_agent(concat!("pkgpatch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| {
                PatchError::InvalidConfiguration(format!("failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client, timeout })
    }
}

impl PatchDownloader for HttpDownloader {
    fn download(&self, url: &str) -> PatchResult<Vec<u8>> {
        let failed = || PatchError::download(url, format!("Could not download patch from {}", url));

        debug!(url, "Downloading patch");
        let mut response = self.client.get(url).send().map_err(|e| {
            debug!(url, error = %e, "Patch request failed");
            failed()
        })?;

        if !response.status().is_success() {
            debug!(url, status = %response.status(), "Patch request rejected");
            return Err(failed());
        }

        let mut bytes = Vec::new();
        response.read_to_end(&mut bytes).map_err(|e| {
            debug!(url, error = %e, "Patch body read failed");
            failed()
        })?;

        Ok(bytes)
    }
}
