//! REST snapshot fetching over an injected HTTP client.

use crate::config::ExchangeConfig;
use crate::error::{ExchangeError, Result};
use crate::parse::DepthParser;
use bytes::Bytes;
use depthsync_core::{PairKey, Snapshot};
use depthsync_marketdata::{SnapshotFetcher, SyncError};
use std::time::Duration;

const ERROR_BODY_PREVIEW: usize = 256;

/// Status and body of one HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Raw body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Creates a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking HTTPS GET used for snapshot requests.
///
/// Connection pooling, TLS and request signing live behind this seam.
pub trait HttpGet {
    /// Issues a GET and waits at most `timeout` for the full response.
    ///
    /// # Errors
    /// Returns [`ExchangeError::Transport`] for connection or timeout failures.
    fn get(&mut self, url: &str, timeout: Duration) -> Result<HttpResponse>;
}

impl<F> HttpGet for F
where
    F: FnMut(&str, Duration) -> Result<HttpResponse>,
{
    fn get(&mut self, url: &str, timeout: Duration) -> Result<HttpResponse> {
        self(url, timeout)
    }
}

/// [`SnapshotFetcher`] backed by the exchange REST depth endpoint.
///
/// The request blocks the calling engine thread for up to the configured
/// request timeout.
#[derive(Debug)]
pub struct HttpSnapshotFetcher<T> {
    http: T,
    config: ExchangeConfig,
    parser: DepthParser,
}

impl<T: HttpGet> HttpSnapshotFetcher<T> {
    /// Creates a fetcher.
    #[must_use]
    pub fn new(http: T, config: ExchangeConfig, parser: DepthParser) -> Self {
        Self {
            http,
            config,
            parser,
        }
    }

    /// Fetches and decodes one snapshot.
    ///
    /// # Errors
    /// Transport failures, non-2xx statuses and undecodable bodies.
    pub fn fetch_snapshot(&mut self, symbol: &str, depth: u32) -> Result<Snapshot> {
        let url = self.config.snapshot_url(symbol, depth)?;
        tracing::debug!(%url, "requesting depth snapshot");

        let response = self.http.get(&url, self.config.request_timeout)?;
        if !response.is_success() {
            let preview = &response.body[..response.body.len().min(ERROR_BODY_PREVIEW)];
            return Err(ExchangeError::Http {
                status: response.status,
                message: String::from_utf8_lossy(preview).into_owned(),
            });
        }

        let snapshot = self.parser.parse_snapshot(&response.body)?;
        tracing::debug!(
            last_update_id = snapshot.last_update_id,
            bids = snapshot.bids.len(),
            asks = snapshot.asks.len(),
            "depth snapshot received"
        );
        Ok(snapshot)
    }
}

impl<T: HttpGet> SnapshotFetcher for HttpSnapshotFetcher<T> {
    fn fetch(&mut self, pair: &PairKey, depth: u32) -> std::result::Result<Snapshot, SyncError> {
        Ok(self.fetch_snapshot(pair.symbol(), depth)?)
    }
}
