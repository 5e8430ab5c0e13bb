// src/transport/http.rs

//! HTTP(S) transport
//!
//! A wrapper around the blocking reqwest client with retry support.
//! Connection-level failures are retried with a linear back-off; an HTTP
//! error status fails immediately.

use super::{BlobTransport, TransportError};
use crate::config::HttpConfig;
use reqwest::blocking::{Client, Response};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// HTTP client wrapper with retry support
pub struct HttpTransport {
    client: Client,
    max_retries: u32,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransportError::Init(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: config.retries.max(1),
        })
    }

    /// Send a request, retrying connection failures
    fn send_with_retry<F>(&self, url: &Url, send: F) -> Result<Response, String>
    where
        F: Fn() -> reqwest::Result<Response>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match send() {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => return Err(format!("HTTP {} from {}", response.status(), url)),
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(format!("failed after {attempt} attempts: {e}"));
                    }
                    warn!("Attempt {} for {} failed: {}, retrying...", attempt, url, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }
}

impl BlobTransport for HttpTransport {
    fn fetch(&self, uri: &Url) -> Result<Vec<u8>, TransportError> {
        debug!("HTTP GET {}", uri);

        let response = self
            .send_with_retry(uri, || self.client.get(uri.clone()).send())
            .map_err(|e| TransportError::fetch(uri, e))?;

        let bytes = response
            .bytes()
            .map_err(|e| TransportError::fetch(uri, format!("failed to read response: {e}")))?;

        info!("Fetched {} bytes from {}", bytes.len(), uri);
        Ok(bytes.to_vec())
    }

    fn store(&self, uri: &Url, bytes: &[u8]) -> Result<(), TransportError> {
        debug!("HTTP PUT {} ({} bytes)", uri, bytes.len());

        self.send_with_retry(uri, || {
            self.client
                .put(uri.clone())
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(bytes.to_vec())
                .send()
        })
        .map_err(|e| TransportError::store(uri, e))?;

        info!("Stored {} bytes to {}", bytes.len(), uri);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> HttpTransport {
        HttpTransport::new(&HttpConfig {
            timeout_secs: 2,
            retries: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_retries_at_least_once() {
        let transport = HttpTransport::new(&HttpConfig {
            timeout_secs: 1,
            retries: 0,
        })
        .unwrap();
        assert_eq!(transport.max_retries, 1);
    }

    #[test]
    fn test_connection_refused_is_fetch_error() {
        // Port 9 (discard) on localhost is not expected to accept HTTP
        let url = Url::parse("http://127.0.0.1:9/acl.tar.gz").unwrap();
        let err = transport().fetch(&url).unwrap_err();
        assert!(matches!(err, TransportError::Fetch { ref uri, .. } if uri.contains("127.0.0.1:9")));
    }

    #[test]
    fn test_connection_refused_is_store_error() {
        let url = Url::parse("http://127.0.0.1:9/report.tar.gz").unwrap();
        let err = transport().store(&url, b"report").unwrap_err();
        assert!(matches!(err, TransportError::Store { .. }));
    }
}
