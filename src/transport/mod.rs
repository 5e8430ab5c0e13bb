// src/transport/mod.rs

//! Blob transport
//!
//! Fetches and stores opaque byte blobs by URI. The concrete transport is
//! chosen by URI scheme:
//!
//! - `http`, `https` - [`HttpTransport`]
//! - `s3` - [`S3Transport`] (feature `s3`)
//! - `file` - [`FileTransport`]
//!
//! The pipeline only ever sees "fetch failed" or "store failed"; retries
//! and timeouts live inside the individual transports.

mod file;
mod http;
#[cfg(feature = "s3")]
mod s3;

pub use file::FileTransport;
pub use http::HttpTransport;
#[cfg(feature = "s3")]
pub use s3::S3Transport;

use crate::config::Config;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Transport failures
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Fetch failed for {uri}: {reason}")]
    Fetch { uri: String, reason: String },

    #[error("Store failed for {uri}: {reason}")]
    Store { uri: String, reason: String },

    #[error("Invalid URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Unsupported URI scheme '{scheme}' in {uri}")]
    UnsupportedScheme { uri: String, scheme: String },

    #[error("Failed to initialize transport: {0}")]
    Init(String),
}

impl TransportError {
    pub(crate) fn fetch(uri: &Url, reason: impl ToString) -> Self {
        TransportError::Fetch {
            uri: uri.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn store(uri: &Url, reason: impl ToString) -> Self {
        TransportError::Store {
            uri: uri.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Byte-oriented fetch/store capability for one or more URI schemes
pub trait BlobTransport: Send + Sync {
    /// Retrieve the complete blob at `uri`
    fn fetch(&self, uri: &Url) -> Result<Vec<u8>, TransportError>;

    /// Store `bytes` at `uri`, replacing any existing blob
    fn store(&self, uri: &Url, bytes: &[u8]) -> Result<(), TransportError>;
}

/// Scheme-keyed set of transports
#[derive(Clone, Default)]
pub struct Transports {
    schemes: BTreeMap<String, Arc<dyn BlobTransport>>,
}

impl Transports {
    /// An empty set; every URI is rejected until a transport is registered
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard transports configured from `config`
    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        let http: Arc<dyn BlobTransport> = Arc::new(HttpTransport::new(&config.http)?);

        let transports = Self::new()
            .register("file", Arc::new(FileTransport))
            .register("http", Arc::clone(&http))
            .register("https", http);

        #[cfg(feature = "s3")]
        let transports = transports.register("s3", Arc::new(S3Transport::new(&config.s3)));

        Ok(transports)
    }

    /// Register (or replace) the transport for `scheme`
    pub fn register(mut self, scheme: &str, transport: Arc<dyn BlobTransport>) -> Self {
        self.schemes.insert(scheme.to_ascii_lowercase(), transport);
        self
    }

    /// Schemes with a registered transport
    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.schemes.keys().map(String::as_str)
    }

    fn select(&self, uri: &str) -> Result<(Url, &dyn BlobTransport), TransportError> {
        let parsed = Url::parse(uri).map_err(|e| TransportError::InvalidUri {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;

        let transport = self
            .schemes
            .get(parsed.scheme())
            .ok_or_else(|| TransportError::UnsupportedScheme {
                uri: uri.to_string(),
                scheme: parsed.scheme().to_string(),
            })?;

        debug!("Using '{}' transport for {}", parsed.scheme(), uri);
        Ok((parsed, transport.as_ref()))
    }

    pub fn fetch(&self, uri: &str) -> Result<Vec<u8>, TransportError> {
        let (url, transport) = self.select(uri)?;
        transport.fetch(&url)
    }

    pub fn store(&self, uri: &str, bytes: &[u8]) -> Result<(), TransportError> {
        let (url, transport) = self.select(uri)?;
        transport.store(&url, bytes)
    }
}
