// src/transport/s3.rs

//! S3-compatible object storage transport for `s3://<bucket>/<key>` URIs
//!
//! rust-s3 is async; each call runs on a private current-thread runtime so
//! the pipeline stays synchronous.

use super::{BlobTransport, TransportError};
use crate::config::S3Config;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;
use std::future::Future;
use tracing::{debug, info};
use url::Url;

/// S3 client settings; buckets are opened per request
pub struct S3Transport {
    region: String,
    endpoint: Option<String>,
    profile: Option<String>,
}

impl S3Transport {
    pub fn new(config: &S3Config) -> Self {
        Self {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
            profile: config.profile.clone(),
        }
    }

    /// Split `s3://bucket/key` into (bucket, key)
    fn locate(uri: &Url) -> Result<(String, String), String> {
        let bucket = uri
            .host_str()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| "missing bucket name".to_string())?;
        let key = urlencoding::decode(uri.path().trim_start_matches('/'))
            .map_err(|e| format!("invalid object key: {e}"))?;
        if key.is_empty() {
            return Err("missing object key".to_string());
        }
        Ok((bucket.to_string(), key.into_owned()))
    }

    fn bucket(&self, name: &str) -> Result<Box<Bucket>, String> {
        let region = match &self.endpoint {
            Some(endpoint) => Region::Custom {
                region: self.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => self
                .region
                .parse::<Region>()
                .map_err(|e| format!("invalid region '{}': {e}", self.region))?,
        };

        let credentials = Credentials::new(None, None, None, None, self.profile.as_deref())
            .map_err(|e| format!("failed to load credentials: {e}"))?;

        let bucket = Bucket::new(name, region, credentials).map_err(|e| e.to_string())?;
        Ok(match self.endpoint {
            Some(_) => bucket.with_path_style(),
            None => bucket,
        })
    }

    fn block_on<F: Future>(future: F) -> Result<F::Output, String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| format!("failed to start runtime: {e}"))?;
        Ok(runtime.block_on(future))
    }
}

impl BlobTransport for S3Transport {
    fn fetch(&self, uri: &Url) -> Result<Vec<u8>, TransportError> {
        let (bucket_name, key) = Self::locate(uri).map_err(|e| TransportError::fetch(uri, e))?;
        let bucket = self
            .bucket(&bucket_name)
            .map_err(|e| TransportError::fetch(uri, e))?;

        debug!("S3 GET bucket={} key={}", bucket_name, key);
        let response = Self::block_on(bucket.get_object(&key))
            .map_err(|e| TransportError::fetch(uri, e))?
            .map_err(|e| TransportError::fetch(uri, e))?;

        if !(200..300).contains(&response.status_code()) {
            return Err(TransportError::fetch(
                uri,
                format!("S3 returned status {}", response.status_code()),
            ));
        }

        let bytes = response.bytes().to_vec();
        info!("Fetched {} bytes from {}", bytes.len(), uri);
        Ok(bytes)
    }

    fn store(&self, uri: &Url, bytes: &[u8]) -> Result<(), TransportError> {
        let (bucket_name, key) = Self::locate(uri).map_err(|e| TransportError::store(uri, e))?;
        let bucket = self
            .bucket(&bucket_name)
            .map_err(|e| TransportError::store(uri, e))?;

        debug!("S3 PUT bucket={} key={} ({} bytes)", bucket_name, key, bytes.len());
        let response = Self::block_on(bucket.put_object(&key, bytes))
            .map_err(|e| TransportError::store(uri, e))?
            .map_err(|e| TransportError::store(uri, e))?;

        if !(200..300).contains(&response.status_code()) {
            return Err(TransportError::store(
                uri,
                format!("S3 returned status {}", response.status_code()),
            ));
        }

        info!("Stored {} bytes to {}", bytes.len(), uri);
        Ok(())
    }
}
