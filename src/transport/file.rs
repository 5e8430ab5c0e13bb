// src/transport/file.rs

//! Local filesystem transport for `file://` URIs

use super::{BlobTransport, TransportError};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use url::Url;

/// Reads and writes blobs on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransport;

impl FileTransport {
    fn path(uri: &Url) -> Result<PathBuf, String> {
        uri.to_file_path()
            .map_err(|_| "not an absolute local file path".to_string())
    }
}

impl BlobTransport for FileTransport {
    fn fetch(&self, uri: &Url) -> Result<Vec<u8>, TransportError> {
        let path = Self::path(uri).map_err(|e| TransportError::fetch(uri, e))?;
        let bytes = fs::read(&path).map_err(|e| TransportError::fetch(uri, e))?;
        info!("Read {} bytes from {}", bytes.len(), path.display());
        Ok(bytes)
    }

    fn store(&self, uri: &Url, bytes: &[u8]) -> Result<(), TransportError> {
        let path = Self::path(uri).map_err(|e| TransportError::store(uri, e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| TransportError::store(uri, e))?;
        }

        fs::write(&path, bytes).map_err(|e| TransportError::store(uri, e))?;
        info!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_and_fetch() {
        let temp_dir = TempDir::new().unwrap();
        let url = Url::from_file_path(temp_dir.path().join("nested/dir/blob.tar.gz")).unwrap();

        let blob = [0u8, 1, 2, 0, 255];
        FileTransport.store(&url, &blob).unwrap();
        assert_eq!(FileTransport.fetch(&url).unwrap(), blob);
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let url = Url::from_file_path(temp_dir.path().join("absent")).unwrap();
        assert!(matches!(FileTransport.fetch(&url), Err(TransportError::Fetch { .. })));
    }
}
