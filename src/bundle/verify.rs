// src/bundle/verify.rs
//! Signature verification
//!
//! Public keys live in a flat directory, one `<signer>.pub` file per signer.
//! Verification always runs over the payload bytes exactly as they came out
//! of the archive.

use super::signing::{KeyFile, PUBLIC_KEY_EXTENSION};
use ed25519_dalek::{Signature, VerifyingKey};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Integrity failures
///
/// `UnknownSigner` and `SignatureMismatch` call for different responses
/// (rotate trust vs. investigate tampering) and are never merged.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Unknown signer '{signer}': no public key at {}", path.display())]
    UnknownSigner { signer: String, path: PathBuf },

    #[error("Invalid public key for signer '{signer}' ({}): {reason}", path.display())]
    InvalidKey {
        signer: String,
        path: PathBuf,
        reason: String,
    },

    #[error("Signature mismatch for signer '{signer}': {reason}")]
    SignatureMismatch { signer: String, reason: String },
}

impl VerifyError {
    pub fn signer(&self) -> &str {
        match self {
            VerifyError::UnknownSigner { signer, .. }
            | VerifyError::InvalidKey { signer, .. }
            | VerifyError::SignatureMismatch { signer, .. } => signer,
        }
    }
}

/// Directory of trusted public keys
#[derive(Debug, Clone)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the key file for `signer`
    pub fn key_path(&self, signer: &str) -> PathBuf {
        self.dir.join(format!("{signer}.{PUBLIC_KEY_EXTENSION}"))
    }

    /// Load the public key for `signer`
    pub fn public_key(&self, signer: &str) -> Result<VerifyingKey, VerifyError> {
        let path = self.key_path(signer);

        // A signer name that could escape the key directory is treated as unknown
        if signer.is_empty() || signer.contains(['/', '\\']) || signer == ".." {
            return Err(VerifyError::UnknownSigner {
                signer: signer.to_string(),
                path,
            });
        }

        let invalid = |reason: String| VerifyError::InvalidKey {
            signer: signer.to_string(),
            path: path.clone(),
            reason,
        };

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(VerifyError::UnknownSigner {
                    signer: signer.to_string(),
                    path: path.clone(),
                });
            }
            Err(e) => return Err(invalid(e.to_string())),
        };

        let key_file: KeyFile = toml::from_str(&content).map_err(|e| invalid(e.to_string()))?;
        let key_bytes = key_file.key_bytes().map_err(&invalid)?;

        VerifyingKey::from_bytes(&key_bytes).map_err(|e| invalid(e.to_string()))
    }

    /// Verify `signature` over `payload` with the key registered for `signer`
    pub fn verify(&self, signer: &str, payload: &[u8], signature: &[u8]) -> Result<(), VerifyError> {
        let key = self.public_key(signer)?;
        verify_with_key(signer, &key, payload, signature)?;
        debug!("Verified {} byte payload signed by '{}'", payload.len(), signer);
        Ok(())
    }
}

/// Verify a detached signature against an already-loaded key
pub fn verify_with_key(
    signer: &str,
    key: &VerifyingKey,
    payload: &[u8],
    signature: &[u8],
) -> Result<(), VerifyError> {
    let mismatch = |reason: String| VerifyError::SignatureMismatch {
        signer: signer.to_string(),
        reason,
    };

    let signature = Signature::from_slice(signature).map_err(|_| {
        mismatch(format!(
            "signature is {} bytes, expected {}",
            signature.len(),
            Signature::BYTE_SIZE
        ))
    })?;

    key.verify_strict(payload, &signature)
        .map_err(|e| mismatch(e.to_string()))
}

/// Convenience wrapper: verify `payload` against `<keys_dir>/<signer>.pub`
pub fn verify(signer: &str, payload: &[u8], signature: &[u8], keys_dir: &Path) -> Result<(), VerifyError> {
    KeyStore::new(keys_dir).verify(signer, payload, signature)
}
