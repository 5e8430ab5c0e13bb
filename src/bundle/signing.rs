// src/bundle/signing.rs
//! Ed25519 signing keys
//!
//! Keys are stored as small TOML documents holding the base64-encoded key
//! and an optional key identifier. The key identifier doubles as the signer
//! identity when a report is bundled, so it must match the `<signer>.pub`
//! file name a downstream consumer looks up.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ALGORITHM: &str = "ed25519";

/// Extension of a public key file in the key directory
pub const PUBLIC_KEY_EXTENSION: &str = "pub";

/// Extension of a private key file
pub const PRIVATE_KEY_EXTENSION: &str = "private";

/// Errors loading, saving or using a private key
#[derive(Error, Debug)]
pub enum SigningError {
    #[error("Signing key not found: {}", .0.display())]
    KeyNotFound(PathBuf),

    #[error("Invalid signing key {}: {reason}", path.display())]
    InvalidKey { path: PathBuf, reason: String },

    #[error("Signing key {} has no key_id to identify the signer", .0.display())]
    MissingKeyId(PathBuf),

    #[error("Failed to write key file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to bundle signed payload: {0}")]
    Bundle(String),
}

/// Key file format
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct KeyFile {
    pub(crate) algorithm: String,
    pub(crate) key: String,
    #[serde(default)]
    pub(crate) key_id: Option<String>,
}

impl KeyFile {
    /// Decode the 32 key bytes, checking the algorithm tag
    pub(crate) fn key_bytes(&self) -> Result<[u8; 32], String> {
        if self.algorithm != ALGORITHM {
            return Err(format!("unsupported key algorithm: {}", self.algorithm));
        }

        let bytes = BASE64
            .decode(self.key.trim())
            .map_err(|e| format!("invalid base64: {e}"))?;

        bytes
            .try_into()
            .map_err(|b: Vec<u8>| format!("expected 32 key bytes, found {}", b.len()))
    }
}

/// A signing key pair
pub struct SigningKeyPair {
    signing_key: SigningKey,
    key_id: Option<String>,
}

impl SigningKeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self {
            signing_key,
            key_id: None,
        }
    }

    /// Create from an existing signing key
    pub fn from_signing_key(key: SigningKey) -> Self {
        Self {
            signing_key: key,
            key_id: None,
        }
    }

    /// Set the key identifier (the signer identity)
    pub fn with_key_id(mut self, id: &str) -> Self {
        self.key_id = Some(id.to_string());
        self
    }

    /// Get the public key
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Get the public key as base64
    pub fn public_key_base64(&self) -> String {
        BASE64.encode(self.verifying_key().as_bytes())
    }

    /// Get the key ID
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    /// Produce a detached 64-byte signature over `content`
    pub fn sign(&self, content: &[u8]) -> Vec<u8> {
        self.signing_key.sign(content).to_bytes().to_vec()
    }

    /// Save the key pair to files (private and public)
    pub fn save_to_files(&self, private_path: &Path, public_path: &Path) -> Result<(), SigningError> {
        let private_data = KeyFile {
            algorithm: ALGORITHM.to_string(),
            key: BASE64.encode(self.signing_key.to_bytes()),
            key_id: self.key_id.clone(),
        };
        write_key_file(private_path, &private_data)?;

        // Private keys are readable by the owner only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(private_path, fs::Permissions::from_mode(0o600)).map_err(
                |source| SigningError::Write {
                    path: private_path.to_path_buf(),
                    source,
                },
            )?;
        }

        let public_data = KeyFile {
            algorithm: ALGORITHM.to_string(),
            key: self.public_key_base64(),
            key_id: self.key_id.clone(),
        };
        write_key_file(public_path, &public_data)
    }

    /// Load a key pair from a private key file
    pub fn load_from_file(path: &Path) -> Result<Self, SigningError> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SigningError::KeyNotFound(path.to_path_buf()),
            _ => SigningError::InvalidKey {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;

        let invalid = |reason: String| SigningError::InvalidKey {
            path: path.to_path_buf(),
            reason,
        };

        let key_file: KeyFile = toml::from_str(&content).map_err(|e| invalid(e.to_string()))?;
        let key_bytes = key_file.key_bytes().map_err(invalid)?;

        Ok(Self {
            signing_key: SigningKey::from_bytes(&key_bytes),
            key_id: key_file.key_id,
        })
    }
}

fn write_key_file(path: &Path, data: &KeyFile) -> Result<(), SigningError> {
    let contents = toml::to_string_pretty(data).map_err(|e| SigningError::InvalidKey {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    fs::write(path, contents).map_err(|source| SigningError::Write {
        path: path.to_path_buf(),
        source,
    })
}
