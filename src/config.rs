// src/config.rs

//! Runtime configuration
//!
//! Configuration is read from a TOML file and then overridden by command
//! line flags. The resolved [`Config`] is handed to the pipeline; nothing
//! is read from process-wide state after that.
//!
//! # Example acldiff.toml
//!
//! ```toml
//! workdir = "/var/lib/acldiff"
//! keys_dir = "/etc/acldiff/keys"
//! signing_key = "/etc/acldiff/keys/acldiff.private"
//! snapshot = "/var/lib/acldiff/current.tsv"
//!
//! [s3]
//! region = "us-east-1"
//! profile = "acl"
//!
//! [[devices]]
//! id = 405419896
//! name = "Main entrance"
//!
//! [[devices]]
//! id = 303986753
//! ```

use crate::acl::{Device, DeviceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Default path for the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/acldiff/acldiff.toml";

/// Default working directory for local report files
pub const DEFAULT_WORKDIR: &str = "/var/lib/acldiff";

/// Default directory holding `<signer>.pub` files
pub const DEFAULT_KEYS_DIR: &str = "/etc/acldiff/keys";

/// Default private key used to sign uploaded reports
pub const DEFAULT_SIGNING_KEY: &str = "/etc/acldiff/keys/acldiff.private";

pub const DEFAULT_S3_REGION: &str = "us-east-1";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Device {0} is configured more than once")]
    DuplicateDevice(DeviceId),
}

/// HTTP transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Attempts for connection failures (at least one is always made)
    pub retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            retries: 3,
        }
    }
}

/// S3 transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct S3Config {
    pub region: String,
    /// Custom endpoint for S3-compatible stores (path-style addressing)
    pub endpoint: Option<String>,
    /// Credentials profile; environment variables are used when unset
    pub profile: Option<String>,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: DEFAULT_S3_REGION.to_string(),
            endpoint: None,
            profile: None,
        }
    }
}

/// Resolved pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory for local report files
    pub workdir: PathBuf,
    /// Directory of trusted `<signer>.pub` keys
    pub keys_dir: PathBuf,
    /// Private key for signing uploaded reports
    pub signing_key: PathBuf,
    /// Report template file; the built-in template is used when unset
    pub template: Option<PathBuf>,
    /// Exported device snapshot used as the current state
    pub snapshot: Option<PathBuf>,
    /// Skip signature verification. Operator debugging only; every run with
    /// this set logs the bypass.
    pub no_verify: bool,
    /// Print the report to stdout instead of writing a local file
    pub no_report: bool,
    pub http: HttpConfig,
    pub s3: S3Config,
    /// Controllers to reconcile
    pub devices: Vec<Device>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from(DEFAULT_WORKDIR),
            keys_dir: PathBuf::from(DEFAULT_KEYS_DIR),
            signing_key: PathBuf::from(DEFAULT_SIGNING_KEY),
            template: None,
            snapshot: None,
            no_verify: false,
            no_report: false,
            http: HttpConfig::default(),
            s3: S3Config::default(),
            devices: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or defaults when the file does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;

        let mut seen = BTreeSet::new();
        for device in &config.devices {
            if !seen.insert(device.id) {
                return Err(ConfigError::DuplicateDevice(device.id));
            }
        }

        Ok(config)
    }

    /// IDs of the configured devices
    pub fn device_ids(&self) -> BTreeSet<DeviceId> {
        self.devices.iter().map(|d| d.id).collect()
    }
}
