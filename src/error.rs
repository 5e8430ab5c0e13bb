// src/error.rs

//! Crate-level error type
//!
//! Each concern has its own error enum; [`Error`] aggregates them so the
//! pipeline can propagate any of them with `?`.

use crate::acl::SchemaError;
use crate::bundle::{ArchiveError, SigningError, VerifyError};
use crate::config::ConfigError;
use crate::device::DeviceStateError;
use crate::report::ReportError;
use crate::transport::TransportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("Invalid ACL table from {uri}: {source}")]
    Schema {
        uri: String,
        #[source]
        source: SchemaError,
    },

    #[error(transparent)]
    DeviceState(#[from] DeviceStateError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// True for failures that mean the ACL could not be trusted
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Error::Archive(_) | Error::Verify(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
