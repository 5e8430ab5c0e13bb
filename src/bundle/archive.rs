// src/bundle/archive.rs

//! Archive codec
//!
//! A bundle is a (usually gzip-compressed) tar archive of named blobs: one
//! payload whose file name carries the signer identity (`<signer>.acl` or
//! `<signer>.rpt`) and one detached signature named `signature`. Blob
//! contents are copied byte-for-byte in both directions.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Read;
use std::path::Path;
use tar::{Archive, Builder, EntryType, Header};
use thiserror::Error;
use tracing::debug;

/// Fixed name of the detached signature blob
pub const SIGNATURE_NAME: &str = "signature";

/// Extension of an authoritative ACL payload
pub const ACL_EXTENSION: &str = "acl";

/// Extension of a diff report payload
pub const REPORT_EXTENSION: &str = "rpt";

/// Extensions recognized as payload blobs
pub const PAYLOAD_EXTENSIONS: &[&str] = &[ACL_EXTENSION, REPORT_EXTENSION];

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Archive structure errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Malformed archive: {0}")]
    Malformed(String),

    #[error("Archive payload '{0}' does not identify a signer")]
    MissingSignerIdentity(String),

    #[error("Failed to build archive: {0}")]
    Build(#[from] std::io::Error),
}

/// A named blob inside an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub name: String,
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// The signed content recovered from an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unpacked {
    /// Payload bytes exactly as stored
    pub payload: Vec<u8>,
    /// Payload blob name, e.g. `alice.acl`
    pub payload_name: String,
    /// Signer identity derived from the payload name
    pub signer: String,
    /// Detached signature bytes
    pub signature: Vec<u8>,
}

/// Bundle blobs into a gzip-compressed tar archive.
///
/// Entries are written in the given order with mode 0644 and `mtime`
/// (seconds since the epoch) as their modification time.
pub fn pack(blobs: &[Blob], mtime: u64) -> Result<Vec<u8>, ArchiveError> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut archive = Builder::new(encoder);

    for blob in blobs {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(blob.data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(mtime);
        header.set_cksum();
        archive.append_data(&mut header, &blob.name, blob.data.as_slice())?;
    }

    let encoder = archive.into_inner()?;
    Ok(encoder.finish()?)
}

/// Read every regular-file blob from an archive, in archive order.
///
/// Both gzip-compressed and plain tar input are accepted.
pub fn read_blobs(bytes: &[u8]) -> Result<Vec<Blob>, ArchiveError> {
    let reader: Box<dyn Read + '_> = if bytes.starts_with(&GZIP_MAGIC) {
        Box::new(GzDecoder::new(bytes))
    } else {
        Box::new(bytes)
    };

    let mut archive = Archive::new(reader);
    let entries = archive
        .entries()
        .map_err(|e| ArchiveError::Malformed(e.to_string()))?;

    let mut blobs = Vec::new();
    for entry in entries {
        let mut entry = entry.map_err(|e| ArchiveError::Malformed(e.to_string()))?;

        if !entry.header().entry_type().is_file() {
            continue;
        }

        let path = entry
            .path()
            .map_err(|e| ArchiveError::Malformed(format!("invalid entry name: {e}")))?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                ArchiveError::Malformed(format!("invalid entry name: {}", path.display()))
            })?;

        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| ArchiveError::Malformed(format!("failed to read '{name}': {e}")))?;

        blobs.push(Blob { name, data });
    }

    Ok(blobs)
}

/// Extract the payload, its signer and the detached signature.
pub fn unpack(bytes: &[u8]) -> Result<Unpacked, ArchiveError> {
    let blobs = read_blobs(bytes)?;

    let mut signatures = blobs.iter().filter(|b| b.name == SIGNATURE_NAME);
    let signature = signatures
        .next()
        .ok_or_else(|| ArchiveError::Malformed(format!("missing '{SIGNATURE_NAME}' entry")))?;
    if signatures.next().is_some() {
        return Err(ArchiveError::Malformed(format!(
            "more than one '{SIGNATURE_NAME}' entry"
        )));
    }

    let mut payloads = blobs.iter().filter(|b| payload_extension(&b.name).is_some());
    let payload = payloads.next().ok_or_else(|| {
        ArchiveError::Malformed(format!(
            "no payload entry (expected a name ending in .{})",
            PAYLOAD_EXTENSIONS.join(" or .")
        ))
    })?;
    for extra in payloads {
        debug!("Ignoring additional payload entry '{}'", extra.name);
    }

    let signer = signer_identity(&payload.name)?;

    Ok(Unpacked {
        payload: payload.data.clone(),
        payload_name: payload.name.clone(),
        signer,
        signature: signature.data.clone(),
    })
}

/// Derive the signer identity from a payload name (`alice.acl` -> `alice`)
pub fn signer_identity(payload_name: &str) -> Result<String, ArchiveError> {
    let name = Path::new(payload_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(payload_name);

    match name.rsplit_once('.') {
        Some((stem, ext)) if PAYLOAD_EXTENSIONS.contains(&ext) && !stem.trim().is_empty() => {
            Ok(stem.to_string())
        }
        _ => Err(ArchiveError::MissingSignerIdentity(payload_name.to_string())),
    }
}

fn payload_extension(name: &str) -> Option<&str> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| PAYLOAD_EXTENSIONS.contains(ext))
}
