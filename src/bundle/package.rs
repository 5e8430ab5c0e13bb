// src/bundle/package.rs
//! Payload packaging
//!
//! Signs a rendered report and bundles it exactly like an authoritative ACL
//! archive (`<signer>.rpt` + `signature`), so a downstream consumer can
//! verify it with the same [`unpack`](super::archive::unpack) +
//! [`KeyStore::verify`](super::verify::KeyStore::verify) sequence.
//! [`package_acl`] produces the authoritative archive itself.

use super::archive::{pack, Blob, ACL_EXTENSION, REPORT_EXTENSION, SIGNATURE_NAME};
use super::signing::{SigningError, SigningKeyPair};
use std::path::Path;
use tracing::debug;

/// Sign `report` and bundle it with its detached signature.
///
/// The signing key's `key_id` becomes the payload name stem and therefore
/// the signer identity seen by consumers.
pub fn package(report: &[u8], key: &SigningKeyPair, key_path: &Path, mtime: u64) -> Result<Vec<u8>, SigningError> {
    package_as(REPORT_EXTENSION, report, key, key_path, mtime)
}

/// Sign an ACL table and bundle it as `<signer>.acl` + `signature`
pub fn package_acl(table: &[u8], key: &SigningKeyPair, key_path: &Path, mtime: u64) -> Result<Vec<u8>, SigningError> {
    package_as(ACL_EXTENSION, table, key, key_path, mtime)
}

fn package_as(
    extension: &str,
    payload: &[u8],
    key: &SigningKeyPair,
    key_path: &Path,
    mtime: u64,
) -> Result<Vec<u8>, SigningError> {
    let signer = key
        .key_id()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| SigningError::MissingKeyId(key_path.to_path_buf()))?;

    let signature = key.sign(payload);
    let blobs = [
        Blob::new(format!("{signer}.{extension}"), payload),
        Blob::new(SIGNATURE_NAME, signature.as_slice()),
    ];

    let bytes = pack(&blobs, mtime).map_err(|e| SigningError::Bundle(e.to_string()))?;

    debug!(
        "Bundled {}.{} ({} bytes) and signature ({} bytes): {} bytes",
        signer,
        extension,
        payload.len(),
        signature.len(),
        bytes.len()
    );

    Ok(bytes)
}

/// Load the private key at `key_path` and [`package`] the report with it
pub fn package_with_key_file(report: &[u8], key_path: &Path, mtime: u64) -> Result<Vec<u8>, SigningError> {
    let key = SigningKeyPair::load_from_file(key_path)?;
    package(report, &key, key_path, mtime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::archive::unpack;
    use crate::bundle::verify::KeyStore;
    use tempfile::TempDir;

    #[test]
    fn test_package_verifies_symmetrically() {
        let temp_dir = TempDir::new().unwrap();
        let private_path = temp_dir.path().join("auditor.private");
        let keys = KeyStore::new(temp_dir.path());

        let keypair = SigningKeyPair::generate().with_key_id("auditor");
        keypair.save_to_files(&private_path, &keys.key_path("auditor")).unwrap();

        let report = b"ACL DIFF REPORT 2024-01-01 00:00:00 UTC\n";
        let bytes = package_with_key_file(report, &private_path, 0).unwrap();

        let unpacked = unpack(&bytes).unwrap();
        assert_eq!(unpacked.payload_name, "auditor.rpt");
        assert_eq!(unpacked.signer, "auditor");
        assert_eq!(unpacked.payload, report);
        keys.verify(&unpacked.signer, &unpacked.payload, &unpacked.signature).unwrap();
    }

    #[test]
    fn test_package_acl_names_payload_by_signer() {
        let keypair = SigningKeyPair::generate().with_key_id("hq");
        let table = b"Device ID\tCard Number\tFrom\tTo\n";
        let bytes = package_acl(table, &keypair, Path::new("hq.private"), 0).unwrap();

        let unpacked = unpack(&bytes).unwrap();
        assert_eq!(unpacked.payload_name, "hq.acl");
        assert_eq!(unpacked.signature, keypair.sign(table));
    }

    #[test]
    fn test_key_without_id_cannot_package() {
        let keypair = SigningKeyPair::generate();
        let err = package(b"report", &keypair, Path::new("anon.private"), 0).unwrap_err();
        assert!(matches!(err, SigningError::MissingKeyId(_)));
    }

    #[test]
    fn test_missing_key_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = package_with_key_file(b"report", &temp_dir.path().join("none.private"), 0).unwrap_err();
        assert!(matches!(err, SigningError::KeyNotFound(_)));
    }
}
