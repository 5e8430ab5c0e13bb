// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use acldiff::acl::{Acl, Device};
use acldiff::bundle::archive::SIGNATURE_NAME;
use acldiff::bundle::{self, Blob, SigningKeyPair};
use acldiff::device::DeviceStateError;
use acldiff::transport::FileTransport;
use acldiff::{Config, DeviceStateSource, Transports};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use url::Url;

/// Authoritative table for devices 405419896 and 303986753
pub const AUTHORITATIVE_TSV: &str = "\
Device ID\tCard Number\tFrom\tTo\tGreat Hall\tDungeon\tKitchen
405419896\t8165538\t2024-01-01\t2024-12-31\tY\tN\tY
405419896\t8165539\t2024-01-01\t2024-12-31\tN\tN\tY
303986753\t8165538\t2024-01-01\t2024-12-31\tY\tY\tN
";

/// Current state: one card drifted, one missing, one unexpected
pub const CURRENT_TSV: &str = "\
Device ID\tCard Number\tFrom\tTo\tGreat Hall\tDungeon\tKitchen
405419896\t8165538\t2024-01-01\t2024-12-31\tY\tN\tN
405419896\t8165540\t2024-01-01\t2024-06-30\tY\tN\tN
303986753\t8165538\t2024-01-01\t2024-12-31\tY\tY\tN
";

pub const SIGNER: &str = "hq";

/// Scratch directory with a `keys/` dir holding the `hq` key pair
pub struct TestEnv {
    pub dir: TempDir,
    pub keypair: SigningKeyPair,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("keys")).unwrap();

        let keypair = SigningKeyPair::generate().with_key_id(SIGNER);
        keypair
            .save_to_files(&dir.path().join("keys/hq.private"), &dir.path().join("keys/hq.pub"))
            .unwrap();

        Self { dir, keypair }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn uri(&self, name: &str) -> String {
        Url::from_file_path(self.path(name)).unwrap().to_string()
    }

    pub fn config(&self) -> Config {
        Config {
            workdir: self.path("work"),
            keys_dir: self.path("keys"),
            signing_key: self.path("keys/hq.private"),
            devices: vec![
                Device::new(405419896).with_name("Main entrance"),
                Device::new(303986753),
            ],
            ..Config::default()
        }
    }

    /// Write a signed ACL archive and return its file:// URI
    pub fn publish_signed(&self, name: &str, table: &str) -> String {
        let bytes = bundle::package_acl(table.as_bytes(), &self.keypair, &self.path("keys/hq.private"), 0).unwrap();
        std::fs::write(self.path(name), bytes).unwrap();
        self.uri(name)
    }

    /// Write an archive with an arbitrary payload name and signature
    pub fn publish_raw(&self, name: &str, payload_name: &str, table: &str, signature: &[u8]) -> String {
        let bytes = bundle::pack(
            &[Blob::new(payload_name, table.as_bytes()), Blob::new(SIGNATURE_NAME, signature)],
            0,
        )
        .unwrap();
        std::fs::write(self.path(name), bytes).unwrap();
        self.uri(name)
    }

    /// Number of report files in the work directory
    pub fn report_count(&self) -> usize {
        report_files(&self.path("work")).len()
    }
}

pub fn report_files(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
        Err(_) => Vec::new(),
    }
}

pub fn file_transports() -> Transports {
    Transports::new().register("file", Arc::new(FileTransport))
}

/// In-memory device state
pub struct MemorySource(pub Acl);

impl DeviceStateSource for MemorySource {
    fn current_acl(&self, _devices: &[Device]) -> Result<Acl, DeviceStateError> {
        Ok(self.0.clone())
    }
}

/// Parse `CURRENT_TSV` into the current ACL
pub fn current_acl() -> Acl {
    let known = [405419896, 303986753].into_iter().collect();
    let parsed = acldiff::acl::parse(CURRENT_TSV.as_bytes(), &known).unwrap();
    assert!(parsed.rejected.is_empty());
    parsed.acl
}
