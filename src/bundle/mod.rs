// src/bundle/mod.rs
//! Signed bundles
//!
//! This module implements the integrity-verified exchange format:
//! - Archive codec (tar + gzip of named blobs)
//! - Ed25519 signing keys and key files
//! - Signature verification against a directory of `<signer>.pub` keys
//! - Report packaging (sign + bundle for upload)

pub mod archive;
pub mod package;
pub mod signing;
pub mod verify;

pub use archive::{pack, unpack, ArchiveError, Blob, Unpacked};
pub use package::{package, package_acl, package_with_key_file};
pub use signing::{SigningError, SigningKeyPair};
pub use verify::{KeyStore, VerifyError};
