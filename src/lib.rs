// src/lib.rs

//! acldiff
//!
//! Reconciles the access-control lists held by door controllers against a
//! signed authoritative ACL and produces a per-device diff report.
//!
//! # Architecture
//!
//! - Signed bundles: tar+gzip archives of a payload and a detached Ed25519
//!   signature, verified against a directory of trusted signer keys
//! - ACL tables: tab-separated rows keyed by card number, parsed with
//!   per-row validation
//! - Diff engine: pure, deterministic partition of every card into
//!   unchanged, updated, added and deleted
//! - Reports: handlebars-rendered text, written locally and optionally
//!   signed and uploaded through a scheme-selected blob transport

pub mod acl;
pub mod bundle;
pub mod config;
pub mod device;
mod error;
pub mod pipeline;
pub mod report;
pub mod transport;

pub use acl::{Acl, Device, DeviceId, Diff, Record};
pub use config::Config;
pub use device::{DeviceStateSource, ParallelSource, SnapshotSource};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, ReportOutput, RunSummary, Verification};
pub use transport::{BlobTransport, Transports};
