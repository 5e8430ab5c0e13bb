// src/device.rs

//! Live device state
//!
//! The diff engine needs a complete snapshot of what the controllers hold.
//! A [`DeviceStateSource`] produces that snapshot as an [`Acl`]; how the
//! records are obtained (wire protocol, exported dumps) is up to the
//! implementation. Any failure for any device fails the whole snapshot.

use crate::acl::{self, Acl, Device, DeviceId, Record};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Failure to obtain current state
#[derive(Error, Debug)]
pub enum DeviceStateError {
    #[error("Failed to retrieve ACL from device {device}: {reason}")]
    Device { device: DeviceId, reason: String },

    #[error("Failed to read device snapshot {}: {reason}", path.display())]
    Snapshot { path: PathBuf, reason: String },
}

/// Source of the current ACL across a set of devices
pub trait DeviceStateSource {
    /// Return the records currently held by `devices`.
    ///
    /// The result must be complete: either every device was read or an
    /// error is returned.
    fn current_acl(&self, devices: &[Device]) -> Result<Acl, DeviceStateError>;
}

/// Reads the card records from a single controller
pub trait DevicePoller: Sync {
    fn records(&self, device: &Device) -> Result<Vec<Record>, String>;
}

/// Polls every device concurrently and assembles the snapshot once all
/// devices have answered
pub struct ParallelSource<P> {
    poller: P,
}

impl<P: DevicePoller> ParallelSource<P> {
    pub fn new(poller: P) -> Self {
        Self { poller }
    }
}

impl<P: DevicePoller> DeviceStateSource for ParallelSource<P> {
    fn current_acl(&self, devices: &[Device]) -> Result<Acl, DeviceStateError> {
        let results: Vec<(DeviceId, Result<Vec<Record>, String>)> = devices
            .par_iter()
            .map(|device| (device.id, self.poller.records(device)))
            .collect();

        let mut acl = Acl::new();
        for (device, result) in results {
            let records = result.map_err(|reason| DeviceStateError::Device { device, reason })?;

            let mut cards = HashSet::with_capacity(records.len());
            if let Some(repeated) = records.iter().find(|r| !cards.insert(r.card_number)) {
                return Err(DeviceStateError::Device {
                    device,
                    reason: format!("duplicate card {}", repeated.card_number),
                });
            }

            debug!("Device {}: {} records", device, records.len());
            if !records.is_empty() {
                acl.insert(device, records);
            }
        }

        Ok(acl)
    }
}

/// Reads current state from a TSV snapshot exported from the controllers.
///
/// The snapshot uses the same table format as the authoritative ACL. A
/// snapshot containing any invalid row is incomplete and rejected.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    path: PathBuf,
}

impl SnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DeviceStateSource for SnapshotSource {
    fn current_acl(&self, devices: &[Device]) -> Result<Acl, DeviceStateError> {
        let snapshot_err = |reason: String| DeviceStateError::Snapshot {
            path: self.path.clone(),
            reason,
        };

        let bytes = fs::read(&self.path).map_err(|e| snapshot_err(e.to_string()))?;
        let known: BTreeSet<DeviceId> = devices.iter().map(|d| d.id).collect();
        let parsed = acl::parse(&bytes, &known).map_err(|e| snapshot_err(e.to_string()))?;

        if let Some(first) = parsed.rejected.first() {
            return match first.device() {
                Some(device) => Err(DeviceStateError::Device {
                    device,
                    reason: format!("invalid snapshot row in {}: {first}", self.path.display()),
                }),
                None => Err(snapshot_err(format!(
                    "{} invalid rows, first: {first}",
                    parsed.rejected.len()
                ))),
            };
        }

        info!(
            "Loaded device snapshot {}: {} devices, {} records",
            self.path.display(),
            parsed.acl.device_count(),
            parsed.acl.record_count()
        );
        Ok(parsed.acl)
    }
}
