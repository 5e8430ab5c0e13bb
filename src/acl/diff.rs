// src/acl/diff.rs

//! Diff computation between the current and authoritative ACLs.
//!
//! Records are matched by card number, never by position. For every device
//! appearing in either ACL the union of card numbers is partitioned into
//! four classes:
//!
//! - `unchanged`: present in both, all fields equal
//! - `updated`: present in both, at least one field differs
//! - `added`: authoritative only (the controller is missing it)
//! - `deleted`: current only (the controller holds an unexpected record)
//!
//! `unchanged`, `updated` and `added` follow authoritative row order;
//! `deleted` follows current row order. The result is a pure function of
//! the two inputs.

use super::{Acl, CardNumber, DeviceId, Record};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// A record present on both sides with differing fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    /// What the controller currently holds
    pub current: Record,
    /// What the authoritative ACL requires
    pub authoritative: Record,
}

impl Update {
    pub fn card_number(&self) -> CardNumber {
        self.authoritative.card_number
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} -> {}",
            self.card_number(),
            self.current.fields(),
            self.authoritative.fields()
        )
    }
}

/// Classified records for a single device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    pub unchanged: Vec<Record>,
    pub updated: Vec<Update>,
    pub added: Vec<Record>,
    pub deleted: Vec<Record>,
}

impl Diff {
    /// True when the controller matches the authoritative ACL exactly
    pub fn is_synchronized(&self) -> bool {
        self.updated.is_empty() && self.added.is_empty() && self.deleted.is_empty()
    }

    /// Number of records that need attention
    pub fn change_count(&self) -> usize {
        self.updated.len() + self.added.len() + self.deleted.len()
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            unchanged: self.unchanged.len(),
            updated: self.updated.len(),
            added: self.added.len(),
            deleted: self.deleted.len(),
        }
    }
}

/// Per-device classification counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub unchanged: usize,
    pub updated: usize,
    pub added: usize,
    pub deleted: usize,
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unchanged: {}, updated: {}, added: {}, deleted: {}",
            self.unchanged, self.updated, self.added, self.deleted
        )
    }
}

/// Compare the current ACL against the authoritative ACL.
///
/// Returns one [`Diff`] per device in either input, keyed (and therefore
/// ordered) by ascending device ID.
pub fn compare(current: &Acl, authoritative: &Acl) -> BTreeMap<DeviceId, Diff> {
    let mut devices: Vec<DeviceId> = current.device_ids().chain(authoritative.device_ids()).collect();
    devices.sort_unstable();
    devices.dedup();

    devices
        .into_iter()
        .map(|device| {
            let diff = compare_device(
                current.records(device).unwrap_or_default(),
                authoritative.records(device).unwrap_or_default(),
            );
            (device, diff)
        })
        .collect()
}

/// Index records by key; the first record for a key wins
fn by_key(records: &[Record]) -> HashMap<CardNumber, &Record> {
    let mut index = HashMap::with_capacity(records.len());
    for record in records {
        index.entry(record.key()).or_insert(record);
    }
    index
}

fn compare_device(current: &[Record], authoritative: &[Record]) -> Diff {
    let current_by_key = by_key(current);
    let authoritative_by_key = by_key(authoritative);

    let mut diff = Diff::default();
    let mut seen = HashSet::new();

    for record in authoritative {
        if !seen.insert(record.key()) {
            continue;
        }
        match current_by_key.get(&record.key()) {
            Some(existing) if existing.same_fields(record) => {
                diff.unchanged.push(record.clone());
            }
            Some(existing) => diff.updated.push(Update {
                current: (*existing).clone(),
                authoritative: record.clone(),
            }),
            None => diff.added.push(record.clone()),
        }
    }

    seen.clear();
    for record in current {
        if seen.insert(record.key()) && !authoritative_by_key.contains_key(&record.key()) {
            diff.deleted.push(record.clone());
        }
    }

    diff
}
