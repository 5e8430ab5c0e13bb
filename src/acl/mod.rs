// src/acl/mod.rs

//! Access control lists
//!
//! An ACL maps a controller (device) to the ordered list of card records it
//! holds. Two ACLs meet in the pipeline: the *authoritative* one parsed from
//! a signed archive and the *current* one read back from the controllers.
//! Both share the [`Record`] shape, so they can be compared directly by
//! [`diff::compare`].

pub mod diff;
pub mod parser;

pub use diff::{compare, Diff, DiffSummary, Update};
pub use parser::{parse, ParsedAcl, SchemaError, ValidationError};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Controller serial number
pub type DeviceId = u32;

/// Card (credential) number, unique within a device's record set
pub type CardNumber = u32;

/// A configured access controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Device {
    /// Controller serial number
    pub id: DeviceId,
    /// Human-readable name, used only in log output
    #[serde(default)]
    pub name: Option<String>,
    /// Network address (`host:port`) for pollers that need one
    #[serde(default)]
    pub address: Option<String>,
}

impl Device {
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            name: None,
            address: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", self.id, name),
            None => write!(f, "{}", self.id),
        }
    }
}

/// A single card record held by a controller.
///
/// Identity is the card number; `from`, `to` and `doors` are the compared
/// fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub card_number: CardNumber,
    /// First day the card is valid (inclusive)
    pub from: NaiveDate,
    /// Last day the card is valid (inclusive)
    pub to: NaiveDate,
    /// Door name -> access granted
    pub doors: BTreeMap<String, bool>,
}

impl Record {
    pub fn new(card_number: CardNumber, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            card_number,
            from,
            to,
            doors: BTreeMap::new(),
        }
    }

    /// Builder helper to grant or deny a door
    pub fn with_door(mut self, door: &str, allowed: bool) -> Self {
        self.doors.insert(door.to_string(), allowed);
        self
    }

    /// Record identity used by the diff engine
    pub fn key(&self) -> CardNumber {
        self.card_number
    }

    /// True when every compared field matches `other`
    pub fn same_fields(&self, other: &Record) -> bool {
        self.from == other.from && self.to == other.to && self.doors == other.doors
    }

    /// Names of the doors this card may open, in sorted order
    pub fn permitted_doors(&self) -> Vec<&str> {
        self.doors
            .iter()
            .filter(|(_, allowed)| **allowed)
            .map(|(door, _)| door.as_str())
            .collect()
    }

    /// Field values without the card number, used when showing old vs. new
    pub fn fields(&self) -> String {
        let doors = self.permitted_doors();
        let doors = if doors.is_empty() {
            "-".to_string()
        } else {
            doors.join(",")
        };
        format!("{}:{} {}", self.from, self.to, doors)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.card_number, self.fields())
    }
}

/// Per-device ordered record lists.
///
/// Devices are kept in ascending ID order so every traversal is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acl {
    devices: BTreeMap<DeviceId, Vec<Record>>,
}

impl Acl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record to a device's list, creating the device if needed
    pub fn push(&mut self, device: DeviceId, record: Record) {
        self.devices.entry(device).or_default().push(record);
    }

    /// Replace a device's entire record list
    pub fn insert(&mut self, device: DeviceId, records: Vec<Record>) {
        self.devices.insert(device, records);
    }

    pub fn records(&self, device: DeviceId) -> Option<&[Record]> {
        self.devices.get(&device).map(Vec::as_slice)
    }

    pub fn contains_device(&self, device: DeviceId) -> bool {
        self.devices.contains_key(&device)
    }

    /// Device IDs in ascending order
    pub fn device_ids(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.devices.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeviceId, &[Record])> {
        self.devices.iter().map(|(id, records)| (*id, records.as_slice()))
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    pub fn record_count(&self) -> usize {
        self.devices.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl FromIterator<(DeviceId, Vec<Record>)> for Acl {
    fn from_iter<I: IntoIterator<Item = (DeviceId, Vec<Record>)>>(iter: I) -> Self {
        Self {
            devices: iter.into_iter().collect(),
        }
    }
}
