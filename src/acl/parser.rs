// src/acl/parser.rs

//! Tab-separated ACL table parser
//!
//! The first non-empty line is a header naming the columns. `Device ID`,
//! `Card Number`, `From` and `To` are required; every other column names a
//! door and holds `Y`/`N`.
//!
//! ```text
//! Device ID	Card Number	From	To	Front Door	Workshop
//! 405419896	1001	2024-01-01	2024-12-31	Y	N
//! ```
//!
//! Structural problems (missing columns, undecodable input) fail the whole
//! parse with [`SchemaError`]. A bad row only produces a
//! [`ValidationError`] and is skipped.

use super::{Acl, CardNumber, DeviceId, Record};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use thiserror::Error;
use tracing::debug;

pub const COLUMN_DEVICE: &str = "Device ID";
pub const COLUMN_CARD: &str = "Card Number";
pub const COLUMN_FROM: &str = "From";
pub const COLUMN_TO: &str = "To";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Fatal table structure errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("ACL table is empty (no header row)")]
    Empty,

    #[error("ACL table is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("ACL table is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("ACL table has duplicate column '{0}'")]
    DuplicateColumn(String),
}

/// A single rejected row
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: invalid device ID '{value}'")]
    InvalidDevice { line: usize, value: String },

    #[error("line {line}: device {device} is not a configured controller")]
    UnknownDevice { line: usize, device: DeviceId },

    #[error("line {line}: device {device}: invalid card number '{value}'")]
    InvalidCard {
        line: usize,
        device: DeviceId,
        value: String,
    },

    #[error("line {line}: device {device}: invalid {column} date '{value}'")]
    InvalidDate {
        line: usize,
        device: DeviceId,
        column: &'static str,
        value: String,
    },

    #[error("line {line}: device {device}: card {card} is valid from {from} which is after {to}")]
    InvertedWindow {
        line: usize,
        device: DeviceId,
        card: CardNumber,
        from: NaiveDate,
        to: NaiveDate,
    },

    #[error("line {line}: device {device}: invalid value '{value}' for door '{door}' (expected Y or N)")]
    InvalidDoor {
        line: usize,
        device: DeviceId,
        door: String,
        value: String,
    },

    #[error("line {line}: device {device}: duplicate card number {card}")]
    DuplicateCard {
        line: usize,
        device: DeviceId,
        card: CardNumber,
    },
}

impl ValidationError {
    /// 1-based line number of the rejected row
    pub fn line(&self) -> usize {
        match self {
            ValidationError::FieldCount { line, .. }
            | ValidationError::InvalidDevice { line, .. }
            | ValidationError::UnknownDevice { line, .. }
            | ValidationError::InvalidCard { line, .. }
            | ValidationError::InvalidDate { line, .. }
            | ValidationError::InvertedWindow { line, .. }
            | ValidationError::InvalidDoor { line, .. }
            | ValidationError::DuplicateCard { line, .. } => *line,
        }
    }

    /// Device the row referenced, when it could be determined
    pub fn device(&self) -> Option<DeviceId> {
        match self {
            ValidationError::FieldCount { .. } | ValidationError::InvalidDevice { .. } => None,
            ValidationError::UnknownDevice { device, .. }
            | ValidationError::InvalidCard { device, .. }
            | ValidationError::InvalidDate { device, .. }
            | ValidationError::InvertedWindow { device, .. }
            | ValidationError::InvalidDoor { device, .. }
            | ValidationError::DuplicateCard { device, .. } => Some(*device),
        }
    }
}

/// Result of a successful parse
#[derive(Debug, Clone, Default)]
pub struct ParsedAcl {
    /// Records for every device that had at least one valid row
    pub acl: Acl,
    /// Rows that were skipped, in input order
    pub rejected: Vec<ValidationError>,
}

/// Column positions resolved from the header row
struct Columns {
    device: usize,
    card: usize,
    from: usize,
    to: usize,
    /// (position, door name) in header order
    doors: Vec<(usize, String)>,
    width: usize,
}

impl Columns {
    fn from_header(header: &str) -> Result<Self, SchemaError> {
        let names: Vec<&str> = header.split('\t').map(str::trim).collect();

        let mut seen = HashSet::new();
        for name in &names {
            if !name.is_empty() && !seen.insert(name.to_ascii_lowercase()) {
                return Err(SchemaError::DuplicateColumn(name.to_string()));
            }
        }

        let find = |wanted: &'static str| {
            names
                .iter()
                .position(|n| n.eq_ignore_ascii_case(wanted))
                .ok_or(SchemaError::MissingColumn(wanted))
        };

        let device = find(COLUMN_DEVICE)?;
        let card = find(COLUMN_CARD)?;
        let from = find(COLUMN_FROM)?;
        let to = find(COLUMN_TO)?;

        let doors = names
            .iter()
            .enumerate()
            .filter(|(i, name)| ![device, card, from, to].contains(i) && !name.is_empty())
            .map(|(i, name)| (i, name.to_string()))
            .collect();

        Ok(Self {
            device,
            card,
            from,
            to,
            doors,
            width: names.len(),
        })
    }
}

/// Parse a TSV ACL table.
///
/// `known_devices` is the set of configured controllers; rows for any other
/// device are rejected. Row order within a device is preserved.
pub fn parse(payload: &[u8], known_devices: &BTreeSet<DeviceId>) -> Result<ParsedAcl, SchemaError> {
    let text = std::str::from_utf8(payload).map_err(|e| SchemaError::Encoding(e.to_string()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty());

    let (_, header) = lines.next().ok_or(SchemaError::Empty)?;
    let columns = Columns::from_header(header)?;

    let mut parsed = ParsedAcl::default();
    let mut seen: HashSet<(DeviceId, CardNumber)> = HashSet::new();

    for (line, row) in lines {
        match parse_row(line, row, &columns, known_devices) {
            Ok((device, record)) => {
                if !seen.insert((device, record.card_number)) {
                    parsed.rejected.push(ValidationError::DuplicateCard {
                        line,
                        device,
                        card: record.card_number,
                    });
                    continue;
                }
                parsed.acl.push(device, record);
            }
            Err(e) => parsed.rejected.push(e),
        }
    }

    debug!(
        "Parsed ACL table: {} devices, {} records, {} rejected rows",
        parsed.acl.device_count(),
        parsed.acl.record_count(),
        parsed.rejected.len()
    );

    Ok(parsed)
}

fn parse_row(
    line: usize,
    row: &str,
    columns: &Columns,
    known_devices: &BTreeSet<DeviceId>,
) -> Result<(DeviceId, Record), ValidationError> {
    let fields: Vec<&str> = row.split('\t').map(str::trim).collect();
    if fields.len() != columns.width {
        return Err(ValidationError::FieldCount {
            line,
            expected: columns.width,
            found: fields.len(),
        });
    }

    let device: DeviceId = fields[columns.device]
        .parse()
        .map_err(|_| ValidationError::InvalidDevice {
            line,
            value: fields[columns.device].to_string(),
        })?;

    if !known_devices.contains(&device) {
        return Err(ValidationError::UnknownDevice { line, device });
    }

    let card: CardNumber = fields[columns.card]
        .parse()
        .ok()
        .filter(|card| *card != 0)
        .ok_or_else(|| ValidationError::InvalidCard {
            line,
            device,
            value: fields[columns.card].to_string(),
        })?;

    let date = |column: &'static str, value: &str| {
        NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| ValidationError::InvalidDate {
            line,
            device,
            column,
            value: value.to_string(),
        })
    };

    let from = date(COLUMN_FROM, fields[columns.from])?;
    let to = date(COLUMN_TO, fields[columns.to])?;
    if from > to {
        return Err(ValidationError::InvertedWindow {
            line,
            device,
            card,
            from,
            to,
        });
    }

    let mut doors = BTreeMap::new();
    for (index, door) in &columns.doors {
        let value = fields[*index];
        let allowed = match value.to_ascii_uppercase().as_str() {
            "Y" => true,
            "N" | "" => false,
            _ => {
                return Err(ValidationError::InvalidDoor {
                    line,
                    device,
                    door: door.clone(),
                    value: value.to_string(),
                });
            }
        };
        doors.insert(door.clone(), allowed);
    }

    Ok((
        device,
        Record {
            card_number: card,
            from,
            to,
            doors,
        },
    ))
}
