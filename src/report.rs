// src/report.rs

//! ACL diff report rendering
//!
//! Reports are rendered with Handlebars. The template receives:
//!
//! ```text
//! timestamp: "2024-05-01 10:15:30 UTC"
//! devices:   [ { id, synchronized, unchanged, updated, added, deleted } ]
//! ```
//!
//! `devices` is ordered by ascending device ID and every record list is
//! already formatted as text, in diff engine order. Only devices present in
//! the diff mapping are rendered.

use crate::acl::{DeviceId, Diff};
use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Built-in report template
pub const DEFAULT_TEMPLATE: &str = "ACL DIFF REPORT {{timestamp}}
{{#each devices}}
  DEVICE {{id}}{{#if synchronized}}
    No differences{{/if}}{{#if updated}}
    Incorrect:  {{#each updated}}{{this}}
                {{/each}}{{/if}}{{#if added}}
    Missing:    {{#each added}}{{this}}
                {{/each}}{{/if}}{{#if deleted}}
    Unexpected: {{#each deleted}}{{this}}
                {{/each}}{{/if}}
{{/each}}
";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";
const FILENAME_FORMAT: &str = "acl-%Y-%m-%dT%H%M%S%.3f.rpt";

/// Report rendering and persistence errors
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to render report: {0}")]
    Render(String),

    #[error("Failed to write report {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read report template {}: {source}", path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Serialize)]
struct ReportContext {
    timestamp: String,
    devices: Vec<DeviceSection>,
}

#[derive(Debug, Serialize)]
struct DeviceSection {
    id: DeviceId,
    synchronized: bool,
    unchanged: Vec<String>,
    updated: Vec<String>,
    added: Vec<String>,
    deleted: Vec<String>,
}

impl DeviceSection {
    fn new(id: DeviceId, diff: &Diff) -> Self {
        Self {
            id,
            synchronized: diff.is_synchronized(),
            unchanged: diff.unchanged.iter().map(ToString::to_string).collect(),
            updated: diff.updated.iter().map(ToString::to_string).collect(),
            added: diff.added.iter().map(ToString::to_string).collect(),
            deleted: diff.deleted.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Render `diffs` through `template`.
///
/// Pure: the output depends only on the arguments.
pub fn render(
    timestamp: DateTime<Utc>,
    diffs: &BTreeMap<DeviceId, Diff>,
    template: &str,
) -> Result<String, ReportError> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);
    handlebars.register_escape_fn(handlebars::no_escape);

    let context = ReportContext {
        timestamp: timestamp.format(TIMESTAMP_FORMAT).to_string(),
        devices: diffs
            .iter()
            .map(|(id, diff)| DeviceSection::new(*id, diff))
            .collect(),
    };

    handlebars
        .render_template(template, &context)
        .map_err(|e| ReportError::Render(e.to_string()))
}

/// Load a template file, falling back to [`DEFAULT_TEMPLATE`] when no path
/// is configured
pub fn load_template(path: Option<&Path>) -> Result<String, ReportError> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|source| ReportError::Template {
            path: path.to_path_buf(),
            source,
        }),
        None => Ok(DEFAULT_TEMPLATE.to_string()),
    }
}

/// Report file name for a generation time, e.g. `acl-2024-05-01T101530.123.rpt`
pub fn report_filename(timestamp: DateTime<Utc>) -> String {
    timestamp.format(FILENAME_FORMAT).to_string()
}

/// Write a rendered report into `dir`.
///
/// The file is created exclusively (an existing file is never overwritten
/// or appended to) and is flushed and synced before returning. The handle
/// is closed on every path out of this function.
pub fn write_report(dir: &Path, timestamp: DateTime<Utc>, text: &str) -> Result<PathBuf, ReportError> {
    let path = dir.join(report_filename(timestamp));
    let write_err = |source: io::Error| ReportError::Write {
        path: path.clone(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(&write_err)?;
    create_exclusive(&path, text.as_bytes(), write_and_sync).map_err(&write_err)?;

    Ok(path)
}

/// Create `path` (never an existing file) and fill it with `write`.
///
/// The file is removed again when `write` fails, so a partial report never
/// looks like a finished one.
fn create_exclusive<F>(path: &Path, bytes: &[u8], write: F) -> io::Result<()>
where
    F: FnOnce(File, &[u8]) -> io::Result<()>,
{
    let file = OpenOptions::new().write(true).create_new(true).open(path)?;

    if let Err(e) = write(file, bytes) {
        if let Err(cleanup) = std::fs::remove_file(path) {
            warn!("Failed to remove incomplete report {}: {}", path.display(), cleanup);
        }
        return Err(e);
    }

    Ok(())
}

fn write_and_sync(file: File, bytes: &[u8]) -> io::Result<()> {
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes)?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::{Acl, Record, compare};
    use chrono::{NaiveDate, TimeZone};
    use tempfile::TempDir;

    fn record(card: u32, door: &str) -> Record {
        Record::new(
            card,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
        .with_door(door, true)
    }

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 15, 30).unwrap()
    }

    fn sample_diffs() -> BTreeMap<DeviceId, Diff> {
        let authoritative: Acl = [
            (1, vec![record(1001, "doorA")]),
            (20, vec![record(5, "Front")]),
            (3, vec![record(7, "Front")]),
        ]
        .into_iter()
        .collect();
        let current: Acl = [
            (1, vec![record(1001, "doorB"), record(1002, "doorA")]),
            (3, vec![record(7, "Front")]),
        ]
        .into_iter()
        .collect();
        compare(&current, &authoritative)
    }

    #[test]
    fn test_render_default_template() {
        let text = render(timestamp(), &sample_diffs(), DEFAULT_TEMPLATE).unwrap();

        assert!(text.starts_with("ACL DIFF REPORT 2024-05-01 10:15:30 UTC\n"));
        assert!(text.contains("Incorrect:  1001 2024-01-01:2024-12-31 doorB -> 2024-01-01:2024-12-31 doorA"));
        assert!(text.contains("Unexpected: 1002 2024-01-01:2024-12-31 doorA"));
        assert!(text.contains("Missing:    5 2024-01-01:2024-12-31 Front"));

        let one = text.find("DEVICE 1\n").unwrap();
        let three = text.find("DEVICE 3\n").unwrap();
        let twenty = text.find("DEVICE 20\n").unwrap();
        assert!(one < three && three < twenty);
    }

    #[test]
    fn test_synchronized_device_is_rendered() {
        let text = render(timestamp(), &sample_diffs(), DEFAULT_TEMPLATE).unwrap();
        let section = &text[text.find("DEVICE 3").unwrap()..text.find("DEVICE 20").unwrap()];
        assert!(section.contains("No differences"));
        assert!(!section.contains("Incorrect"));
        assert!(!section.contains("Missing"));
        assert!(!section.contains("Unexpected"));
    }

    #[test]
    fn test_render_is_pure() {
        let diffs = sample_diffs();
        let a = render(timestamp(), &diffs, DEFAULT_TEMPLATE).unwrap();
        let b = render(timestamp(), &diffs, DEFAULT_TEMPLATE).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_render_empty_diff_set() {
        let text = render(timestamp(), &BTreeMap::new(), DEFAULT_TEMPLATE).unwrap();
        assert!(text.starts_with("ACL DIFF REPORT"));
        assert!(!text.contains("DEVICE"));
    }

    #[test]
    fn test_custom_template() {
        let template = "{{#each devices}}{{id}}:{{#if synchronized}}ok{{else}}drift{{/if}}{{#unless @last}},{{/unless}}{{/each}}";
        let text = render(timestamp(), &sample_diffs(), template).unwrap();
        assert_eq!(text, "1:drift,3:ok,20:drift");
    }

    #[test]
    fn test_no_html_escaping() {
        let text = render(timestamp(), &sample_diffs(), "{{#each devices}}{{#each updated}}{{this}}{{/each}}{{/each}}").unwrap();
        assert!(text.contains("->"));
        assert!(!text.contains("&gt;"));
    }

    #[test]
    fn test_invalid_template() {
        let err = render(timestamp(), &sample_diffs(), "{{#each devices}").unwrap_err();
        assert!(matches!(err, ReportError::Render(_)));

        let err = render(timestamp(), &sample_diffs(), "{{no_such_field}}").unwrap_err();
        assert!(matches!(err, ReportError::Render(_)));
    }

    #[test]
    fn test_write_report_never_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_report(temp_dir.path(), timestamp(), "first").unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "acl-2024-05-01T101530.000.rpt"
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first");

        let err = write_report(temp_dir.path(), timestamp(), "second").unwrap_err();
        assert!(matches!(err, ReportError::Write { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first");
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(report_filename(timestamp()));

        let err = create_exclusive(&path, b"ACL DIFF REPORT", |mut file, bytes| {
            file.write_all(&bytes[..3])?;
            Err(io::Error::other("disk full"))
        })
        .unwrap_err();

        assert_eq!(err.to_string(), "disk full");
        assert!(!path.exists());

        // The name is free again for a retry
        create_exclusive(&path, b"ok", write_and_sync).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ok");
    }

    #[test]
    fn test_load_template() {
        assert_eq!(load_template(None).unwrap(), DEFAULT_TEMPLATE);

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("custom.hbs");
        std::fs::write(&path, "{{timestamp}}").unwrap();
        assert_eq!(load_template(Some(&path)).unwrap(), "{{timestamp}}");

        assert!(matches!(
            load_template(Some(&temp_dir.path().join("missing.hbs"))),
            Err(ReportError::Template { .. })
        ));
    }
}
