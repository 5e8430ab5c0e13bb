// src/pipeline.rs

//! Reconciliation pipeline
//!
//! One run is strictly sequential:
//!
//! 1. fetch the signed ACL archive
//! 2. unpack payload, signer and signature
//! 3. verify the signature (or log an explicit bypass)
//! 4. parse the ACL table, skipping invalid rows
//! 5. read the current state of every configured device
//! 6. diff, render, and write the local report
//! 7. optionally sign, bundle and upload the report
//!
//! Structural and integrity failures abort before anything is diffed. The
//! local report is materialized before the upload step, so a signing or
//! upload failure never loses it.

use crate::acl::{self, DeviceId, DiffSummary};
use crate::bundle::{self, KeyStore, Unpacked};
use crate::config::Config;
use crate::device::DeviceStateSource;
use crate::error::{Error, Result};
use crate::report::{self, ReportError};
use crate::transport::Transports;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// How the payload's integrity was established
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Signature checked against `<signer>.pub`
    Verified { signer: String },
    /// Verification skipped because `no_verify` is set
    Bypassed { signer: String },
}

impl Verification {
    pub fn signer(&self) -> &str {
        match self {
            Verification::Verified { signer } | Verification::Bypassed { signer } => signer,
        }
    }

    pub fn is_bypassed(&self) -> bool {
        matches!(self, Verification::Bypassed { .. })
    }
}

/// Where the rendered report went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutput {
    File(PathBuf),
    Stdout,
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub acl_uri: String,
    pub verification: Verification,
    /// Rows skipped by the table parser
    pub rejected_rows: usize,
    /// Classification counts per device, ascending device ID
    pub devices: BTreeMap<DeviceId, DiffSummary>,
    pub report: ReportOutput,
    pub report_text: String,
    /// Upload destination, when a report URI was given
    pub uploaded_to: Option<String>,
}

impl RunSummary {
    /// Records needing attention across all devices
    pub fn total_changes(&self) -> usize {
        self.devices
            .values()
            .map(|s| s.updated + s.added + s.deleted)
            .sum()
    }
}

/// The reconciliation pipeline
pub struct Pipeline<S> {
    config: Config,
    transports: Transports,
    source: S,
}

impl<S: DeviceStateSource> Pipeline<S> {
    pub fn new(config: Config, transports: Transports, source: S) -> Self {
        Self {
            config,
            transports,
            source,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run against the ACL at `acl_uri`, uploading the report to
    /// `report_uri` when given
    pub fn run(&self, acl_uri: &str, report_uri: Option<&str>) -> Result<RunSummary> {
        self.run_at(acl_uri, report_uri, Utc::now())
    }

    /// [`run`](Self::run) with an explicit generation timestamp
    pub fn run_at(
        &self,
        acl_uri: &str,
        report_uri: Option<&str>,
        timestamp: DateTime<Utc>,
    ) -> Result<RunSummary> {
        let template = report::load_template(self.config.template.as_deref())?;

        info!("Fetching ACL from {}", acl_uri);
        let bytes = self.transports.fetch(acl_uri)?;

        let unpacked = bundle::unpack(&bytes)?;
        info!(
            "Extracted ACL from {}: {} ({} bytes), signature: {} bytes",
            acl_uri,
            unpacked.payload_name,
            unpacked.payload.len(),
            unpacked.signature.len()
        );

        let verification = self.verify(acl_uri, &unpacked)?;

        let parsed = acl::parse(&unpacked.payload, &self.config.device_ids()).map_err(|source| {
            Error::Schema {
                uri: acl_uri.to_string(),
                source,
            }
        })?;

        for rejected in &parsed.rejected {
            warn!("Skipping invalid ACL row: {}", rejected);
        }
        if !parsed.rejected.is_empty() {
            warn!("{} ACL rows skipped", parsed.rejected.len());
        }
        for (device, records) in parsed.acl.iter() {
            info!("{}  Retrieved {} records", device, records.len());
        }

        let current = self.source.current_acl(&self.config.devices)?;
        info!(
            "Retrieved current ACL: {} devices, {} records",
            current.device_count(),
            current.record_count()
        );

        let diffs = acl::compare(&current, &parsed.acl);
        for (device, diff) in &diffs {
            info!("{}  {}", device, diff.summary());
        }

        info!("Generating ACL 'diff' report");
        let text = report::render(timestamp, &diffs, &template)?;
        let output = self.write_local(timestamp, &text)?;

        let uploaded_to = match report_uri {
            Some(uri) => {
                if let Err(e) = self.upload(uri, &text, timestamp) {
                    error!("Report upload to {} failed; local report retained ({:?})", uri, output);
                    return Err(e);
                }
                Some(uri.to_string())
            }
            None => None,
        };

        Ok(RunSummary {
            acl_uri: acl_uri.to_string(),
            verification,
            rejected_rows: parsed.rejected.len(),
            devices: diffs.iter().map(|(id, diff)| (*id, diff.summary())).collect(),
            report: output,
            report_text: text,
            uploaded_to,
        })
    }

    fn verify(&self, uri: &str, unpacked: &Unpacked) -> Result<Verification> {
        let signer = unpacked.signer.clone();

        if self.config.no_verify {
            warn!(
                "Signature verification BYPASSED for signer '{}' on {} (no-verify is set)",
                signer, uri
            );
            return Ok(Verification::Bypassed { signer });
        }

        KeyStore::new(&self.config.keys_dir).verify(&signer, &unpacked.payload, &unpacked.signature)?;
        info!("Verified signature from '{}' on {}", signer, uri);
        Ok(Verification::Verified { signer })
    }

    fn write_local(&self, timestamp: DateTime<Utc>, text: &str) -> Result<ReportOutput> {
        if self.config.no_report {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(text.as_bytes())
                .and_then(|_| stdout.flush())
                .map_err(|source| ReportError::Write {
                    path: PathBuf::from("<stdout>"),
                    source,
                })?;
            return Ok(ReportOutput::Stdout);
        }

        let path = report::write_report(&self.config.workdir, timestamp, text)?;
        info!("Wrote 'diff' report to {}", path.display());
        Ok(ReportOutput::File(path))
    }

    fn upload(&self, uri: &str, text: &str, timestamp: DateTime<Utc>) -> Result<()> {
        info!("Uploading ACL 'diff' report");

        let mtime = u64::try_from(timestamp.timestamp()).unwrap_or_default();
        let bytes = bundle::package_with_key_file(text.as_bytes(), &self.config.signing_key, mtime)?;

        self.transports.store(uri, &bytes)?;
        info!("Uploaded report to {}", uri);
        Ok(())
    }
}
