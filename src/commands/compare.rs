// src/commands/compare.rs

//! The `compare` command: one reconciliation run

use acldiff::{Config, Pipeline, ReportOutput, RunSummary, SnapshotSource, Transports};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Flags for `acldiff compare`; set values override the config file
pub struct CompareArgs {
    pub acl: String,
    pub report: Option<String>,
    pub current: Option<String>,
    pub config: String,
    pub workdir: Option<String>,
    pub keys: Option<String>,
    pub key: Option<String>,
    pub template: Option<String>,
    pub no_verify: bool,
    pub no_report: bool,
}

impl CompareArgs {
    fn resolve(&self) -> Result<Config> {
        let mut config = Config::load(Path::new(&self.config))
            .with_context(|| format!("Failed to load configuration from {}", self.config))?;

        if let Some(workdir) = &self.workdir {
            config.workdir = PathBuf::from(workdir);
        }
        if let Some(keys) = &self.keys {
            config.keys_dir = PathBuf::from(keys);
        }
        if let Some(key) = &self.key {
            config.signing_key = PathBuf::from(key);
        }
        if let Some(template) = &self.template {
            config.template = Some(PathBuf::from(template));
        }
        if let Some(current) = &self.current {
            config.snapshot = Some(PathBuf::from(current));
        }
        config.no_verify |= self.no_verify;
        config.no_report |= self.no_report;

        debug!("Resolved configuration: {:?}", config);
        Ok(config)
    }
}

/// Fetch, verify and diff the authoritative ACL against current device state
pub fn cmd_compare(args: CompareArgs) -> Result<()> {
    let config = args.resolve()?;

    let snapshot = config.snapshot.clone().ok_or_else(|| {
        anyhow::anyhow!("No device state available: pass --current or set 'snapshot' in the config file")
    })?;

    if config.devices.is_empty() {
        warn!("No devices configured; every ACL row will be rejected");
    }

    let transports = Transports::from_config(&config).context("Failed to initialize transports")?;
    let pipeline = Pipeline::new(config, transports, SnapshotSource::new(snapshot));

    let summary = pipeline
        .run(&args.acl, args.report.as_deref())
        .with_context(|| format!("ACL comparison failed for {}", args.acl))?;

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    // stdout carries the report itself in no-report mode
    if summary.report == ReportOutput::Stdout {
        return;
    }

    let verification = if summary.verification.is_bypassed() {
        "NOT VERIFIED (bypassed)"
    } else {
        "verified"
    };

    println!("ACL: {}", summary.acl_uri);
    println!("  Signer: {} ({})", summary.verification.signer(), verification);
    if summary.rejected_rows > 0 {
        println!("  Rejected rows: {}", summary.rejected_rows);
    }
    println!();

    for (device, counts) in &summary.devices {
        println!("  {:<12} {}", device, counts);
    }

    println!();
    if let ReportOutput::File(path) = &summary.report {
        println!("Report: {}", path.display());
    }
    if let Some(uri) = &summary.uploaded_to {
        println!("Uploaded: {}", uri);
    }
}
