// src/cli/mod.rs
//! CLI definitions for acldiff
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "acldiff")]
#[command(version)]
#[command(about = "Reconcile controller ACLs against a signed authoritative ACL", long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare the authoritative ACL with the current device state
    Compare {
        /// URI of the signed ACL archive (http, https, s3, file)
        #[arg(long)]
        acl: String,

        /// URI to upload the signed report archive to
        #[arg(long)]
        report: Option<String>,

        /// TSV snapshot of the current device state
        #[arg(long)]
        current: Option<String>,

        /// Configuration file
        #[arg(long, default_value = acldiff::config::DEFAULT_CONFIG_PATH)]
        config: String,

        /// Directory for local report files
        #[arg(long)]
        workdir: Option<String>,

        /// Directory of trusted <signer>.pub keys
        #[arg(long)]
        keys: Option<String>,

        /// Private key used to sign the uploaded report
        #[arg(long)]
        key: Option<String>,

        /// Report template (handlebars)
        #[arg(long)]
        template: Option<String>,

        /// Skip signature verification (debugging only)
        #[arg(long)]
        no_verify: bool,

        /// Print the report to stdout instead of writing a file
        #[arg(long)]
        no_report: bool,
    },

    /// Generate an Ed25519 signing key pair
    Keygen {
        /// Output path (without extension) for the key files
        output: String,

        /// Key identifier; also the signer name in signed archives
        #[arg(long)]
        key_id: String,

        /// Overwrite existing key files
        #[arg(long)]
        force: bool,
    },

    /// Sign an ACL table and pack it into an archive
    Sign {
        /// TSV file to sign
        tsv: String,

        /// Private key file
        #[arg(short, long)]
        key: String,

        /// Output archive path
        #[arg(short, long)]
        output: String,
    },

    /// Verify a signed archive
    Verify {
        /// Archive file to verify
        archive: String,

        /// Directory of trusted <signer>.pub keys
        #[arg(long, default_value = acldiff::config::DEFAULT_KEYS_DIR)]
        keys: String,
    },
}
