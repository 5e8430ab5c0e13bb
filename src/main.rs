// src/main.rs

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout is reserved for command output and reports
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Compare {
            acl,
            report,
            current,
            config,
            workdir,
            keys,
            key,
            template,
            no_verify,
            no_report,
        } => commands::cmd_compare(commands::CompareArgs {
            acl,
            report,
            current,
            config,
            workdir,
            keys,
            key,
            template,
            no_verify,
            no_report,
        }),

        Commands::Keygen { output, key_id, force } => commands::cmd_keygen(&output, &key_id, force),

        Commands::Sign { tsv, key, output } => commands::cmd_sign(&tsv, &key, &output),

        Commands::Verify { archive, keys } => commands::cmd_verify(&archive, &keys),
    }
}
