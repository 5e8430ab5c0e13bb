// src/commands/signing.rs

//! Key management and archive signing
//!
//! Commands for generating signing keys, signing ACL tables and verifying
//! signed archives.

use acldiff::bundle::signing::{PRIVATE_KEY_EXTENSION, PUBLIC_KEY_EXTENSION};
use acldiff::bundle::{self, KeyStore, SigningKeyPair};
use anyhow::{Context, Result};
use std::path::Path;

/// Generate an Ed25519 signing key pair
pub fn cmd_keygen(output: &str, key_id: &str, force: bool) -> Result<()> {
    if key_id.trim().is_empty() || key_id.contains(['/', '\\', '.']) {
        anyhow::bail!("Invalid key ID '{}': must be a plain signer name", key_id);
    }

    let private_path = Path::new(output).with_extension(PRIVATE_KEY_EXTENSION);
    let public_path = Path::new(output).with_extension(PUBLIC_KEY_EXTENSION);

    if !force && (private_path.exists() || public_path.exists()) {
        anyhow::bail!(
            "Key files already exist. Use --force to overwrite.\n  Private: {}\n  Public: {}",
            private_path.display(),
            public_path.display()
        );
    }

    let keypair = SigningKeyPair::generate().with_key_id(key_id);
    keypair
        .save_to_files(&private_path, &public_path)
        .context("Failed to save key files")?;

    println!("Key pair generated for signer '{}'", key_id);
    println!("  Private key: {} (keep this secret!)", private_path.display());
    println!("  Public key:  {}", public_path.display());
    println!();
    println!("Public key (base64):");
    println!("  {}", keypair.public_key_base64());
    println!();
    println!("Install the public key as {}.{} in the verifier's keys directory.", key_id, PUBLIC_KEY_EXTENSION);

    Ok(())
}

/// Sign an ACL table and write it as a signed archive
pub fn cmd_sign(tsv: &str, key_path: &str, output: &str) -> Result<()> {
    let tsv_path = Path::new(tsv);
    let key_path = Path::new(key_path);

    let table = std::fs::read(tsv_path).with_context(|| format!("Failed to read ACL table {}", tsv_path.display()))?;

    let keypair = SigningKeyPair::load_from_file(key_path).context("Failed to load signing key")?;

    let mtime = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
    let bytes = bundle::package_acl(&table, &keypair, key_path, mtime).context("Failed to sign ACL table")?;

    std::fs::write(output, &bytes).with_context(|| format!("Failed to write archive {}", output))?;

    println!("Signed {} ({} bytes)", tsv_path.display(), table.len());
    println!("  Output: {}", output);
    if let Some(key_id) = keypair.key_id() {
        println!("  Signer: {}", key_id);
    }

    Ok(())
}

/// Verify a signed archive against the trusted keys directory
pub fn cmd_verify(archive: &str, keys_dir: &str) -> Result<()> {
    let bytes = std::fs::read(archive).with_context(|| format!("Failed to read archive {}", archive))?;

    let unpacked = bundle::unpack(&bytes).with_context(|| format!("Malformed archive {}", archive))?;

    KeyStore::new(keys_dir)
        .verify(&unpacked.signer, &unpacked.payload, &unpacked.signature)
        .with_context(|| format!("Verification failed for {}", archive))?;

    println!("Verified: {}", archive);
    println!("  Payload: {} ({} bytes)", unpacked.payload_name, unpacked.payload.len());
    println!("  Signer:  {}", unpacked.signer);

    Ok(())
}
