//! Identity commands.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use minibit_core::Identity;
use std::fs;
use std::path::{Path, PathBuf};

pub fn key_path(data_dir: &Path) -> PathBuf {
    data_dir.join("identity.pem")
}

/// Load the identity stored under the data directory, failing with a
/// hint when none exists yet.
pub fn load_identity(data_dir: &Path) -> Result<Identity> {
    let path = key_path(data_dir);
    if !path.exists() {
        bail!(
            "No identity at {}. Use 'minibit keygen' to create one.",
            path.display()
        );
    }
    let pem =
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    Identity::from_private_pem(&pem).context("Failed to parse the identity key")
}

pub fn keygen(data_dir: PathBuf) -> Result<()> {
    let path = key_path(&data_dir);
    if path.exists() {
        bail!("An identity already exists at {}", path.display());
    }

    let identity = Identity::load_or_generate(&path).context("Failed to generate the identity")?;

    println!("{}", "Generated new identity:".bold().cyan());
    println!();
    println!("  Address: {}", identity.address().bright_yellow());
    println!();
    println!(
        "{}  Saved to: {}",
        "✓".green().bold(),
        path.display().to_string().bright_black()
    );
    println!();
    println!("{}", "Keep your key file safe!".yellow().bold());

    Ok(())
}

pub fn address(data_dir: PathBuf) -> Result<()> {
    let identity = load_identity(&data_dir)?;

    println!();
    println!("  Address: {}", identity.address().bright_yellow());
    println!();

    Ok(())
}
