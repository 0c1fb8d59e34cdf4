//! Transaction commands.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use minibit_core::Transaction;
use minibit_sync::{RelayClient, SyncConfig};
use std::path::PathBuf;

use super::key::load_identity;

pub async fn pay(to: String, amount: u64, data_dir: PathBuf, relay: String) -> Result<()> {
    if amount == 0 {
        bail!("Amount must be at least 1");
    }

    let identity = load_identity(&data_dir)?;
    let tx = Transaction::coin(&identity, to.as_str(), amount)
        .context("Failed to sign the transaction")?;

    println!("{}", "Sending coins...".bold().cyan());
    println!();
    println!("  From:   {}", identity.address().bright_yellow());
    println!("  To:     {}", to.bright_yellow());
    println!("  Amount: {}", amount.to_string().bright_cyan());

    let client = RelayClient::connect(relay, SyncConfig::default())
        .await
        .context("Failed to reach the relay")?;
    client
        .propagate_transaction(&tx)
        .await
        .context("Failed to propagate the transaction")?;

    println!();
    println!(
        "{}  Broadcast as {}",
        "✓".green().bold(),
        tx.hash.bright_black()
    );
    println!();

    Ok(())
}

pub async fn sign_text(
    output: String,
    body: String,
    author: Option<String>,
    data_dir: PathBuf,
    relay: String,
) -> Result<()> {
    let author = match author {
        Some(author) => author,
        None => load_identity(&data_dir)?.address().to_string(),
    };
    let tx = Transaction::text(author.as_str(), output.as_str(), body);

    println!("{}", "Publishing text...".bold().cyan());
    println!();
    println!("  Author: {}", author.bright_yellow());
    println!("  Output: {}", output.bright_yellow());

    let client = RelayClient::connect(relay, SyncConfig::default())
        .await
        .context("Failed to reach the relay")?;
    client
        .propagate_transaction(&tx)
        .await
        .context("Failed to propagate the transaction")?;

    println!();
    println!(
        "{}  Broadcast as {}",
        "✓".green().bold(),
        tx.hash.bright_black()
    );
    println!();

    Ok(())
}
