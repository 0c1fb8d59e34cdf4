//! Balance and chain queries.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use minibit_consensus::Validator;
use minibit_core::ChainParams;
use minibit_ledger::Ledger;
use minibit_store::ChainStore;
use minibit_sync::{FullSyncOutcome, RelayClient, Replicator, SyncConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::key::load_identity;

pub async fn balance(address: Option<String>, data_dir: PathBuf, relay: String) -> Result<()> {
    let address = match address {
        Some(address) => address,
        None => load_identity(&data_dir)?.address().to_string(),
    };

    let client = RelayClient::connect(relay, SyncConfig::default())
        .await
        .context("Failed to reach the relay")?;
    let ledger = Arc::new(Mutex::new(Ledger::new()));
    let validator = Arc::new(Validator::new(ChainParams::default()));
    let replicator = Replicator::new(client, ledger.clone(), validator);

    let outcome = replicator
        .full_sync()
        .await
        .context("Failed to replicate the chain")?;
    if outcome == FullSyncOutcome::NoAnswers {
        bail!("No peer answered the sync request. Is a node running?");
    }

    let ledger = ledger.lock().await;
    println!();
    println!("  Address: {}", address.bright_yellow());
    println!(
        "  Balance: {}",
        ledger.balance(&address).to_string().bright_cyan()
    );
    println!(
        "  Height:  {}",
        ledger.depth().to_string().bright_black()
    );
    println!();

    Ok(())
}

pub fn chain(data_dir: PathBuf, count: usize) -> Result<()> {
    let store = ChainStore::open(data_dir.join("chain"))
        .context("Failed to open the chain database. Is a node using it right now?")?;
    let blocks = store.load().context("Failed to read the stored chain")?;

    if blocks.is_empty() {
        println!("{}", "No chain stored yet.".yellow());
        println!("Run {} to start one.", "minibit-node mine".bright_cyan());
        return Ok(());
    }

    println!();
    println!("{}", "Stored chain:".bold().cyan());
    println!();
    println!("  Height: {}", blocks.len().to_string().bright_cyan());
    println!(
        "  Tip:    {}",
        blocks
            .last()
            .map(|b| b.hash.as_str())
            .unwrap_or("-")
            .bright_yellow()
    );
    println!();

    for (height, block) in blocks.iter().enumerate().rev().take(count) {
        println!(
            "  {} {} {}",
            format!("#{}", height).bright_black(),
            short_hash(&block.hash).bright_yellow(),
            format!("({} txs)", block.transactions.len()).bright_black()
        );
    }

    println!();
    Ok(())
}

fn short_hash(hash: &str) -> &str {
    if hash.len() > 16 {
        &hash[..16]
    } else {
        hash
    }
}
