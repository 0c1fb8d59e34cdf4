//! Node entry point.

use anyhow::Context;
use clap::{Parser, Subcommand};
use minibit_node::{Node, NodeSettings};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinSet;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "minibit-node")]
#[command(about = "Proof-of-work miner and chain replicator", long_about = None)]
struct Cli {
    /// Base url of the relay
    #[arg(short, long, default_value = "http://127.0.0.1:9000")]
    relay: String,

    /// Directory for the key file and chain database
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Mine blocks and take part in consensus
    Mine,
    /// Follow and persist the chain without mining
    Watch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let settings = NodeSettings {
        relay_url: cli.relay.clone(),
        key_path: cli.data_dir.join("identity.pem"),
        store_path: cli.data_dir.join("chain"),
        ..NodeSettings::default()
    };
    let node = Arc::new(
        Node::connect(settings)
            .await
            .with_context(|| format!("connecting to the relay at {}", cli.relay))?,
    );

    let mut tasks = JoinSet::new();
    match cli.command {
        Command::Mine => {
            let miner = node.clone();
            tasks.spawn(async move { miner.mine_loop().await });
            let answerer = node.clone();
            tasks.spawn(async move { answerer.answer_loop().await });
            let merger = node.clone();
            tasks.spawn(async move { merger.transaction_loop().await });
            let counter = node.clone();
            tasks.spawn(async move { counter.peer_count_loop().await });
        }
        Command::Watch => {
            let watcher = node.clone();
            tasks.spawn(async move { watcher.watch_loop().await });
            let answerer = node.clone();
            tasks.spawn(async move { answerer.answer_loop().await });
        }
    }

    tokio::select! {
        biased;
        _ = signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
        }
        Some(result) = tasks.join_next() => {
            match result {
                Ok(Err(err)) => error!(error = %err, "node task failed"),
                Err(err) => error!(error = %err, "node task panicked"),
                Ok(Ok(())) => {}
            }
        }
    }
    tasks.shutdown().await;
    info!("node stopped");
    Ok(())
}
