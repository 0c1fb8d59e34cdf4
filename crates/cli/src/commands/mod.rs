//! CLI commands module.

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

mod key;
mod query;
mod transact;

const DEFAULT_RELAY: &str = "http://127.0.0.1:9000";

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a new identity
    Keygen {
        /// Directory for the key file
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,
    },
    /// Print the address of the local identity
    Address {
        /// Directory for the key file
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,
    },
    /// Check a balance against the live chain
    Balance {
        /// Address to check, the local identity by default
        address: Option<String>,

        /// Directory for the key file
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,

        /// Base url of the relay
        #[arg(short, long, default_value = DEFAULT_RELAY)]
        relay: String,
    },
    /// Send coins to an address
    Pay {
        /// Recipient address
        to: String,

        /// Amount to transfer
        amount: u64,

        /// Directory for the key file
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,

        /// Base url of the relay
        #[arg(short, long, default_value = DEFAULT_RELAY)]
        relay: String,
    },
    /// Publish a text note under the local identity
    SignText {
        /// Output tag or recipient
        output: String,

        /// Text body
        body: String,

        /// Author field, the local address by default
        #[arg(short, long)]
        author: Option<String>,

        /// Directory for the key file
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,

        /// Base url of the relay
        #[arg(short, long, default_value = DEFAULT_RELAY)]
        relay: String,
    },
    /// Summarize the locally stored chain
    Chain {
        /// Directory holding the chain database
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,

        /// Number of recent blocks to show
        #[arg(short, long, default_value = "10")]
        count: usize,
    },
}

pub async fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Keygen { data_dir } => key::keygen(data_dir),
        Commands::Address { data_dir } => key::address(data_dir),
        Commands::Balance {
            address,
            data_dir,
            relay,
        } => query::balance(address, data_dir, relay).await,
        Commands::Pay {
            to,
            amount,
            data_dir,
            relay,
        } => transact::pay(to, amount, data_dir, relay).await,
        Commands::SignText {
            output,
            body,
            author,
            data_dir,
            relay,
        } => transact::sign_text(output, body, author, data_dir, relay).await,
        Commands::Chain { data_dir, count } => query::chain(data_dir, count),
    }
}
