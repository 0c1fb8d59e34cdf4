//! minibit CLI entry point.

use clap::Parser;

mod commands;

#[derive(Parser)]
#[command(name = "minibit")]
#[command(about = "Wallet and chain inspector for the minibit network", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<commands::Commands>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(cmd) => {
            if let Err(e) = commands::run(cmd).await {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("minibit - wallet and chain inspector");
            println!("Run 'minibit --help' for usage information.");
        }
    }
}
