//! Relay entry point.

use anyhow::Context;
use clap::Parser;
use minibit_relay::{router, AppState, RelaySettings};
use std::net::SocketAddr;
use tracing::info;

#[derive(Parser)]
#[command(name = "minibit-relay")]
#[command(about = "Broadcast relay brokering all minibit peer exchange", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:9000")]
    listen: SocketAddr,

    /// Settling window before full-sync answers are handed out, milliseconds
    #[arg(long, default_value_t = 3_000)]
    settle_millis: u64,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
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

    let settings = RelaySettings {
        settle_millis: cli.settle_millis,
        ..RelaySettings::default()
    };
    let app = router(AppState::new(settings));

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("binding {}", cli.listen))?;
    info!(addr = %cli.listen, "relay listening");
    axum::serve(listener, app).await?;
    Ok(())
}
