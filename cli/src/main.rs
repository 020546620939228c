//! Shareclip CLI - peer-to-peer clipboard and file transfer.

mod commands;
mod host;
mod ui;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shareclip")]
#[command(about = "Peer-to-peer clipboard and file transfer", long_about = None)]
struct Cli {
    /// Device name to advertise
    #[arg(short, long, default_value_t = default_device_name())]
    name: String,

    /// Endpoint the data server listens on
    #[arg(short, long, default_value_t = default_listen_addr())]
    listen: SocketAddr,

    /// Partner endpoint (`host:port`) or discovery handle (`<id>`)
    #[arg(short, long)]
    partner: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn default_device_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "shareclip-device".to_string())
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], shareclip_core::protocol::constants::DEFAULT_PORT))
}

#[derive(Subcommand)]
enum Commands {
    /// Start the shareclip service (default)
    Run,
    /// Send files (or piped text) to the partner and exit
    Send {
        /// Files and directories to drop on the partner
        paths: Vec<PathBuf>,
    },
    /// Show device info
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("shareclip=info".parse()?)
                .add_directive("mdns_sd=warn".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run_service(cli.name, cli.listen, cli.partner).await?,
        Commands::Send { paths } => commands::send_to_partner(cli.name, cli.partner, paths).await?,
        Commands::Info => commands::show_info(cli.name),
    }

    Ok(())
}
