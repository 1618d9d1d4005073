//! metricgate binary
//!
//! Loads configuration (file, then `METRICGATE_*` environment, then flags),
//! initialises logging and serves until SIGINT or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use metricgate_config::{ConfigLoader, GatewayConfig};
use metricgate_server::Server;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path (YAML or JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Main listener address, e.g. 0.0.0.0:8000
    #[arg(short, long, value_name = "HOST:PORT")]
    bind: Option<String>,

    /// Port for the dedicated stream listener
    #[arg(long, value_name = "PORT", conflicts_with = "no_stream")]
    stream_port: Option<u16>,

    /// Serve streaming on /ws only
    #[arg(long)]
    no_stream: bool,

    /// Print a sample configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", GatewayConfig::generate_sample());
        return Ok(());
    }

    let mut config = ConfigLoader::new()
        .load(cli.config.as_ref())
        .context("Failed to load configuration")?;

    apply_cli_overrides(&mut config, &cli)?;
    config.validate_all().context("Invalid configuration")?;

    metricgate_logging::init_logging(&config.logging)?;

    let server = Server::new(config).await?;
    server.start().await
}

/// Apply CLI argument overrides to configuration
fn apply_cli_overrides(config: &mut GatewayConfig, cli: &Cli) -> Result<()> {
    if let Some(bind) = &cli.bind {
        let addr: SocketAddr = bind
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid bind address '{}': {}", bind, e))?;
        config.server.bind_address = addr.ip().to_string();
        config.server.port = addr.port();
    }

    if cli.no_stream {
        config.server.stream_port = None;
    } else if let Some(port) = cli.stream_port {
        config.server.stream_port = Some(port);
    }

    Ok(())
}
