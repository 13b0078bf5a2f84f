//! xdma-rawtcpd - RawTCP relay for the ASPEED XDMA engine
//!
//! Serves pcileech-style memory reads and writes of the host's physical
//! memory to one TCP client at a time.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use xdma_relay::config::Config;
use xdma_relay::dma::{DmaEngine, XdmaDevice};
use xdma_relay::logging;
use xdma_relay::network::Server;
use xdma_relay::transfer::TransferEngine;

/// xdma-rawtcpd - Host memory access over raw TCP
#[derive(Parser)]
#[command(name = "xdma-rawtcpd")]
#[command(version)]
#[command(about = "Relay raw TCP memory requests to the XDMA engine", long_about = None)]
struct Cli {
    /// Port to listen on
    #[arg(required_unless_present = "print_config")]
    port: Option<u16>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// XDMA device node
    #[arg(long)]
    device: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli: Cli = xdma_relay::cli::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };
    if let Some(device) = cli.device {
        config.device.path = device;
    }
    config.general.verbose |= cli.verbose;
    config.validate()?;

    logging::init(config.general.verbose);

    if cli.print_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }
    let port = cli.port.context("a port is required")?;

    let device = XdmaDevice::open(&config.device.path, config.device.buffer_size)
        .context("Failed to set up the XDMA device")?;
    tracing::info!(
        "Mapped {} byte DMA buffer of {}",
        device.capacity(),
        device.path().display()
    );

    let mut engine = TransferEngine::new(device, config.limits.transfer_limits())?;
    let server = Server::bind(config.network.socket_addr(port)).await?;

    server
        .run(&mut engine, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Cannot listen for Ctrl+C, running until killed: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
