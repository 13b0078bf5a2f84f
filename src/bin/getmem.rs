//! xdma-getmem - Dump one block of host memory to stdout

use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use xdma_relay::dma::{XdmaDevice, DEFAULT_DEVICE_PATH};
use xdma_relay::logging;
use xdma_relay::transfer::{TransferEngine, TransferLimits};

/// One host page
const HOST_PAGE_SIZE: usize = 4096;

/// xdma-getmem - Read host memory through the XDMA engine
#[derive(Parser)]
#[command(name = "xdma-getmem")]
#[command(version)]
#[command(about = "Write a block of host memory to stdout", long_about = None)]
struct Cli {
    /// Host address: decimal, 0x-prefixed hex or 0-prefixed octal
    #[arg(value_parser = parse_address)]
    address: u64,

    /// Number of bytes to read
    #[arg(short, long, default_value_t = HOST_PAGE_SIZE)]
    length: usize,

    /// XDMA device node
    #[arg(long, default_value = DEFAULT_DEVICE_PATH)]
    device: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Parse an address the way `strtoull(s, NULL, 0)` does
fn parse_address(s: &str) -> Result<u64, String> {
    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    };
    // A sign is only accepted in front of the radix prefix
    if radix != 10 && digits.starts_with(['+', '-']) {
        return Err(format!("invalid host address: {}", s));
    }
    u64::from_str_radix(digits, radix).map_err(|e| format!("invalid host address: {}", e))
}

fn main() -> anyhow::Result<()> {
    let cli: Cli = xdma_relay::cli::parse();
    logging::init(cli.verbose);

    if nix::unistd::isatty(std::io::stdout().as_raw_fd()).unwrap_or(false) {
        anyhow::bail!("refusing to send binary data to stdout");
    }
    if cli.length == 0 {
        anyhow::bail!("length must be non-zero");
    }

    let device = XdmaDevice::open(&cli.device, cli.length)
        .context("Failed to set up the XDMA device")?;
    let limits = TransferLimits {
        max_chunk: cli.length,
        max_total: cli.length,
        enforce_alignment: false,
    };
    let mut engine = TransferEngine::new(device, limits)?;

    let payload = engine
        .read(cli.address, cli.length)
        .with_context(|| format!("Failed to read {} bytes at {:#x}", cli.length, cli.address))?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(payload.as_ref())?;
    stdout.flush()?;
    Ok(())
}
