//! DMA module - Access to the XDMA engine and its mapped scratch buffer
//!
//! The relay talks to the hardware through [`DmaEngine`]. The only production
//! implementation is [`XdmaDevice`], backed by the `/dev/xdma` character
//! device; tests drive the relay with an in-memory engine.

mod xdma;

#[cfg(test)]
pub(crate) mod mock;

pub use xdma::*;

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Default device node of the XDMA driver
pub const DEFAULT_DEVICE_PATH: &str = "/dev/xdma";

/// Transfer lengths should be a multiple of this many bytes
pub const TRANSFER_ALIGNMENT: usize = 16;

/// Direction of a DMA operation, named from the host's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host memory into the scratch buffer
    Downstream,
    /// Scratch buffer into host memory
    Upstream,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Downstream => f.write_str("read"),
            Direction::Upstream => f.write_str("write"),
        }
    }
}

/// DMA errors
#[derive(Error, Debug)]
pub enum DmaError {
    #[error("Failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to map {len} byte DMA buffer: {source}")]
    Map {
        len: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("DMA {direction} of {len} bytes at {address:#x} failed: {source}")]
    Transfer {
        direction: Direction,
        address: u64,
        len: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Driver accepted {written} of {expected} bytes of a transfer operation")]
    ShortWrite { written: usize, expected: usize },

    #[error("Transfer of {len} bytes exceeds the {capacity} byte DMA buffer")]
    ExceedsBuffer { len: usize, capacity: usize },
}

pub type DmaResult<T> = Result<T, DmaError>;

/// A DMA engine moving bytes between host memory and a mapped buffer.
///
/// Transfers block until the hardware has finished. The buffer is shared by
/// both directions, so a transfer-in overwrites whatever a previous
/// operation left there.
pub trait DmaEngine {
    /// Length of the mapped buffer in bytes
    fn capacity(&self) -> usize;

    /// The mapped buffer
    fn buffer(&self) -> &[u8];

    /// The mapped buffer, for staging outgoing data
    fn buffer_mut(&mut self) -> &mut [u8];

    /// Copy `len` bytes of host memory at `host_address` into the start of
    /// the buffer
    fn transfer_in(&mut self, host_address: u64, len: usize) -> DmaResult<()>;

    /// Copy the first `len` bytes of the buffer to host memory at
    /// `host_address`
    fn transfer_out(&mut self, host_address: u64, len: usize) -> DmaResult<()>;
}
