//! xdma-relay - Remote host memory access over raw TCP
//!
//! Relays pcileech RawTCP requests to the ASPEED XDMA engine of a BMC,
//! moving data between the network and the host's physical memory through
//! one memory-mapped scratch buffer.

pub mod cli;
pub mod config;
pub mod dma;
pub mod logging;
pub mod network;
pub mod protocol;
pub mod transfer;
