//! ASPEED XDMA character device
//!
//! The driver maps a reserved DMA region into our address space and accepts
//! transfer requests as fixed-size `aspeed_xdma_op` writes to the device
//! file. Each write blocks until the engine has completed the transfer.
//!
//! Requirements:
//! - the `aspeed-xdma` kernel driver must be loaded
//! - read/write access to the device node (usually root)

use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use super::{DmaEngine, DmaError, DmaResult, Direction, TRANSFER_ALIGNMENT};

/// Raw `aspeed_xdma_op` (matches the kernel uapi structure)
///
/// C layout: `__u32 upstream; __u64 host_addr; __u32 len;` which pads to
/// 24 bytes on every target the driver exists for.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct XdmaOp {
    upstream: u32,
    host_addr: u64,
    len: u32,
}

const XDMA_OP_SIZE: usize = std::mem::size_of::<XdmaOp>();

impl XdmaOp {
    fn new(direction: Direction, host_addr: u64, len: u32) -> Self {
        Self {
            upstream: match direction {
                Direction::Downstream => 0,
                Direction::Upstream => 1,
            },
            host_addr,
            len,
        }
    }

    fn to_bytes(self) -> [u8; XDMA_OP_SIZE] {
        let mut bytes = [0u8; XDMA_OP_SIZE];
        bytes[0..4].copy_from_slice(&self.upstream.to_ne_bytes());
        bytes[8..16].copy_from_slice(&self.host_addr.to_ne_bytes());
        bytes[16..20].copy_from_slice(&self.len.to_ne_bytes());
        bytes
    }
}

/// Handle on the XDMA device and its mapped buffer
pub struct XdmaDevice {
    path: PathBuf,
    file: File,
    buffer: MmapMut,
}

impl XdmaDevice {
    /// Open the device and map `buffer_len` bytes of its DMA region
    pub fn open(path: &Path, buffer_len: usize) -> DmaResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| DmaError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        // Safety: the mapping is backed by driver-owned DMA memory rather than
        // a regular file, so it cannot be truncated underneath us. The engine
        // only writes to it while a transfer call is blocked.
        let buffer = unsafe { MmapOptions::new().len(buffer_len).map_mut(&file) }
            .map_err(|source| DmaError::Map {
                len: buffer_len,
                source,
            })?;

        tracing::debug!(
            "Opened {} with a {} byte DMA buffer",
            path.display(),
            buffer_len
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            buffer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn transfer(&mut self, direction: Direction, host_address: u64, len: usize) -> DmaResult<()> {
        let capacity = self.buffer.len();
        if len > capacity {
            return Err(DmaError::ExceedsBuffer { len, capacity });
        }
        // capacity is a mapping length and comfortably below 4 GiB, but the
        // uapi field is 32 bits wide
        let op_len = u32::try_from(len).map_err(|_| DmaError::ExceedsBuffer { len, capacity })?;

        if len % TRANSFER_ALIGNMENT != 0 {
            tracing::debug!(
                "DMA {} length {} is not a multiple of {}",
                direction,
                len,
                TRANSFER_ALIGNMENT
            );
        }

        let op = XdmaOp::new(direction, host_address, op_len).to_bytes();
        let written = nix::unistd::write(self.file.as_raw_fd(), &op).map_err(|errno| {
            DmaError::Transfer {
                direction,
                address: host_address,
                len,
                source: std::io::Error::from(errno),
            }
        })?;

        if written != op.len() {
            return Err(DmaError::ShortWrite {
                written,
                expected: op.len(),
            });
        }

        Ok(())
    }
}

impl DmaEngine for XdmaDevice {
    fn capacity(&self) -> usize {
        self.buffer.len()
    }

    fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    fn transfer_in(&mut self, host_address: u64, len: usize) -> DmaResult<()> {
        self.transfer(Direction::Downstream, host_address, len)
    }

    fn transfer_out(&mut self, host_address: u64, len: usize) -> DmaResult<()> {
        self.transfer(Direction::Upstream, host_address, len)
    }
}
