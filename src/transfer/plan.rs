//! Splitting a logical transfer into bounded DMA chunks

use super::{TransferError, TransferResult};

/// One bounded DMA operation within a logical transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Host address of the first byte
    pub address: u64,
    /// Position of the chunk within the logical transfer
    pub offset: usize,
    pub len: usize,
}

/// Lazily generated chunks covering `[address, address + len)` in order.
///
/// Construction rejects ranges that wrap the 64-bit address space, so every
/// chunk address yielded afterwards is in range.
#[derive(Debug, Clone)]
pub struct TransferPlan {
    address: u64,
    len: usize,
    chunk_size: usize,
    offset: usize,
}

impl TransferPlan {
    pub fn new(address: u64, len: usize, chunk_size: usize) -> TransferResult<Self> {
        if chunk_size == 0 {
            return Err(TransferError::InvalidLimits(
                "chunk size must be non-zero".to_string(),
            ));
        }

        if len > 0 && address.checked_add(len as u64 - 1).is_none() {
            return Err(TransferError::AddressOverflow { address, len });
        }

        Ok(Self {
            address,
            len,
            chunk_size,
            offset: 0,
        })
    }
}

impl Iterator for TransferPlan {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.offset >= self.len {
            return None;
        }

        let len = self.chunk_size.min(self.len - self.offset);
        let chunk = Chunk {
            address: self.address + self.offset as u64,
            offset: self.offset,
            len,
        };
        self.offset += len;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.len - self.offset).div_ceil(self.chunk_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TransferPlan {}
