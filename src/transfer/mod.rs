//! Transfer module - Chunked DMA transfers through the scratch buffer
//!
//! A single DMA operation can move at most one scratch buffer's worth of
//! data. Larger reads are split into a [`TransferPlan`] and staged chunk by
//! chunk into a transient output buffer. Reads that fit in one chunk are
//! served straight out of the scratch buffer without a copy.

mod plan;

pub use plan::*;

use thiserror::Error;

use crate::dma::{DmaEngine, DmaError, TRANSFER_ALIGNMENT};

/// Largest single DMA operation (one scratch buffer)
pub const MAX_CHUNK_TRANSFER: usize = 8 * 1024 * 1024;

/// Largest logical read served over several DMA operations
pub const MAX_TOTAL_TRANSFER: usize = 32 * 1024 * 1024;

/// Transfer errors
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Transfer of {len} bytes at {address:#x} wraps the address space")]
    AddressOverflow { address: u64, len: usize },

    #[error("Transfer length {len} is not a multiple of {} bytes", TRANSFER_ALIGNMENT)]
    MisalignedLength { len: usize },

    #[error("Transfer of {len} bytes exceeds the {max} byte chunk size")]
    ChunkTooLarge { len: usize, max: usize },

    #[error("Could not allocate {len} byte staging buffer")]
    OutOfMemory { len: usize },

    #[error("Chunk size {chunk} exceeds the {capacity} byte DMA buffer")]
    ChunkExceedsBuffer { chunk: usize, capacity: usize },

    #[error("Invalid transfer limits: {0}")]
    InvalidLimits(String),

    #[error("DMA transfer failed: {0}")]
    DmaTransferFailed(#[from] DmaError),
}

pub type TransferResult<T> = Result<T, TransferError>;

/// Size limits applied to every transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLimits {
    /// Largest single DMA operation
    pub max_chunk: usize,
    /// Largest logical read
    pub max_total: usize,
    /// Reject lengths that are not a multiple of [`TRANSFER_ALIGNMENT`]
    pub enforce_alignment: bool,
}

impl Default for TransferLimits {
    fn default() -> Self {
        Self {
            max_chunk: MAX_CHUNK_TRANSFER,
            max_total: MAX_TOTAL_TRANSFER,
            enforce_alignment: false,
        }
    }
}

/// Result of a read, either lent from the scratch buffer or staged
#[derive(Debug)]
pub enum Payload<'a> {
    Scratch(&'a [u8]),
    Staged(Vec<u8>),
}

impl AsRef<[u8]> for Payload<'_> {
    fn as_ref(&self) -> &[u8] {
        match self {
            Payload::Scratch(bytes) => bytes,
            Payload::Staged(bytes) => bytes,
        }
    }
}

/// Owns the DMA engine and its scratch buffer for the life of the process.
///
/// Every operation takes `&mut self`, so at most one transfer can touch the
/// scratch buffer at a time.
pub struct TransferEngine<D> {
    dma: D,
    limits: TransferLimits,
}

impl<D: DmaEngine> TransferEngine<D> {
    pub fn new(dma: D, limits: TransferLimits) -> TransferResult<Self> {
        if limits.max_chunk == 0 {
            return Err(TransferError::InvalidLimits(
                "chunk size must be non-zero".to_string(),
            ));
        }
        if limits.max_total < limits.max_chunk {
            return Err(TransferError::InvalidLimits(format!(
                "total transfer size {} is below the chunk size {}",
                limits.max_total, limits.max_chunk
            )));
        }
        if limits.max_chunk > dma.capacity() {
            return Err(TransferError::ChunkExceedsBuffer {
                chunk: limits.max_chunk,
                capacity: dma.capacity(),
            });
        }

        Ok(Self { dma, limits })
    }

    pub fn limits(&self) -> &TransferLimits {
        &self.limits
    }

    pub fn dma(&self) -> &D {
        &self.dma
    }

    fn check_alignment(&self, len: usize) -> TransferResult<()> {
        if len % TRANSFER_ALIGNMENT == 0 {
            return Ok(());
        }
        if self.limits.enforce_alignment {
            return Err(TransferError::MisalignedLength { len });
        }
        tracing::debug!(
            "Transfer length {} is not a multiple of {}, leaving it to the driver",
            len,
            TRANSFER_ALIGNMENT
        );
        Ok(())
    }

    /// Read `len` bytes of host memory at `address`.
    ///
    /// The whole read fails if any chunk fails; nothing read so far is
    /// returned.
    pub fn read(&mut self, address: u64, len: usize) -> TransferResult<Payload<'_>> {
        let plan = TransferPlan::new(address, len, self.limits.max_chunk)?;
        self.check_alignment(len)?;

        if len <= self.limits.max_chunk {
            for chunk in plan {
                tracing::debug!("DMA read {} bytes at {:x}", chunk.len, chunk.address);
                self.dma.transfer_in(chunk.address, chunk.len)?;
            }
            return Ok(Payload::Scratch(&self.dma.buffer()[..len]));
        }

        tracing::info!(
            "Read of {} bytes exceeds a single DMA transfer ({} max), staging {} chunks",
            len,
            self.limits.max_chunk,
            plan.len()
        );

        let mut staged = Vec::new();
        staged
            .try_reserve_exact(len)
            .map_err(|_| TransferError::OutOfMemory { len })?;

        for chunk in plan {
            debug_assert_eq!(staged.len(), chunk.offset);
            tracing::debug!("DMA read {} bytes at {:x}", chunk.len, chunk.address);
            self.dma.transfer_in(chunk.address, chunk.len)?;
            staged.extend_from_slice(&self.dma.buffer()[..chunk.len]);
        }

        Ok(Payload::Staged(staged))
    }

    /// Validate a write of `len` bytes at `address` and return the part of the
    /// scratch buffer its payload must be placed in
    pub fn staging_buffer(&mut self, address: u64, len: usize) -> TransferResult<&mut [u8]> {
        self.check_write(address, len)?;
        Ok(&mut self.dma.buffer_mut()[..len])
    }

    /// Write the first `len` bytes of the scratch buffer to host memory at
    /// `address`
    pub fn write(&mut self, address: u64, len: usize) -> TransferResult<()> {
        let plan = self.check_write(address, len)?;

        for chunk in plan {
            tracing::debug!("DMA write {} bytes at {:x}", chunk.len, chunk.address);
            self.dma.transfer_out(chunk.address, chunk.len)?;
        }
        Ok(())
    }

    fn check_write(&self, address: u64, len: usize) -> TransferResult<TransferPlan> {
        if len > self.limits.max_chunk {
            return Err(TransferError::ChunkTooLarge {
                len,
                max: self.limits.max_chunk,
            });
        }
        let plan = TransferPlan::new(address, len, self.limits.max_chunk)?;
        self.check_alignment(len)?;
        Ok(plan)
    }
}
