//! In-memory DMA engine for tests
//!
//! Reads return a deterministic pattern derived from the host address, writes
//! are captured, and every call is recorded in order.

use super::{DmaEngine, DmaError, DmaResult, Direction};

/// One recorded transfer call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaCall {
    pub direction: Direction,
    pub address: u64,
    pub len: usize,
}

pub struct MockDma {
    buffer: Vec<u8>,
    pub calls: Vec<DmaCall>,
    /// `(host_address, bytes)` of every transfer-out
    pub written: Vec<(u64, Vec<u8>)>,
    /// Zero-based index of the call that should fail
    pub fail_on_call: Option<usize>,
}

/// Byte the fake host memory holds at `address`
pub fn pattern_byte(address: u64) -> u8 {
    (address % 251) as u8
}

/// Expected contents of `len` bytes of fake host memory at `address`
pub fn pattern(address: u64, len: usize) -> Vec<u8> {
    (0..len as u64)
        .map(|i| pattern_byte(address.wrapping_add(i)))
        .collect()
}

impl MockDma {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity],
            calls: Vec::new(),
            written: Vec::new(),
            fail_on_call: None,
        }
    }

    pub fn failing_on(capacity: usize, call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::new(capacity)
        }
    }

    fn record(&mut self, direction: Direction, address: u64, len: usize) -> DmaResult<()> {
        let index = self.calls.len();
        self.calls.push(DmaCall {
            direction,
            address,
            len,
        });

        if len > self.buffer.len() {
            return Err(DmaError::ExceedsBuffer {
                len,
                capacity: self.buffer.len(),
            });
        }
        if self.fail_on_call == Some(index) {
            return Err(DmaError::Transfer {
                direction,
                address,
                len,
                source: std::io::Error::new(std::io::ErrorKind::Other, "injected failure"),
            });
        }
        Ok(())
    }
}

impl DmaEngine for MockDma {
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
        self.record(Direction::Downstream, host_address, len)?;
        for (i, byte) in self.buffer[..len].iter_mut().enumerate() {
            *byte = pattern_byte(host_address.wrapping_add(i as u64));
        }
        Ok(())
    }

    fn transfer_out(&mut self, host_address: u64, len: usize) -> DmaResult<()> {
        self.record(Direction::Upstream, host_address, len)?;
        self.written
            .push((host_address, self.buffer[..len].to_vec()));
        Ok(())
    }
}
