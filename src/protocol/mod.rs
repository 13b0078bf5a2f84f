//! Protocol module - Defines the RawTCP wire protocol
//!
//! Every message is a fixed 24 byte header of three little-endian quad words:
//! - 8 bytes command (0 = STATUS, 1 = MEM_READ, 2 = MEM_WRITE)
//! - 8 bytes host address
//! - 8 bytes byte count
//!
//! The header is immediately followed by `byte_count` raw payload bytes when
//! the count is non-zero. There is no magic, version or checksum.

mod message;
mod codec;

pub use message::*;
pub use codec::*;

/// Size of the fixed message header on the wire
pub const HEADER_SIZE: usize = 24;

/// Payload byte sent in reply to a STATUS request
pub const STATUS_READY: u8 = 1;
