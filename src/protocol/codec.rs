//! Protocol codec for encoding/decoding message headers
//!
//! Handles the fixed-size little-endian header. Payload bytes are streamed
//! by the connection and never pass through the codec.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use super::{Command, Message, HEADER_SIZE};

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed header: peer closed after {received} header bytes")]
    MalformedHeader { received: usize },

    #[error("Invalid or unknown request command {command} (addr={address:016x}, cb={byte_count:016x})")]
    InvalidCommand {
        command: u64,
        address: u64,
        byte_count: u64,
    },
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Decode a message header.
///
/// Only the first [`HEADER_SIZE`] bytes of `buf` are looked at.
pub fn decode(mut buf: &[u8]) -> CodecResult<Message> {
    if buf.len() < HEADER_SIZE {
        return Err(CodecError::MalformedHeader {
            received: buf.len(),
        });
    }

    let command = buf.get_u64_le();
    let address = buf.get_u64_le();
    let byte_count = buf.get_u64_le();

    let command = Command::try_from(command).map_err(|command| CodecError::InvalidCommand {
        command,
        address,
        byte_count,
    })?;

    Ok(Message::new(command, address, byte_count))
}

/// Append the wire form of `message` to `buf`
pub fn encode(message: &Message, buf: &mut BytesMut) {
    buf.reserve(HEADER_SIZE);
    buf.put_u64_le(message.command.code());
    buf.put_u64_le(message.address);
    buf.put_u64_le(message.byte_count);
}

/// Wire form of a header as a fixed array
pub fn encode_header(command: Command, address: u64, byte_count: u64) -> [u8; HEADER_SIZE] {
    let mut out = [0u8; HEADER_SIZE];
    let mut buf = &mut out[..];
    buf.put_u64_le(command.code());
    buf.put_u64_le(address);
    buf.put_u64_le(byte_count);
    out
}
