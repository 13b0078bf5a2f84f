//! Protocol message definitions

use std::fmt;

/// Commands understood by the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum Command {
    /// Liveness probe, answered with a single ready byte
    Status = 0,
    /// Read host memory
    MemRead = 1,
    /// Write host memory
    MemWrite = 2,
}

impl Command {
    /// Wire value of the command
    pub fn code(self) -> u64 {
        self as u64
    }

    /// Name used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            Command::Status => "STATUS",
            Command::MemRead => "MEM_READ",
            Command::MemWrite => "MEM_WRITE",
        }
    }
}

impl TryFrom<u64> for Command {
    /// The unrecognized wire value
    type Error = u64;

    fn try_from(code: u64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Command::Status),
            1 => Ok(Command::MemRead),
            2 => Ok(Command::MemWrite),
            other => Err(other),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A request or response header.
///
/// Requests and responses share the same shape. A response echoes the
/// request's command and address, and carries the number of payload bytes
/// that follow it in `byte_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub command: Command,
    /// Host physical address
    pub address: u64,
    /// Number of payload bytes following the header
    pub byte_count: u64,
}

impl Message {
    pub fn new(command: Command, address: u64, byte_count: u64) -> Self {
        Self {
            command,
            address,
            byte_count,
        }
    }

    /// Build the response header for this request carrying `byte_count`
    /// payload bytes
    pub fn response(&self, byte_count: u64) -> Self {
        Self::new(self.command, self.address, byte_count)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message{{cmd={}({}), addr={:016x}, cb={:016x}}}",
            self.command,
            self.command.code(),
            self.address,
            self.byte_count
        )
    }
}
