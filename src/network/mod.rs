//! Network module - Serves the RawTCP protocol
//!
//! Provides:
//! - Server accepting one connection at a time
//! - Connection framing of headers and payloads
//! - Request dispatch onto the transfer engine

mod server;
mod connection;
mod dispatch;

pub use server::*;
pub use connection::*;
pub use dispatch::*;
