//! Connection handling for the relay
//!
//! Manages one client connection, including:
//! - Header decoding and clean EOF detection
//! - Payload streaming in both directions
//! - Per-connection statistics

use bytes::BytesMut;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::protocol::{self, CodecError, Message, HEADER_SIZE};

/// Connection errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] CodecError),

    #[error("Connection closed by peer")]
    Closed,
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Connection statistics
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    /// Requests decoded
    pub requests: u64,
    /// Bytes received, headers included
    pub bytes_received: u64,
    /// Bytes sent, headers included
    pub bytes_sent: u64,
}

/// A client connection
pub struct Connection<S = TcpStream> {
    /// Remote peer address
    remote_addr: SocketAddr,
    stream: S,
    /// Header scratch for responses
    write_buf: BytesMut,
    opened_at: Instant,
    stats: ConnectionStats,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, remote_addr: SocketAddr) -> Self {
        Self {
            remote_addr,
            stream,
            write_buf: BytesMut::with_capacity(HEADER_SIZE),
            opened_at: Instant::now(),
            stats: ConnectionStats::default(),
        }
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Time since the connection was accepted
    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }

    /// Read the next request header.
    ///
    /// Returns `None` if the peer closed the connection before sending any
    /// byte of a new header.
    pub async fn read_request(&mut self) -> ConnectionResult<Option<Message>> {
        let mut header = [0u8; HEADER_SIZE];
        let mut filled = 0;

        while filled < HEADER_SIZE {
            let n = self.stream.read(&mut header[filled..]).await?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None); // Clean close
                }
                break;
            }
            filled += n;
            self.stats.bytes_received += n as u64;
        }

        let message = protocol::decode(&header[..filled])?;
        self.stats.requests += 1;
        Ok(Some(message))
    }

    /// Fill `buf` with request payload bytes
    pub async fn read_payload(&mut self, buf: &mut [u8]) -> ConnectionResult<()> {
        match self.stream.read_exact(buf).await {
            Ok(_) => {
                self.stats.bytes_received += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(ConnectionError::Closed),
            Err(e) => Err(e.into()),
        }
    }

    /// Send the response to `request` followed by `payload`
    pub async fn send_response(&mut self, request: &Message, payload: &[u8]) -> ConnectionResult<()> {
        let response = request.response(payload.len() as u64);

        self.write_buf.clear();
        protocol::encode(&response, &mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;
        if !payload.is_empty() {
            self.stream.write_all(payload).await?;
        }
        self.stream.flush().await?;

        self.stats.bytes_sent += (HEADER_SIZE + payload.len()) as u64;
        Ok(())
    }

    /// Shut down the write side of the connection
    pub async fn close(&mut self) -> ConnectionResult<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode_header, Command};
    use tokio::io::duplex;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_clean_close() {
        let (client, server) = duplex(64);
        drop(client);

        let mut conn = Connection::new(server, peer());
        assert!(conn.read_request().await.unwrap().is_none());
        assert_eq!(conn.stats().requests, 0);
    }

    #[tokio::test]
    async fn test_header_split_across_reads() {
        let stream = tokio_test::io::Builder::new()
            .read(&encode_header(Command::MemRead, 0x1000, 16)[..5])
            .read(&encode_header(Command::MemRead, 0x1000, 16)[5..])
            .build();

        let mut conn = Connection::new(stream, peer());
        let request = conn.read_request().await.unwrap().unwrap();
        assert_eq!(request, Message::new(Command::MemRead, 0x1000, 16));
        assert_eq!(conn.stats().bytes_received, HEADER_SIZE as u64);
        assert!(conn.read_request().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_truncated_header() {
        let (mut client, server) = duplex(64);
        client.write_all(&[0u8; 10]).await.unwrap();
        drop(client);

        let mut conn = Connection::new(server, peer());
        assert!(matches!(
            conn.read_request().await,
            Err(ConnectionError::Protocol(CodecError::MalformedHeader { received: 10 }))
        ));
    }

    #[tokio::test]
    async fn test_truncated_payload() {
        let (mut client, server) = duplex(64);
        client.write_all(&[0xaa; 3]).await.unwrap();
        drop(client);

        let mut conn = Connection::new(server, peer());
        let mut buf = [0u8; 8];
        assert!(matches!(
            conn.read_payload(&mut buf).await,
            Err(ConnectionError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_send_response() {
        let request = Message::new(Command::MemRead, 0x40, 100);
        let mut expected = encode_header(Command::MemRead, 0x40, 3).to_vec();
        expected.extend_from_slice(&[7, 8, 9]);

        let stream = tokio_test::io::Builder::new().write(&expected).build();
        let mut conn = Connection::new(stream, peer());
        conn.send_response(&request, &[7, 8, 9]).await.unwrap();
        assert_eq!(conn.stats().bytes_sent, (HEADER_SIZE + 3) as u64);
    }
}
