//! Relay server
//!
//! Accepts one client at a time and serves its requests in order until the
//! client goes away. The scratch buffer behind the transfer engine is shared
//! by every request, so connections are never served concurrently; clients
//! that connect meanwhile wait in the listen backlog.

use std::future::Future;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;

use super::connection::Connection;
use super::dispatch::{dispatch, DispatchError};
use crate::dma::DmaEngine;
use crate::transfer::TransferEngine;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Accept failed: {0}")]
    Accept(#[source] std::io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// RawTCP relay server
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Bind the listening socket
    pub async fn bind(addr: SocketAddr) -> ServerResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        let local_addr = listener.local_addr()?;
        tracing::info!("Listening on {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve connections until `shutdown` resolves.
    ///
    /// Errors inside a connection only end that connection. A failing
    /// `accept` ends the server.
    pub async fn run<D, F>(&self, engine: &mut TransferEngine<D>, shutdown: F) -> ServerResult<()>
    where
        D: DmaEngine,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tracing::debug!("Waiting to accept connection");
            let (stream, addr) = tokio::select! {
                result = self.listener.accept() => result.map_err(ServerError::Accept)?,
                _ = &mut shutdown => {
                    tracing::info!("Server shutdown requested");
                    return Ok(());
                }
            };

            tracing::info!("Accepted connection from {}", addr);
            let mut conn = Connection::new(stream, addr);

            let result = tokio::select! {
                result = serve_connection(&mut conn, engine) => result,
                _ = &mut shutdown => {
                    tracing::info!("Server shutdown requested, dropping connection from {}", addr);
                    return Ok(());
                }
            };

            match result {
                Ok(()) => tracing::info!("Client {} closed the connection", addr),
                Err(e) => tracing::warn!("Closing connection from {} after error: {}", addr, e),
            }

            let stats = conn.stats();
            tracing::info!(
                "Closing connection from {} after {:?}: {} requests, {} bytes in, {} bytes out",
                conn.remote_addr(),
                conn.age(),
                stats.requests,
                stats.bytes_received,
                stats.bytes_sent
            );
            if let Err(e) = conn.close().await {
                tracing::debug!("Shutdown of {} failed: {}", addr, e);
            }
        }
    }
}

/// Serve requests on `conn` in arrival order.
///
/// Returns `Ok(())` when the peer closes the connection between requests,
/// or the error that ended it otherwise.
pub async fn serve_connection<S, D>(
    conn: &mut Connection<S>,
    engine: &mut TransferEngine<D>,
) -> Result<(), DispatchError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    D: DmaEngine,
{
    loop {
        tracing::debug!("Waiting for request");
        let request = match conn.read_request().await? {
            Some(request) => request,
            None => return Ok(()),
        };
        tracing::debug!("Received request: {}", request);

        dispatch(conn, engine, &request).await?;
    }
}
