//! Request dispatch
//!
//! Turns one decoded request into DMA transfers and a response. Any error
//! returned from here means the connection must be torn down; no response
//! (or only a truncated one, if sending failed midway) has been sent.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

use super::connection::{Connection, ConnectionError};
use crate::dma::DmaEngine;
use crate::protocol::{Command, Message, STATUS_READY};
use crate::transfer::{TransferEngine, TransferError};

/// Dispatch errors
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Requested number of bytes is too large for {command}: {requested} (max: {max})")]
    RequestTooLarge {
        command: Command,
        requested: u64,
        max: usize,
    },

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

fn check_size(command: Command, requested: u64, max: usize) -> DispatchResult<usize> {
    match usize::try_from(requested) {
        Ok(len) if len <= max => Ok(len),
        _ => Err(DispatchError::RequestTooLarge {
            command,
            requested,
            max,
        }),
    }
}

/// Handle a single request, sending its response on success
pub async fn dispatch<S, D>(
    conn: &mut Connection<S>,
    engine: &mut TransferEngine<D>,
    request: &Message,
) -> DispatchResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    D: DmaEngine,
{
    match request.command {
        Command::Status => handle_status(conn, request).await,
        Command::MemRead => handle_mem_read(conn, engine, request).await,
        Command::MemWrite => handle_mem_write(conn, engine, request).await,
    }
}

async fn handle_status<S>(conn: &mut Connection<S>, request: &Message) -> DispatchResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tracing::info!("Handling status request");
    conn.send_response(request, &[STATUS_READY]).await?;
    Ok(())
}

async fn handle_mem_read<S, D>(
    conn: &mut Connection<S>,
    engine: &mut TransferEngine<D>,
    request: &Message,
) -> DispatchResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    D: DmaEngine,
{
    tracing::info!("Handling memory read request");
    let len = check_size(request.command, request.byte_count, engine.limits().max_total)?;
    tracing::debug!("Read {} bytes at {:x}", len, request.address);

    let payload = engine.read(request.address, len)?;
    conn.send_response(request, payload.as_ref()).await?;
    Ok(())
}

async fn handle_mem_write<S, D>(
    conn: &mut Connection<S>,
    engine: &mut TransferEngine<D>,
    request: &Message,
) -> DispatchResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    D: DmaEngine,
{
    tracing::info!("Handling memory write request");
    // Writes go out in a single DMA operation, so the cap is one chunk
    let len = check_size(request.command, request.byte_count, engine.limits().max_chunk)?;
    tracing::debug!("Write {} bytes at {:x}", len, request.address);

    let staging = engine.staging_buffer(request.address, len)?;
    conn.read_payload(staging).await?;
    engine.write(request.address, len)?;

    conn.send_response(request, &[]).await?;
    Ok(())
}
