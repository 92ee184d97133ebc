//! Transport traits for the byte-oriented link to the receiver.
//!
//! The driver never talks to hardware directly; it consumes a byte source
//! and a byte sink. Blanket implementations cover every tokio
//! `AsyncRead`/`AsyncWrite` type, so a serial port handle, a TCP socket, or
//! an in-memory duplex from a test all plug in unchanged.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::error::UbxError;

/// Byte source for the receiver loop.
///
/// Reads are best-effort: `read_available` returns whatever the link
/// currently holds, which may be a single byte. A return of zero bytes
/// means the source is closed.
#[async_trait]
pub trait TransportReader: Send + 'static {
    /// Waits for data and fills `buf`, returning the byte count.
    ///
    /// Returns:
    /// - `Ok(n)` with `n > 0` - bytes were read
    /// - `Ok(0)` - the link closed
    /// - `Err(e)` - transport failure
    async fn read_available(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Byte sink for outgoing commands.
#[async_trait]
pub trait TransportWriter: Send + 'static {
    /// Writes the whole buffer to the link.
    async fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()>;
}

#[async_trait]
impl<R> TransportReader for R
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read(buf).await.map_err(|e| UbxError::io_error("read", e))
    }
}

#[async_trait]
impl<W> TransportWriter for W
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.write_all(buf).await.map_err(|e| UbxError::io_error("write", e))?;
        self.flush().await.map_err(|e| UbxError::io_error("flush", e))
    }
}
