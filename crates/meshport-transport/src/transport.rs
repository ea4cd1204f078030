//! Transport capability shared by all link kinds

use async_trait::async_trait;
use meshport_core::{Endpoint, LinkConfig, TransportKind};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::ble::BleTransport;
use crate::error::{Result, TransportError};
use crate::serial::SerialTransport;
use crate::tcp::TcpTransport;
use crate::wire;

/// A raw physical link to a candidate device.
///
/// All variants expose the same minimal framed capability. `close` is
/// idempotent and never fails observably: teardown errors are caught
/// and logged so a failed probe never blocks subsequent probes or
/// leaves the OS resource locked.
#[async_trait]
pub trait Transport: Send {
    /// The endpoint this transport was opened for
    fn endpoint(&self) -> &Endpoint;

    /// Write one complete frame to the device
    async fn send(&mut self, frame: &[u8]) -> Result<()>;

    /// Read one complete frame, waiting at most `timeout`.
    /// A timeout is a normal outcome feeding the retry policy.
    async fn receive(&mut self, timeout: Duration) -> Result<Vec<u8>>;

    /// Tear down the link. Idempotent; errors are logged, not returned.
    async fn close(&mut self);
}

/// Open the transport matching the endpoint's kind.
///
/// Serial opens are followed by the configured settle delay before the
/// caller may write, to let device firmware finish line-discipline
/// initialization.
pub async fn open_transport(
    endpoint: &Endpoint,
    config: &LinkConfig,
) -> Result<Box<dyn Transport>> {
    match endpoint.kind {
        TransportKind::Serial => Ok(Box::new(SerialTransport::open(endpoint, config).await?)),
        TransportKind::Tcp => Ok(Box::new(TcpTransport::open(endpoint).await?)),
        TransportKind::Ble => Ok(Box::new(BleTransport::open(endpoint, config).await?)),
    }
}

/// Read one header-prefixed frame from a byte stream, bounded by
/// `timeout` overall. Shared by the serial and TCP transports.
pub(crate) async fn read_frame<R>(reader: &mut R, timeout: Duration) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + Send,
{
    tokio::time::timeout(timeout, async {
        let mut header = [0u8; wire::HEADER_LEN];
        reader.read_exact(&mut header).await?;

        let (_op, _flags, body_len) = wire::decode_header(&header)
            .ok_or_else(|| TransportError::Frame("unreadable header".to_string()))?;

        if body_len as usize > wire::MAX_BODY_LEN {
            return Err(TransportError::Frame(format!(
                "body length {} exceeds limit",
                body_len
            )));
        }

        let mut frame = vec![0u8; wire::HEADER_LEN + body_len as usize];
        frame[..wire::HEADER_LEN].copy_from_slice(&header);
        reader.read_exact(&mut frame[wire::HEADER_LEN..]).await?;
        Ok(frame)
    })
    .await
    .map_err(|_| TransportError::Timeout)?
}
