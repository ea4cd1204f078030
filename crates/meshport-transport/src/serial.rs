//! Serial transport over tokio-serial

use async_trait::async_trait;
use meshport_core::{Endpoint, LinkConfig};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::transport::{read_frame, Transport};

/// Serial link to a companion radio
pub struct SerialTransport {
    endpoint: Endpoint,
    stream: Option<SerialStream>,
}

impl SerialTransport {
    /// Open the serial port and wait out the post-open settle delay
    /// before the first write is allowed. Skipping the delay is a known
    /// cause of spurious identification failures.
    pub async fn open(endpoint: &Endpoint, config: &LinkConfig) -> Result<Self> {
        debug!(port = %endpoint.address, baud = config.baudrate, "Opening serial port");

        let stream = tokio_serial::new(&endpoint.address, config.baudrate)
            .open_native_async()
            .map_err(|e| TransportError::open(&endpoint.address, e))?;

        sleep(config.open_settle()).await;

        Ok(Self {
            endpoint: endpoint.clone(),
            stream: Some(stream),
        })
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        stream.write_all(frame).await?;
        stream.flush().await?;
        Ok(())
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        read_frame(stream, timeout).await
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            // Flush what we can; dropping the stream releases the port
            if let Err(e) = stream.flush().await {
                warn!(port = %self.endpoint.address, error = %e, "Serial teardown flush failed");
            }
            debug!(port = %self.endpoint.address, "Serial port closed");
        }
    }
}
