//! TCP transport for radios reachable over the network

use async_trait::async_trait;
use meshport_core::Endpoint;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::transport::{read_frame, Transport};

/// TCP link to a companion radio (typically a WiFi-bridged node)
#[derive(Debug)]
pub struct TcpTransport {
    endpoint: Endpoint,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    pub async fn open(endpoint: &Endpoint) -> Result<Self> {
        debug!(target = %endpoint.address, "Connecting TCP");

        let stream = TcpStream::connect(&endpoint.address)
            .await
            .map_err(|e| TransportError::open(&endpoint.address, e))?;

        Ok(Self {
            endpoint: endpoint.clone(),
            stream: Some(stream),
        })
    }
}

#[async_trait]
impl Transport for TcpTransport {
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
            if let Err(e) = stream.shutdown().await {
                warn!(target = %self.endpoint.address, error = %e, "TCP teardown failed");
            }
            debug!(target = %self.endpoint.address, "TCP connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire;
    use meshport_core::{DeviceIdentity, IdentityReply, TransportKind};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_exchange_against_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // One-shot mock device: read the query, answer with a valid reply
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = sock.read(&mut buf).await.unwrap();
            let (op, _, _) = wire::decode_header(&buf[..n]).unwrap();
            assert_eq!(op, wire::OP_IDENTITY_REQ);

            let reply = IdentityReply::ok(DeviceIdentity {
                model: Some("Station G2".to_string()),
                ..Default::default()
            });
            sock.write_all(&wire::encode_identity_reply(&reply).unwrap())
                .await
                .unwrap();
        });

        let endpoint = Endpoint::tcp(&addr.ip().to_string(), addr.port());
        assert_eq!(endpoint.kind, TransportKind::Tcp);

        let mut transport = TcpTransport::open(&endpoint).await.unwrap();
        transport
            .send(&wire::encode_identity_query().unwrap())
            .await
            .unwrap();
        let frame = transport
            .receive(Duration::from_millis(500))
            .await
            .unwrap();
        let reply = wire::decode_identity_reply(&frame).unwrap();
        assert!(reply.is_valid());

        transport.close().await;
        // Second close is a no-op
        transport.close().await;
        assert!(matches!(
            transport.send(b"x").await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_open_failure_is_open_error() {
        // Port 1 on localhost is essentially never listening
        let endpoint = Endpoint::tcp("127.0.0.1", 1);
        let err = TcpTransport::open(&endpoint).await.unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
    }
}
