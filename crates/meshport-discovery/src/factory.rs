//! Transport construction seam.
//!
//! The scanner and connection manager never open hardware directly. They go
//! through a [`TransportFactory`], so probing logic can be exercised against
//! scripted transports without a radio on the bench.

use async_trait::async_trait;

use meshport_core::{Endpoint, LinkConfig};
use meshport_transport::{open_transport, Transport, TransportError};

/// Opens a ready-to-use transport for an endpoint.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn open(
        &self,
        endpoint: &Endpoint,
        config: &LinkConfig,
    ) -> Result<Box<dyn Transport>, TransportError>;
}

/// Factory backed by real serial, BLE and TCP transports.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhysicalFactory;

#[async_trait]
impl TransportFactory for PhysicalFactory {
    async fn open(
        &self,
        endpoint: &Endpoint,
        config: &LinkConfig,
    ) -> Result<Box<dyn Transport>, TransportError> {
        open_transport(endpoint, config).await
    }
}
