//! BLE transport over btleplug (Nordic UART Service)
//!
//! MeshCore companion radios expose the byte link through NUS: the
//! host writes frames to the RX characteristic and receives device
//! frames as notifications on the TX characteristic. Notifications may
//! fragment frames, so receive() reassembles against the frame header.

use async_trait::async_trait;
use btleplug::api::{
    Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter,
    ValueNotification, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::{Stream, StreamExt};
use meshport_core::{Endpoint, LinkConfig};
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, TransportError};
use crate::wire;

/// Nordic UART Service
pub const NUS_SERVICE: Uuid = Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e);
/// Host-to-device characteristic (write)
pub const NUS_RX: Uuid = Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e);
/// Device-to-host characteristic (notify)
pub const NUS_TX: Uuid = Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e);

/// Chunk size for outgoing frames, the ATT minimum-MTU payload.
/// btleplug exposes no portable negotiated-MTU query, so writes stay
/// at the floor every stack accepts.
const WRITE_CHUNK: usize = 20;

async fn default_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters
        .into_iter()
        .next()
        .ok_or_else(|| TransportError::open("ble", "no Bluetooth adapter present"))
}

/// Discover BLE candidates whose advertised name matches the
/// configured device-name prefix. Returned in discovery order; no
/// further prioritization for BLE.
pub async fn scan_ble_endpoints(config: &LinkConfig) -> Result<Vec<Endpoint>> {
    let adapter = default_adapter().await?;

    debug!(window_ms = config.ble_scan_ms, prefix = %config.ble_name_prefix, "Scanning BLE");
    adapter.start_scan(ScanFilter::default()).await?;
    sleep(config.ble_scan_window()).await;
    if let Err(e) = adapter.stop_scan().await {
        warn!(error = %e, "Failed to stop BLE scan");
    }

    let mut endpoints = Vec::new();
    for peripheral in adapter.peripherals().await? {
        let Ok(Some(props)) = peripheral.properties().await else {
            continue;
        };
        let Some(name) = props.local_name else {
            continue;
        };
        if name.starts_with(&config.ble_name_prefix) {
            endpoints.push(Endpoint::ble(props.address.to_string()).with_label(name));
        }
    }

    debug!("Found {} BLE candidates", endpoints.len());
    Ok(endpoints)
}

/// BLE link to a companion radio
pub struct BleTransport {
    endpoint: Endpoint,
    peripheral: Option<Peripheral>,
    rx_char: Characteristic,
    tx_char: Characteristic,
    write_type: WriteType,
    notifications: Pin<Box<dyn Stream<Item = ValueNotification> + Send>>,
    buffer: Vec<u8>,
}

/// Pick the write mode the RX characteristic actually supports. NUS
/// firmware usually offers write-without-response, but some stacks
/// expose acknowledged writes only.
fn write_type_for(properties: CharPropFlags) -> WriteType {
    if properties.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE) {
        WriteType::WithoutResponse
    } else {
        WriteType::WithResponse
    }
}

impl BleTransport {
    /// Connect to the peripheral whose address (or advertised name)
    /// matches the endpoint and wire up the NUS characteristics.
    pub async fn open(endpoint: &Endpoint, config: &LinkConfig) -> Result<Self> {
        let adapter = default_adapter().await?;

        adapter.start_scan(ScanFilter::default()).await?;
        sleep(config.ble_scan_window()).await;
        if let Err(e) = adapter.stop_scan().await {
            warn!(error = %e, "Failed to stop BLE scan");
        }

        let peripheral = find_peripheral(&adapter, &endpoint.address)
            .await?
            .ok_or_else(|| TransportError::open(&endpoint.address, "peripheral not found"))?;

        debug!(address = %endpoint.address, "Connecting BLE peripheral");
        peripheral
            .connect()
            .await
            .map_err(|e| TransportError::open(&endpoint.address, e))?;

        match Self::wire_up(&peripheral, endpoint).await {
            Ok(transport) => Ok(transport),
            Err(e) => {
                // Failed mid-setup: release the peripheral before surfacing
                if let Err(dc) = peripheral.disconnect().await {
                    warn!(address = %endpoint.address, error = %dc, "BLE cleanup disconnect failed");
                }
                Err(e)
            }
        }
    }

    async fn wire_up(peripheral: &Peripheral, endpoint: &Endpoint) -> Result<Self> {
        peripheral.discover_services().await?;

        let chars = peripheral.characteristics();
        let rx_char = chars
            .iter()
            .find(|c| c.uuid == NUS_RX)
            .cloned()
            .ok_or_else(|| TransportError::open(&endpoint.address, "missing NUS RX characteristic"))?;
        let tx_char = chars
            .iter()
            .find(|c| c.uuid == NUS_TX)
            .cloned()
            .ok_or_else(|| TransportError::open(&endpoint.address, "missing NUS TX characteristic"))?;

        peripheral.subscribe(&tx_char).await?;
        let notifications = peripheral.notifications().await?;

        let write_type = write_type_for(rx_char.properties);

        Ok(Self {
            endpoint: endpoint.clone(),
            peripheral: Some(peripheral.clone()),
            rx_char,
            tx_char,
            write_type,
            notifications,
            buffer: Vec::new(),
        })
    }

    /// Pop one complete frame off the reassembly buffer, if present
    fn take_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let Some((_op, _flags, body_len)) = wire::decode_header(&self.buffer) else {
            return Ok(None);
        };
        if body_len as usize > wire::MAX_BODY_LEN {
            return Err(TransportError::Frame(format!(
                "body length {} exceeds limit",
                body_len
            )));
        }
        let total = wire::HEADER_LEN + body_len as usize;
        if self.buffer.len() < total {
            return Ok(None);
        }
        let frame = self.buffer[..total].to_vec();
        self.buffer.drain(..total);
        Ok(Some(frame))
    }
}

#[async_trait]
impl crate::transport::Transport for BleTransport {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn send(&mut self, frame: &[u8]) -> Result<()> {
        let peripheral = self.peripheral.as_ref().ok_or(TransportError::Closed)?;
        for chunk in frame.chunks(WRITE_CHUNK) {
            peripheral
                .write(&self.rx_char, chunk, self.write_type)
                .await?;
        }
        Ok(())
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        if self.peripheral.is_none() {
            return Err(TransportError::Closed);
        }
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(frame) = self.take_frame()? {
                return Ok(frame);
            }

            let remaining = deadline
                .checked_duration_since(Instant::now())
                .ok_or(TransportError::Timeout)?;

            match tokio::time::timeout(remaining, self.notifications.next()).await {
                Err(_) => return Err(TransportError::Timeout),
                Ok(None) => return Err(TransportError::Closed),
                Ok(Some(notification)) => {
                    if notification.uuid == self.tx_char.uuid {
                        self.buffer.extend_from_slice(&notification.value);
                    }
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Some(peripheral) = self.peripheral.take() {
            if let Err(e) = peripheral.unsubscribe(&self.tx_char).await {
                debug!(address = %self.endpoint.address, error = %e, "BLE unsubscribe failed");
            }
            if let Err(e) = peripheral.disconnect().await {
                warn!(address = %self.endpoint.address, error = %e, "BLE disconnect failed");
            }
            self.buffer.clear();
            debug!(address = %self.endpoint.address, "BLE peripheral closed");
        }
    }
}

impl Drop for BleTransport {
    /// Abandoned operations tear down by dropping the transport, and
    /// unlike serial and TCP handles a btleplug peripheral stays
    /// connected when dropped. Spawn the disconnect so the link is
    /// released even when `close()` was never reached.
    fn drop(&mut self) {
        let Some(peripheral) = self.peripheral.take() else {
            return;
        };
        let tx_char = self.tx_char.clone();
        let address = self.endpoint.address.clone();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(address = %address, "No runtime at drop, BLE peripheral left connected");
            return;
        };
        runtime.spawn(async move {
            let _ = peripheral.unsubscribe(&tx_char).await;
            if let Err(e) = peripheral.disconnect().await {
                warn!(address = %address, error = %e, "BLE disconnect on drop failed");
            }
            debug!(address = %address, "BLE peripheral released on drop");
        });
    }
}

/// Match a peripheral by Bluetooth address or advertised name
async fn find_peripheral(adapter: &Adapter, wanted: &str) -> Result<Option<Peripheral>> {
    for peripheral in adapter.peripherals().await? {
        let Ok(Some(props)) = peripheral.properties().await else {
            continue;
        };
        let address_matches = props.address.to_string().eq_ignore_ascii_case(wanted);
        let name_matches = props.local_name.as_deref() == Some(wanted);
        if address_matches || name_matches {
            return Ok(Some(peripheral));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_type_prefers_without_response() {
        let props = CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE;
        assert!(matches!(write_type_for(props), WriteType::WithoutResponse));
    }

    #[test]
    fn test_write_type_falls_back_to_acknowledged() {
        assert!(matches!(
            write_type_for(CharPropFlags::WRITE),
            WriteType::WithResponse
        ));
        assert!(matches!(
            write_type_for(CharPropFlags::empty()),
            WriteType::WithResponse
        ));
    }
}
