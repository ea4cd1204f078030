//! Endpoint types for candidate physical addresses

use serde::{Deserialize, Serialize};

/// Physical transport kind for a candidate endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// USB/UART serial device path
    Serial,
    /// Bluetooth Low Energy peripheral
    Ble,
    /// TCP host:port target
    Tcp,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Serial => write!(f, "serial"),
            TransportKind::Ble => write!(f, "ble"),
            TransportKind::Tcp => write!(f, "tcp"),
        }
    }
}

/// USB metadata attached to serial endpoints when the OS reports it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialPortMeta {
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

/// One candidate physical address that might host the target device.
///
/// Endpoints are immutable once enumerated within a scan pass. Addresses
/// are kind-scoped: the same display name on two kinds is two distinct
/// endpoints and is never deduplicated across kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Transport kind this address belongs to
    pub kind: TransportKind,
    /// Transport-specific address: device path, BLE identifier, or host:port
    pub address: String,
    /// Priority rank, lower is tried first
    pub rank: u8,
    /// Human-readable label (BLE advertised name), when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// OS-reported serial port metadata, when available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_meta: Option<SerialPortMeta>,
}

impl Endpoint {
    /// Create a serial endpoint with an explicit priority rank
    pub fn serial(path: impl Into<String>, rank: u8) -> Self {
        Self {
            kind: TransportKind::Serial,
            address: path.into(),
            rank,
            label: None,
            serial_meta: None,
        }
    }

    /// Create a BLE endpoint; BLE candidates keep discovery order
    pub fn ble(identifier: impl Into<String>) -> Self {
        Self {
            kind: TransportKind::Ble,
            address: identifier.into(),
            rank: 0,
            label: None,
            serial_meta: None,
        }
    }

    /// Create the single fixed TCP endpoint from a caller-supplied target
    pub fn tcp(host: &str, port: u16) -> Self {
        Self {
            kind: TransportKind::Tcp,
            address: format!("{}:{}", host, port),
            rank: 0,
            label: None,
            serial_meta: None,
        }
    }

    pub fn with_serial_meta(mut self, meta: SerialPortMeta) -> Self {
        self.serial_meta = Some(meta);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Whether this endpoint belongs to the USB-class candidate subset
    /// probed by quick scans (ranks 0-2)
    pub fn is_usb_class(&self) -> bool {
        self.kind == TransportKind::Serial && self.rank <= 2
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.address)
    }
}
