//! Transport-level error taxonomy

use thiserror::Error;

/// Failures surfaced by transports and the identity exchange.
///
/// `Timeout` is a normal, retryable outcome for the handshake policy;
/// `Open` is non-retryable within a single probe. Teardown failures are
/// never represented here: `Transport::close` swallows and logs them.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Resource unavailable or busy; the candidate is skipped
    #[error("failed to open {address}: {reason}")]
    Open { address: String, reason: String },

    /// No reply within the receive bound
    #[error("timed out waiting for reply")]
    Timeout,

    /// A reply arrived but could not be decoded as a device frame
    #[error("invalid frame: {0}")]
    Frame(String),

    /// I/O errors from tokio or std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// BLE stack errors
    #[error("BLE error: {0}")]
    Ble(#[from] btleplug::Error),

    /// The transport was closed while an exchange was in flight
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    pub fn open(address: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Open {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this failure is a receive timeout (retryable per the
    /// handshake policy rather than a distinct error class)
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
