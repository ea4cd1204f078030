//! Link configuration: timeouts, retries, and settle delays
//!
//! Every value here is an overridable parameter surfaced to the
//! orchestration layer, not a hard-coded constant.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for opening links and running the identification handshake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// How long to wait for one identity reply (milliseconds)
    #[serde(default = "default_identify_timeout_ms")]
    pub identify_timeout_ms: u64,
    /// Retries after the first attempt (2 means up to 3 attempts total)
    #[serde(default = "default_identify_retries")]
    pub identify_retries: u32,
    /// Fixed delay between handshake attempts (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Settle delay after opening a serial port, before the first write.
    /// Skipping this is a known cause of spurious identification failures.
    #[serde(default = "default_open_settle_ms")]
    pub open_settle_ms: u64,
    /// Settle delay after teardown before the connection slot is reusable
    #[serde(default = "default_disconnect_settle_ms")]
    pub disconnect_settle_ms: u64,
    /// Serial baudrate
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,
    /// BLE scan window (milliseconds)
    #[serde(default = "default_ble_scan_ms")]
    pub ble_scan_ms: u64,
    /// Advertised-name prefix that marks a BLE peripheral as a candidate
    #[serde(default = "default_ble_name_prefix")]
    pub ble_name_prefix: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            identify_timeout_ms: default_identify_timeout_ms(),
            identify_retries: default_identify_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            open_settle_ms: default_open_settle_ms(),
            disconnect_settle_ms: default_disconnect_settle_ms(),
            baudrate: default_baudrate(),
            ble_scan_ms: default_ble_scan_ms(),
            ble_name_prefix: default_ble_name_prefix(),
        }
    }
}

fn default_identify_timeout_ms() -> u64 {
    5000
}

fn default_identify_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_open_settle_ms() -> u64 {
    200
}

fn default_disconnect_settle_ms() -> u64 {
    100
}

fn default_baudrate() -> u32 {
    115200
}

fn default_ble_scan_ms() -> u64 {
    2000
}

fn default_ble_name_prefix() -> String {
    "MeshCore-".to_string()
}

impl LinkConfig {
    pub fn identify_timeout(&self) -> Duration {
        Duration::from_millis(self.identify_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn open_settle(&self) -> Duration {
        Duration::from_millis(self.open_settle_ms)
    }

    pub fn disconnect_settle(&self) -> Duration {
        Duration::from_millis(self.disconnect_settle_ms)
    }

    pub fn ble_scan_window(&self) -> Duration {
        Duration::from_millis(self.ble_scan_ms)
    }
}
