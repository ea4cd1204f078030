//! Unattended startup: turn a connect intent into a live link.
//!
//! Explicit intents (a named port, host, or BLE address) connect
//! directly. The `Auto` intent runs quick scans, BLE first since a
//! remembered radio usually lives there, then serial, and connects to
//! the first confirmed radio. Finding no device is a normal outcome,
//! not an error.

use tracing::{debug, info};

use meshport_core::{Endpoint, ProbeResult, TransportKind};

use crate::connection::{ConnectError, ConnectionManager};
use crate::factory::TransportFactory;
use crate::scanner::Scanner;

/// What the caller asked to connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectIntent {
    /// A named serial device path
    Serial { path: String },
    /// A companion server over TCP
    Tcp { host: String, port: u16 },
    /// A BLE peripheral; without an address, scan for one
    Ble { address: Option<String> },
    /// No preference: scan BLE, then serial
    Auto,
}

/// First confirmed radio in scan order, if any.
pub fn first_confirmed(results: &[ProbeResult]) -> Option<&ProbeResult> {
    results.iter().find(|r| r.is_meshcore)
}

/// Resolves `intent` to an endpoint and connects the manager to it.
///
/// Returns the connected endpoint, or `None` when auto-detection found
/// no radio. Connection failures on an explicitly named endpoint
/// propagate; scan-level failures (no adapter, no ports) degrade to the
/// not-found outcome.
pub async fn auto_connect<F, S>(
    manager: &mut ConnectionManager<F>,
    scanner: &Scanner<S>,
    intent: ConnectIntent,
) -> Result<Option<Endpoint>, ConnectError>
where
    F: TransportFactory,
    S: TransportFactory,
{
    let endpoint = match intent {
        ConnectIntent::Serial { path } => Some(Endpoint::serial(path, 0)),
        ConnectIntent::Tcp { host, port } => Some(Endpoint::tcp(&host, port)),
        ConnectIntent::Ble {
            address: Some(address),
        } => Some(Endpoint::ble(address)),
        ConnectIntent::Ble { address: None } => {
            let results = scanner.scan(TransportKind::Ble, true).await;
            first_confirmed(&results).map(|r| r.endpoint.clone())
        }
        ConnectIntent::Auto => {
            let ble = scanner.scan(TransportKind::Ble, true).await;
            match first_confirmed(&ble) {
                Some(result) => Some(result.endpoint.clone()),
                None => {
                    debug!("No BLE radio found, falling back to serial scan");
                    let serial = scanner.scan(TransportKind::Serial, true).await;
                    first_confirmed(&serial).map(|r| r.endpoint.clone())
                }
            }
        }
    };

    let Some(endpoint) = endpoint else {
        info!("Auto-detection found no radio");
        return Ok(None);
    };

    manager.connect(endpoint.clone(), false).await?;
    Ok(Some(endpoint))
}
