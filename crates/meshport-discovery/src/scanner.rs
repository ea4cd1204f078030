//! Scan orchestrator: probe candidate endpoints for MeshCore radios.
//!
//! Candidates are probed strictly sequentially so only one endpoint holds
//! hardware at a time; serial ports in particular tolerate no concurrent
//! opens. Every opened transport is closed before the next candidate is
//! touched, whatever the probe outcome was.

use tracing::{debug, info, warn};

use meshport_core::{Endpoint, LinkConfig, ProbeFailure, ProbeResult, TransportKind};
use meshport_transport::ble::scan_ble_endpoints;
use meshport_transport::identify;

use crate::enumerate::enumerate_serial;
use crate::factory::TransportFactory;

/// Sequentially probes endpoints of one transport kind.
pub struct Scanner<F: TransportFactory> {
    factory: F,
    config: LinkConfig,
}

impl<F: TransportFactory> Scanner<F> {
    pub fn new(factory: F, config: LinkConfig) -> Self {
        Self { factory, config }
    }

    /// Enumerates candidates for `kind` and probes them.
    ///
    /// Quick mode restricts serial candidates to the USB device class and
    /// stops at the first confirmed radio; full mode probes every candidate
    /// and reports all outcomes.
    ///
    /// Only serial and BLE have an enumeration step. TCP targets are
    /// caller-supplied, so `scan(Tcp, _)` is always empty; probe them by
    /// passing the explicit endpoints to [`Self::scan_candidates`].
    pub async fn scan(&self, kind: TransportKind, quick: bool) -> Vec<ProbeResult> {
        let candidates = match kind {
            TransportKind::Serial => enumerate_serial(),
            TransportKind::Ble => match scan_ble_endpoints(&self.config).await {
                Ok(endpoints) => endpoints,
                Err(err) => {
                    warn!(error = %err, "BLE enumeration failed");
                    Vec::new()
                }
            },
            TransportKind::Tcp => {
                debug!("TCP endpoints are never enumerated, probe them via scan_candidates");
                Vec::new()
            }
        };

        self.scan_candidates(candidates, quick).await
    }

    /// Probes an explicit candidate list, preserving its order.
    pub async fn scan_candidates(
        &self,
        candidates: Vec<Endpoint>,
        quick: bool,
    ) -> Vec<ProbeResult> {
        let candidates: Vec<Endpoint> = if quick {
            candidates
                .into_iter()
                .filter(|e| e.kind != TransportKind::Serial || e.is_usb_class())
                .collect()
        } else {
            candidates
        };

        info!(
            candidates = candidates.len(),
            quick, "Starting endpoint scan"
        );

        let mut results = Vec::with_capacity(candidates.len());
        for endpoint in candidates {
            let result = self.probe(endpoint).await;
            let found = result.is_meshcore;
            results.push(result);
            if quick && found {
                debug!("Quick scan stopping at first confirmed radio");
                break;
            }
        }

        info!(
            probed = results.len(),
            confirmed = results.iter().filter(|r| r.is_meshcore).count(),
            "Endpoint scan finished"
        );
        results
    }

    /// Probes one endpoint: open, handshake, close. The transport is closed
    /// before this returns, on every path.
    pub async fn probe(&self, endpoint: Endpoint) -> ProbeResult {
        debug!(endpoint = %endpoint, "Probing endpoint");

        let mut transport = match self.factory.open(&endpoint, &self.config).await {
            Ok(transport) => transport,
            Err(err) => {
                debug!(endpoint = %endpoint, error = %err, "Open failed");
                return ProbeResult::negative(endpoint, ProbeFailure::Open(err.to_string()));
            }
        };

        let identity = identify(transport.as_mut(), &self.config).await;
        transport.close().await;

        match identity {
            Some(identity) => {
                info!(
                    endpoint = %endpoint,
                    model = identity.model.as_deref().unwrap_or("?"),
                    "Confirmed MeshCore radio"
                );
                ProbeResult::confirmed(endpoint, identity)
            }
            None => ProbeResult::negative(endpoint, ProbeFailure::NoValidReply),
        }
    }
}
