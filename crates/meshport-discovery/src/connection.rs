//! Connection manager: the single live link to a radio.
//!
//! The manager is a small state machine. Exactly one transport can be
//! live at a time; a connect request while any link activity is in
//! flight is rejected outright rather than queued. Every failure path
//! returns the machine to `Idle` with the transport closed.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use meshport_core::{DeviceIdentity, Endpoint, LinkConfig};
use meshport_transport::{identify, query_identity, Transport};

use crate::factory::TransportFactory;

/// Lifecycle of the managed link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Verifying,
    Connected,
    Disconnecting,
}

/// Why a connect request was refused or failed.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// A link is already live or in transition; disconnect first
    #[error("a connection is already active")]
    Busy,
    /// The transport could not be opened
    #[error("open failed: {0}")]
    Open(String),
    /// The endpoint opened but did not identify as a MeshCore radio
    #[error("verification failed: {0}")]
    Verification(String),
}

struct ActiveLink {
    endpoint: Endpoint,
    transport: Arc<AsyncMutex<Box<dyn Transport>>>,
    identity: Arc<Mutex<Option<DeviceIdentity>>>,
    connected_at: DateTime<Utc>,
    /// Detached metadata query issued by an unverified connect
    metadata_task: Option<JoinHandle<()>>,
}

/// Owns at most one live transport and drives it through the
/// connect/verify/disconnect lifecycle.
pub struct ConnectionManager<F: TransportFactory> {
    factory: F,
    config: LinkConfig,
    state: ConnectionState,
    link: Option<ActiveLink>,
}

impl<F: TransportFactory> ConnectionManager<F> {
    pub fn new(factory: F, config: LinkConfig) -> Self {
        Self {
            factory,
            config,
            state: ConnectionState::Idle,
            link: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Identity of the connected radio, when known. An unverified
    /// connect fills this in from a background query, so it may lag
    /// the connection itself.
    pub fn device_identity(&self) -> Option<DeviceIdentity> {
        self.link
            .as_ref()
            .and_then(|l| l.identity.lock().unwrap().clone())
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.link.as_ref().map(|l| &l.endpoint)
    }

    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        self.link.as_ref().map(|l| l.connected_at)
    }

    /// Live transport for the client layer. `None` unless connected.
    pub fn transport(&self) -> Option<Arc<AsyncMutex<Box<dyn Transport>>>> {
        if self.state != ConnectionState::Connected {
            return None;
        }
        self.link.as_ref().map(|l| l.transport.clone())
    }

    /// Waits for the background metadata query of an unverified connect
    /// to finish. Purely a convenience for callers that want to print
    /// the identity right after connecting.
    pub async fn wait_for_identity(&mut self) {
        if let Some(task) = self.link.as_mut().and_then(|l| l.metadata_task.take()) {
            let _ = task.await;
        }
    }

    /// Establishes the link to `endpoint`.
    ///
    /// With `verify` set, the full identification handshake must succeed
    /// before the link counts as connected; a handshake failure tears the
    /// transport down again. Without it the link counts as connected as
    /// soon as the transport opens; a single identity query then runs as
    /// a detached task to fill in metadata, with failure tolerated.
    pub async fn connect(&mut self, endpoint: Endpoint, verify: bool) -> Result<(), ConnectError> {
        if self.state != ConnectionState::Idle {
            return Err(ConnectError::Busy);
        }

        self.state = ConnectionState::Connecting;
        info!(endpoint = %endpoint, verify, "Connecting");

        let mut transport = match self.factory.open(&endpoint, &self.config).await {
            Ok(transport) => transport,
            Err(err) => {
                warn!(endpoint = %endpoint, error = %err, "Open failed");
                self.state = ConnectionState::Idle;
                return Err(ConnectError::Open(err.to_string()));
            }
        };

        let identity = if verify {
            self.state = ConnectionState::Verifying;
            match identify(transport.as_mut(), &self.config).await {
                Some(identity) => Some(identity),
                None => {
                    warn!(endpoint = %endpoint, "Verification failed, tearing down");
                    transport.close().await;
                    self.state = ConnectionState::Idle;
                    return Err(ConnectError::Verification(
                        "no valid identity reply".to_string(),
                    ));
                }
            }
        } else {
            None
        };

        let mut link = ActiveLink {
            endpoint: endpoint.clone(),
            transport: Arc::new(AsyncMutex::new(transport)),
            identity: Arc::new(Mutex::new(identity)),
            connected_at: Utc::now(),
            metadata_task: None,
        };

        if !verify {
            // Metadata only; the link is already up, and an unresponsive
            // device must not delay or undo it
            link.metadata_task = Some(spawn_metadata_query(
                link.transport.clone(),
                link.identity.clone(),
                endpoint.clone(),
                self.config.identify_timeout(),
            ));
        }

        self.link = Some(link);
        self.state = ConnectionState::Connected;
        info!(endpoint = %endpoint, "Connected");
        Ok(())
    }

    /// Tears the link down and returns to `Idle`. A no-op when already
    /// idle, so it is safe to call unconditionally during shutdown.
    pub async fn disconnect(&mut self) {
        if self.state == ConnectionState::Idle {
            return;
        }

        self.state = ConnectionState::Disconnecting;
        if let Some(mut link) = self.link.take() {
            if let Some(task) = link.metadata_task.take() {
                task.abort();
                let _ = task.await;
            }
            info!(endpoint = %link.endpoint, "Disconnecting");
            link.transport.lock().await.close().await;
        }
        // OS-side resource release (USB handles especially) is not
        // instantaneous; give it a beat before the slot is reusable.
        self.settle(self.config.disconnect_settle()).await;
        self.state = ConnectionState::Idle;
    }

    async fn settle(&self, duration: Duration) {
        if !duration.is_zero() {
            sleep(duration).await;
        }
    }
}

fn spawn_metadata_query(
    transport: Arc<AsyncMutex<Box<dyn Transport>>>,
    slot: Arc<Mutex<Option<DeviceIdentity>>>,
    endpoint: Endpoint,
    timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut transport = transport.lock().await;
        match query_identity(transport.as_mut(), timeout).await {
            Ok(reply) if reply.is_valid() => {
                *slot.lock().unwrap() = Some(reply.identity);
            }
            Ok(_) | Err(_) => {
                debug!(endpoint = %endpoint, "Identity metadata unavailable");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use meshport_core::IdentityReply;
    use meshport_transport::{wire, TransportError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Behavior {
        OpenFail,
        ValidReply,
        Timeout,
        /// Never answers; receive blocks for its full timeout
        Silent,
    }

    struct MockTransport {
        endpoint: Endpoint,
        behavior: Behavior,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Transport for MockTransport {
        fn endpoint(&self) -> &Endpoint {
            &self.endpoint
        }

        async fn send(&mut self, _frame: &[u8]) -> Result<(), TransportError> {
            Ok(())
        }

        async fn receive(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
            match self.behavior {
                Behavior::ValidReply => {
                    let reply = IdentityReply::ok(DeviceIdentity {
                        model: Some("RAK4631".to_string()),
                        name: Some("ridge-node".to_string()),
                        ..Default::default()
                    });
                    Ok(wire::encode_identity_reply(&reply).unwrap())
                }
                Behavior::Timeout => Err(TransportError::Timeout),
                Behavior::Silent => {
                    sleep(timeout).await;
                    Err(TransportError::Timeout)
                }
                Behavior::OpenFail => unreachable!(),
            }
        }

        async fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct MockFactory {
        behavior: Behavior,
        closes: Arc<AtomicUsize>,
    }

    impl MockFactory {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                closes: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl TransportFactory for MockFactory {
        async fn open(
            &self,
            endpoint: &Endpoint,
            _config: &LinkConfig,
        ) -> Result<Box<dyn Transport>, TransportError> {
            if self.behavior == Behavior::OpenFail {
                return Err(TransportError::open(&endpoint.address, "no such device"));
            }
            Ok(Box::new(MockTransport {
                endpoint: endpoint.clone(),
                behavior: self.behavior,
                closes: self.closes.clone(),
            }))
        }
    }

    fn fast_config() -> LinkConfig {
        let mut config = LinkConfig::default();
        config.identify_timeout_ms = 50;
        config.retry_delay_ms = 1;
        config.disconnect_settle_ms = 0;
        config
    }

    fn manager(behavior: Behavior) -> (ConnectionManager<MockFactory>, Arc<AtomicUsize>) {
        let factory = MockFactory::new(behavior);
        let closes = factory.closes.clone();
        (ConnectionManager::new(factory, fast_config()), closes)
    }

    #[tokio::test]
    async fn test_connect_verify_disconnect_cycle() {
        let (mut mgr, closes) = manager(Behavior::ValidReply);
        assert_eq!(mgr.state(), ConnectionState::Idle);

        mgr.connect(Endpoint::serial("/dev/ttyUSB0", 0), true)
            .await
            .unwrap();
        assert!(mgr.is_connected());
        assert_eq!(
            mgr.device_identity().and_then(|i| i.model),
            Some("RAK4631".to_string())
        );
        assert!(mgr.connected_at().is_some());

        mgr.disconnect().await;
        assert_eq!(mgr.state(), ConnectionState::Idle);
        assert!(mgr.device_identity().is_none());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_open_failure_returns_to_idle() {
        let (mut mgr, closes) = manager(Behavior::OpenFail);

        let err = mgr
            .connect(Endpoint::serial("/dev/ttyUSB0", 0), true)
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectError::Open(_)));
        assert_eq!(mgr.state(), ConnectionState::Idle);
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_verification_failure_closes_and_allows_retry() {
        let (mut mgr, closes) = manager(Behavior::Timeout);

        let err = mgr
            .connect(Endpoint::serial("/dev/ttyUSB0", 0), true)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::Verification(_)));
        assert_eq!(mgr.state(), ConnectionState::Idle);
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        // The slot is free again; a second attempt is accepted
        let err = mgr
            .connect(Endpoint::serial("/dev/ttyUSB0", 0), true)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::Verification(_)));
    }

    #[tokio::test]
    async fn test_unverified_connect_does_not_wait_for_metadata() {
        let (mut mgr, _closes) = manager(Behavior::Silent);
        let mut config = fast_config();
        config.identify_timeout_ms = 400;
        mgr.config = config;

        let started = Instant::now();
        mgr.connect(Endpoint::tcp("localhost", 5000), false)
            .await
            .unwrap();

        // Connected well before the silent device's query can time out
        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(mgr.is_connected());
        assert!(mgr.device_identity().is_none());
        assert!(mgr.transport().is_some());

        // The background query against a silent device yields nothing
        mgr.wait_for_identity().await;
        assert!(mgr.device_identity().is_none());
    }

    #[tokio::test]
    async fn test_unverified_connect_fills_metadata_in_background() {
        let (mut mgr, _closes) = manager(Behavior::ValidReply);

        mgr.connect(Endpoint::tcp("localhost", 5000), false)
            .await
            .unwrap();
        assert!(mgr.is_connected());

        mgr.wait_for_identity().await;
        assert_eq!(
            mgr.device_identity().and_then(|i| i.model),
            Some("RAK4631".to_string())
        );
    }

    #[tokio::test]
    async fn test_disconnect_aborts_pending_metadata_query() {
        let (mut mgr, closes) = manager(Behavior::Silent);
        let mut config = fast_config();
        config.identify_timeout_ms = 10_000;
        mgr.config = config;

        mgr.connect(Endpoint::tcp("localhost", 5000), false)
            .await
            .unwrap();

        // Teardown must not wait out the 10s query bound
        let started = Instant::now();
        mgr.disconnect().await;
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(mgr.state(), ConnectionState::Idle);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_connect_while_connected_is_busy() {
        let (mut mgr, _closes) = manager(Behavior::ValidReply);
        mgr.connect(Endpoint::serial("/dev/ttyUSB0", 0), true)
            .await
            .unwrap();

        let err = mgr
            .connect(Endpoint::serial("/dev/ttyUSB1", 1), true)
            .await
            .unwrap_err();

        assert!(matches!(err, ConnectError::Busy));
        // The first link is untouched
        assert!(mgr.is_connected());
        assert_eq!(
            mgr.endpoint().map(|e| e.address.as_str()),
            Some("/dev/ttyUSB0")
        );
    }

    #[tokio::test]
    async fn test_disconnect_when_idle_is_noop() {
        let (mut mgr, closes) = manager(Behavior::ValidReply);

        mgr.disconnect().await;

        assert_eq!(mgr.state(), ConnectionState::Idle);
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }
}
