//! Probe results produced by the scan orchestrator

use crate::endpoint::Endpoint;
use crate::identity::DeviceIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a candidate failed its probe.
///
/// Individual handshake attempt failures are absorbed by the retry
/// policy; only the final per-candidate outcome is recorded here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum ProbeFailure {
    /// The transport could not be opened; no handshake was attempted
    #[error("open failed: {0}")]
    Open(String),
    /// The handshake exhausted all attempts without a valid reply
    #[error("no valid identity reply")]
    NoValidReply,
}

/// Outcome of probing one endpoint. Produced once per endpoint per
/// scan pass and never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub endpoint: Endpoint,
    /// Whether the endpoint answered the identity query with a valid reply
    pub is_meshcore: bool,
    /// Decoded identity when the probe succeeded
    pub identity: Option<DeviceIdentity>,
    /// Failure kind when it did not
    pub failure: Option<ProbeFailure>,
    /// When the probe finished
    pub probed_at: DateTime<Utc>,
}

impl ProbeResult {
    pub fn confirmed(endpoint: Endpoint, identity: DeviceIdentity) -> Self {
        Self {
            endpoint,
            is_meshcore: true,
            identity: Some(identity),
            failure: None,
            probed_at: Utc::now(),
        }
    }

    pub fn negative(endpoint: Endpoint, failure: ProbeFailure) -> Self {
        Self {
            endpoint,
            is_meshcore: false,
            identity: None,
            failure: Some(failure),
            probed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_result_carries_failure() {
        let ep = Endpoint::serial("/dev/ttyS0", 3);
        let result = ProbeResult::negative(ep.clone(), ProbeFailure::Open("busy".into()));
        assert!(!result.is_meshcore);
        assert!(result.identity.is_none());
        assert_eq!(result.failure, Some(ProbeFailure::Open("busy".into())));
        assert_eq!(result.endpoint, ep);
    }

    #[test]
    fn test_confirmed_result() {
        let ep = Endpoint::serial("/dev/ttyUSB0", 0);
        let identity = DeviceIdentity {
            model: Some("RAK4631".to_string()),
            ..Default::default()
        };
        let result = ProbeResult::confirmed(ep, identity.clone());
        assert!(result.is_meshcore);
        assert_eq!(result.identity, Some(identity));
        assert!(result.failure.is_none());
    }
}
