//! Identity replies returned by the device query

use serde::{Deserialize, Serialize};

/// Decoded payload of a device identity reply.
///
/// Every field is optional: flaky firmware revisions omit fields, and
/// the validity rule below decides whether the reply counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Radio model string (e.g. "Heltec V3"); required for validity
    #[serde(default)]
    pub model: Option<String>,
    /// Advertised node name
    #[serde(default)]
    pub name: Option<String>,
    /// Firmware version string
    #[serde(default, rename = "ver")]
    pub firmware_version: Option<String>,
    /// Node public key, hex encoded
    #[serde(default)]
    pub public_key: Option<String>,
}

/// One structured reply to the identity query.
///
/// `error` is set when the device answered with an error event instead
/// of an identity payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityReply {
    pub error: bool,
    pub identity: DeviceIdentity,
}

impl IdentityReply {
    pub fn ok(identity: DeviceIdentity) -> Self {
        Self {
            error: false,
            identity,
        }
    }

    pub fn error_event() -> Self {
        Self {
            error: true,
            identity: DeviceIdentity::default(),
        }
    }

    /// Validity requires both: no error indicator AND a recognized model
    /// field in the payload. Either missing fails validity.
    pub fn is_valid(&self) -> bool {
        !self.error && self.identity.model.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_with_model() -> DeviceIdentity {
        DeviceIdentity {
            model: Some("Heltec V3".to_string()),
            name: Some("base-camp".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_reply() {
        assert!(IdentityReply::ok(identity_with_model()).is_valid());
    }

    #[test]
    fn test_error_event_is_invalid() {
        let reply = IdentityReply {
            error: true,
            identity: identity_with_model(),
        };
        assert!(!reply.is_valid());
    }

    #[test]
    fn test_missing_model_is_invalid() {
        // A clean reply without a model field still fails validity
        let reply = IdentityReply::ok(DeviceIdentity {
            name: Some("base-camp".to_string()),
            ..Default::default()
        });
        assert!(!reply.is_valid());
    }
}
