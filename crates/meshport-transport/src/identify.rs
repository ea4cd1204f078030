//! Identification handshake: bounded query/reply exchange
//!
//! Retry policy is explicit state, not exception control flow: each
//! attempt produces an `AttemptOutcome` fed to a bounded loop with the
//! configured inter-retry delay. The handshake issues no
//! resource-acquiring calls beyond send/receive; callers stay
//! responsible for `close()`.

use meshport_core::{DeviceIdentity, IdentityReply, LinkConfig};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::transport::Transport;
use crate::wire;

/// Outcome of a single handshake attempt
#[derive(Debug)]
pub enum AttemptOutcome {
    /// Valid reply: no error indicator and a model field present
    Success(DeviceIdentity),
    /// No reply within the bound; retryable
    Timeout,
    /// A reply arrived but failed the validity predicate; retryable,
    /// flaky devices may need another query cycle
    InvalidReply,
    /// Unexpected transport-level failure; treated as a failed attempt,
    /// not a fatal abort
    TransportError(TransportError),
}

/// Send one identity query and wait for the structured reply
pub async fn query_identity(
    transport: &mut dyn Transport,
    timeout: Duration,
) -> Result<IdentityReply> {
    let query = wire::encode_identity_query()?;
    transport.send(&query).await?;
    let frame = transport.receive(timeout).await?;
    wire::decode_identity_reply(&frame)
}

async fn attempt(transport: &mut dyn Transport, timeout: Duration) -> AttemptOutcome {
    match query_identity(transport, timeout).await {
        Ok(reply) if reply.is_valid() => AttemptOutcome::Success(reply.identity),
        Ok(_) => AttemptOutcome::InvalidReply,
        Err(e) if e.is_timeout() => AttemptOutcome::Timeout,
        Err(e) => AttemptOutcome::TransportError(e),
    }
}

/// Run the identification handshake over an open transport.
///
/// Up to `identify_retries + 1` attempts, with the configured
/// inter-retry delay between them to let device-side buffering settle.
/// Returns the decoded identity on the first valid reply, `None` once
/// all attempts are exhausted.
pub async fn identify(
    transport: &mut dyn Transport,
    config: &LinkConfig,
) -> Option<DeviceIdentity> {
    let attempts = config.identify_retries + 1;
    let endpoint = transport.endpoint().clone();

    for n in 1..=attempts {
        trace!(endpoint = %endpoint, attempt = n, "Identity attempt");

        match attempt(transport, config.identify_timeout()).await {
            AttemptOutcome::Success(identity) => {
                debug!(
                    endpoint = %endpoint,
                    model = identity.model.as_deref().unwrap_or("?"),
                    attempt = n,
                    "Device identified"
                );
                return Some(identity);
            }
            outcome => {
                debug!(endpoint = %endpoint, attempt = n, outcome = ?outcome, "Identity attempt failed");
            }
        }

        if n < attempts {
            sleep(config.retry_delay()).await;
        }
    }

    debug!(endpoint = %endpoint, attempts = attempts, "Identification exhausted");
    None
}
