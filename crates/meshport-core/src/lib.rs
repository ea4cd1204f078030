//! Meshport Core - Shared types for the companion-radio connection engine
//!
//! This crate provides the foundational types for the meshport system:
//! - Endpoint addressing and priority ranking across transport kinds
//! - Identity replies and the validity rule for device confirmation
//! - Probe results produced by the scan orchestrator
//! - Link configuration (timeouts, retries, settle delays)

pub mod config;
pub mod endpoint;
pub mod identity;
pub mod probe;

pub use config::LinkConfig;
pub use endpoint::{Endpoint, SerialPortMeta, TransportKind};
pub use identity::{DeviceIdentity, IdentityReply};
pub use probe::{ProbeFailure, ProbeResult};
