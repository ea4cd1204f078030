//! Meshport Transport - Physical links to MeshCore companion radios
//!
//! This crate provides the transport capability shared by all link
//! kinds (serial, BLE, TCP), the wire codec for the single identity
//! query, and the bounded identification handshake:
//! - `Transport` trait: framed send/receive with idempotent teardown
//! - `open_transport`: factory from an `Endpoint` to a live link
//! - `identify`/`query_identity`: the retry-bounded handshake

pub mod ble;
pub mod error;
pub mod identify;
pub mod serial;
pub mod tcp;
pub mod transport;
pub mod wire;

pub use error::TransportError;
pub use identify::{identify, query_identity, AttemptOutcome};
pub use transport::{open_transport, Transport};
