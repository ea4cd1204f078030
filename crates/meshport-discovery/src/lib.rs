//! Meshport Discovery - Finding and keeping the live radio link
//!
//! This crate provides the autodetection engine:
//! - Endpoint enumeration with heuristic prioritization per transport kind
//! - The sequential scan orchestrator with quick and full modes
//! - The connection manager state machine owning the single live link
//! - The auto-connect routine used at unattended startup

pub mod autoconnect;
pub mod connection;
pub mod enumerate;
pub mod factory;
pub mod scanner;

pub use autoconnect::{auto_connect, ConnectIntent};
pub use connection::{ConnectError, ConnectionManager, ConnectionState};
pub use enumerate::{enumerate_serial, serial_rank};
pub use factory::{PhysicalFactory, TransportFactory};
pub use scanner::Scanner;
