//! Meshport CLI - Main entry point
//!
//! Scans for MeshCore companion radios and connects to one, either at a
//! named endpoint or via autodetection.

mod config;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use meshport_core::{ProbeResult, TransportKind};
use meshport_discovery::{
    auto_connect, ConnectIntent, ConnectionManager, PhysicalFactory, Scanner,
};

#[derive(Parser, Debug)]
#[command(name = "meshport")]
#[command(about = "MeshCore companion radio detection and connection tool")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(long, default_value = "meshport.toml")]
    config: PathBuf,

    /// Serial device path to connect to
    #[arg(short, long)]
    serial: Option<String>,

    /// Serial baudrate override
    #[arg(short, long)]
    baudrate: Option<u32>,

    /// Hostname of a companion radio served over TCP
    #[arg(short, long)]
    tcp: Option<String>,

    /// TCP port
    #[arg(short, long, default_value_t = 5000)]
    port: u16,

    /// BLE address of the radio
    #[arg(short, long)]
    address: Option<String>,

    /// Scan for radios instead of connecting
    #[arg(long)]
    scan: bool,

    /// Probe every candidate instead of stopping at the first radio
    #[arg(long)]
    full: bool,

    /// Write a default configuration file and exit
    #[arg(long)]
    init_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Meshport v{}", env!("CARGO_PKG_VERSION"));

    if args.init_config {
        config::save_default_config(&args.config)?;
        println!("Wrote default configuration to {}", args.config.display());
        return Ok(());
    }

    // Load configuration
    let mut config = config::load_config(&args.config)?;
    if let Some(baudrate) = args.baudrate {
        config.link.baudrate = baudrate;
    }

    let scanner = Scanner::new(PhysicalFactory, config.link.clone());

    if args.scan {
        run_scan(&scanner, args.full).await;
        return Ok(());
    }

    let intent = match (&args.serial, &args.tcp, &args.address) {
        (Some(path), _, _) => ConnectIntent::Serial { path: path.clone() },
        (None, Some(host), _) => ConnectIntent::Tcp {
            host: host.clone(),
            port: args.port,
        },
        (None, None, Some(address)) => ConnectIntent::Ble {
            address: Some(address.clone()),
        },
        (None, None, None) => ConnectIntent::Auto,
    };

    let mut manager = ConnectionManager::new(PhysicalFactory, config.link.clone());

    // A remembered BLE radio gets first refusal before a blind scan
    let endpoint = if intent == ConnectIntent::Auto {
        match remembered_intent() {
            Some(remembered) => {
                match auto_connect(&mut manager, &scanner, remembered).await {
                    Ok(Some(endpoint)) => Some(endpoint),
                    _ => {
                        info!("Remembered radio unavailable, scanning");
                        auto_connect(&mut manager, &scanner, ConnectIntent::Auto).await?
                    }
                }
            }
            None => auto_connect(&mut manager, &scanner, ConnectIntent::Auto).await?,
        }
    } else {
        auto_connect(&mut manager, &scanner, intent).await?
    };

    let Some(endpoint) = endpoint else {
        println!("No MeshCore radio found.");
        return Ok(());
    };

    println!("Connected to {}", endpoint);
    if endpoint.kind == TransportKind::Ble {
        config::remember_ble_address(&endpoint.address);
    }

    manager.wait_for_identity().await;
    if let Some(identity) = manager.device_identity() {
        if let Some(model) = &identity.model {
            println!("  Model: {}", model);
        }
        if let Some(name) = &identity.name {
            println!("  Name: {}", name);
        }
        if let Some(version) = &identity.firmware_version {
            println!("  Firmware: {}", version);
        }
        if let Some(key) = &identity.public_key {
            println!("  Public key: {}", key);
        }
    }

    manager.disconnect().await;
    Ok(())
}

fn remembered_intent() -> Option<ConnectIntent> {
    config::remembered_ble_address().map(|address| ConnectIntent::Ble {
        address: Some(address),
    })
}

async fn run_scan(scanner: &Scanner<PhysicalFactory>, full: bool) {
    let quick = !full;

    println!("Scanning serial ports...");
    let serial = scanner.scan(TransportKind::Serial, quick).await;
    print_results(&serial);

    println!("Scanning BLE...");
    let ble = scanner.scan(TransportKind::Ble, quick).await;
    print_results(&ble);

    let confirmed = serial.iter().chain(ble.iter()).filter(|r| r.is_meshcore);
    println!("Found {} radio(s).", confirmed.count());
}

fn print_results(results: &[ProbeResult]) {
    for result in results {
        if result.is_meshcore {
            let model = result
                .identity
                .as_ref()
                .and_then(|i| i.model.as_deref())
                .unwrap_or("?");
            println!("  - {} [MeshCore, model {}]", result.endpoint, model);
        } else {
            let reason = result
                .failure
                .as_ref()
                .map(|f| f.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!("  - {} [{}]", result.endpoint, reason);
        }
    }
}
