//! Endpoint enumeration.
//!
//! Produces candidate endpoints per transport kind, ordered so the most
//! promising candidates are probed first. Serial ordering uses a path
//! heuristic: USB CDC adapters almost always enumerate as `ttyUSB*` or
//! `ttyACM*`, and companion radios are typically the first USB adapter.

use tokio_serial::{available_ports, SerialPortType};
use tracing::{debug, warn};

use meshport_core::{Endpoint, SerialPortMeta};

/// Priority rank for a serial device path. Lower probes first.
///
/// 0: first USB serial adapter, 1: any other USB serial adapter,
/// 2: CDC ACM device, 3: everything else.
pub fn serial_rank(path: &str) -> u8 {
    let lower = path.to_ascii_lowercase();
    if lower.contains("ttyusb0") {
        0
    } else if lower.contains("usb") {
        1
    } else if lower.contains("acm") {
        2
    } else {
        3
    }
}

/// Enumerates serial ports visible to the host, ordered by [`serial_rank`].
///
/// Ports that share a rank keep the order the host reported them in.
pub fn enumerate_serial() -> Vec<Endpoint> {
    let ports = match available_ports() {
        Ok(ports) => ports,
        Err(err) => {
            warn!(error = %err, "serial port enumeration failed");
            return Vec::new();
        }
    };

    let mut endpoints: Vec<Endpoint> = ports
        .into_iter()
        .map(|port| {
            let mut endpoint = Endpoint::serial(&port.port_name, serial_rank(&port.port_name));
            if let SerialPortType::UsbPort(usb) = port.port_type {
                endpoint = endpoint.with_serial_meta(SerialPortMeta {
                    manufacturer: usb.manufacturer,
                    product: usb.product,
                    serial_number: usb.serial_number,
                    vid: Some(usb.vid),
                    pid: Some(usb.pid),
                });
            }
            endpoint
        })
        .collect();

    endpoints.sort_by_key(|e| e.rank);
    debug!(count = endpoints.len(), "enumerated serial endpoints");
    endpoints
}
