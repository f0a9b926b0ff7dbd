#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
use linux::is_port_open;
#[cfg(target_os = "macos")]
use macos::is_port_open;
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn is_port_open(_port_name: &str) -> bool {
    false
}

pub use serialport::SerialPort;

use anyhow::Result;
use core::time::Duration;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serialport::SerialPortType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenPortError {
    #[error("no usb serial ports found")]
    NoCandidatePorts,
    #[error("{port_name:?} busy")]
    PortBusy { port_name: String },
}

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

fn is_candidate_name(name: &str) -> bool {
    lazy_static! {
        static ref USB_SERIAL: Regex =
            Regex::new(r"^/dev/(cu\.usbserial.*|ttyUSB\d+|ttyACM\d+)$").unwrap();
    }
    USB_SERIAL.is_match(name)
}

/// Names of serial devices worth probing for the recorder, sorted for a
/// deterministic scan order. Enumerated fresh on every call.
pub fn candidate_ports() -> Result<Vec<String>> {
    let mut names: Vec<String> = serialport::available_ports()?
        .into_iter()
        .filter(|info| match &info.port_type {
            SerialPortType::UsbPort(_) => true,
            SerialPortType::Unknown => is_candidate_name(&info.port_name),
            SerialPortType::PciPort | SerialPortType::BluetoothPort => false,
        })
        .map(|info| info.port_name)
        .collect();

    names.sort();

    if names.is_empty() {
        return Err(OpenPortError::NoCandidatePorts.into());
    }
    Ok(names)
}

pub fn open_port(port_name: &str, baudrate: u32, force: bool) -> Result<Box<dyn SerialPort>> {
    if !force && is_port_open(port_name) {
        return Err(OpenPortError::PortBusy {
            port_name: port_name.to_string(),
        }
        .into());
    }

    let mut port = serialport::new(port_name, baudrate).open()?;
    port.set_timeout(DEFAULT_TIMEOUT)?;

    debug!("open_port OK: {} @ {} baud", port_name, baudrate);
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_names() {
        assert!(is_candidate_name("/dev/cu.usbserial-0001"));
        assert!(is_candidate_name("/dev/ttyUSB0"));
        assert!(is_candidate_name("/dev/ttyACM3"));
        assert!(!is_candidate_name("/dev/ttyS0"));
        assert!(!is_candidate_name("/dev/cu.Bluetooth-Incoming-Port"));
    }
}
