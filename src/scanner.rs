use anyhow::Result;
use log::{debug, info, warn};
use thiserror::Error;

use crate::port::{self, SerialPort};
use crate::protocol::{make_protocol, Protocol, ProtocolVersion};
use crate::regs::{self, HubPort};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("no responding device (tried {tried} ports)")]
    DeviceNotFound { tried: usize },
    #[error("sensor {sensor} not found on any hub port")]
    SensorNotFound { sensor: u16 },
}

/// Probes `candidates` in order and returns the first port where the
/// recorder hub `id` answers a ping. Ports that fail to open or to
/// respond are skipped.
pub fn find_device(
    candidates: &[String],
    baudrate: u32,
    version: ProtocolVersion,
    id: u8,
    retries: usize,
    force: bool,
) -> Result<(Box<dyn SerialPort>, String)> {
    first_responding(candidates, |name| {
        let mut port = port::open_port(name, baudrate, force)?;
        make_protocol(version, port.as_mut(), retries).ping(id)?;
        Ok(port)
    })
}

fn first_responding<F>(candidates: &[String], mut probe: F) -> Result<(Box<dyn SerialPort>, String)>
where
    F: FnMut(&str) -> Result<Box<dyn SerialPort>>,
{
    for name in candidates {
        info!("trying port {}", name);
        match probe(name) {
            Ok(port) => {
                info!("device found on {}", name);
                return Ok((port, name.clone()));
            }
            Err(e) => debug!("no device on {}: {:#}", name, e),
        }
    }

    Err(ScanError::DeviceNotFound {
        tried: candidates.len(),
    }
    .into())
}

/// Reads each hub port's SNS_ID register and returns the first one
/// carrying `sensor`. Ports whose read fails are skipped with a warning.
pub fn find_sensor_port(
    proto: &mut dyn Protocol,
    id: u8,
    sensor: u16,
) -> Result<&'static HubPort> {
    for hub_port in regs::HUB_PORTS {
        let bytes = match proto.read(id, hub_port.sns_id, 2) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    "{} (reg {}) read failed: {:#}",
                    hub_port.name, hub_port.sns_id, e
                );
                continue;
            }
        };

        let found = u16::from_le_bytes(bytes[0..2].try_into().unwrap());
        debug!("{}: sensor id {}", hub_port.name, found);

        if found == sensor {
            info!("sensor {} found on {}", sensor, hub_port.name);
            return Ok(hub_port);
        }
    }

    Err(ScanError::SensorNotFound { sensor }.into())
}
