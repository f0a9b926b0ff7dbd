use std::cmp;
use std::fmt::Display;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use log::{debug, info, warn};
use thiserror::Error;

use crate::protocol::Protocol;
use crate::regs;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("cycle count {cycles} exceeds the {max} data slots of the hub")]
    TooManyCycles { cycles: u16, max: u16 },
}

/// One sampling step: the low and high halves of a sample slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementPair(pub u16, pub u16);

impl From<u32> for MeasurementPair {
    fn from(raw: u32) -> Self {
        MeasurementPair((raw & 0xFFFF) as u16, (raw >> 16) as u16)
    }
}

impl Display for MeasurementPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:>6}, {:>6}", self.0, self.1)
    }
}

/// Measurement lifecycle against a confirmed hub. Strictly sequential:
/// select range, warm up, start, sample, stop, reset.
pub struct Session<'a> {
    proto: &'a mut dyn Protocol,
    id: u8,
}

const WARMUP_STEP: Duration = Duration::from_secs(9);

impl<'a> Session<'a> {
    pub fn new(proto: &'a mut dyn Protocol, id: u8) -> Self {
        Session { proto, id }
    }

    pub fn select_range(&mut self, hub_port: &regs::HubPort, range: u16) -> Result<()> {
        info!(
            "selecting range {:#06b} on {} (reg {})",
            range, hub_port.name, hub_port.sel_range
        );
        self.proto
            .write(self.id, hub_port.sel_range, &range.to_le_bytes())
    }

    /// Lets the sensor heat up, pinging the hub periodically to keep the
    /// bus alive. Ping failures during warm-up are not fatal.
    pub fn warm_up(&mut self, total: Duration) {
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            let step = cmp::min(WARMUP_STEP, total - elapsed);
            thread::sleep(step);
            elapsed += step;

            if let Err(e) = self.proto.ping(self.id) {
                warn!("warm-up ping failed: {:#}", e);
            }
            info!("warming up, {}s elapsed", elapsed.as_secs());
        }
    }

    pub fn start(&mut self) -> Result<()> {
        info!("starting measurement");
        self.proto.write(self.id, regs::MEAS_START_STOP, &[1])
    }

    /// Collects `cycles` measurement pairs, one sample slot per cycle,
    /// sleeping `interval` before each read.
    pub fn sample(&mut self, cycles: u16, interval: Duration) -> Result<Vec<MeasurementPair>> {
        if cycles > regs::MAX_SAMPLE_SLOTS {
            return Err(SessionError::TooManyCycles {
                cycles,
                max: regs::MAX_SAMPLE_SLOTS,
            }
            .into());
        }

        let mut pairs = Vec::with_capacity(cycles.into());
        for slot in 0..cycles {
            // in range, checked above
            let address = regs::data_address(slot).unwrap();
            thread::sleep(interval);

            let bytes = self.proto.read(self.id, address, 4)?;
            let raw = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
            let pair = MeasurementPair::from(raw);

            debug!("slot {} (reg {}): {:#010X} -> {}", slot, address, raw, pair);
            pairs.push(pair);
        }

        Ok(pairs)
    }

    pub fn stop(&mut self) -> Result<()> {
        info!("stopping measurement");
        self.proto.write(self.id, regs::MEAS_START_STOP, &[0])
    }

    pub fn reset(&mut self) -> Result<()> {
        info!("resetting recorder");
        self.proto.write(self.id, regs::RESET_CMD, &[1])
    }
}
