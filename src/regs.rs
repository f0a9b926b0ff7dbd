//! Control table of the recorder hub.

/// Write 1 to reset the recorder.
pub const RESET_CMD: u16 = 23;
/// Write 1 to start measuring, 0 to stop.
pub const MEAS_START_STOP: u16 = 24;
pub const TEMP_PORT_ID: u16 = 25;

pub const SENSORS_STATUS: u16 = 83;
/// First of the u32 sample slots, laid out back to back.
pub const SENSORS_DATA_FIRST: u16 = 85;
pub const SENSORS_DATA_LAST: u16 = 124;

/// A physical sensor socket on the hub. `sns_id` holds the identifier of
/// the attached sensor, `sel_range` selects its measurement range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubPort {
    pub name: &'static str,
    pub sns_id: u16,
    pub sel_range: u16,
}

impl HubPort {
    const fn new(name: &'static str, sns_id: u16, sel_range: u16) -> Self {
        HubPort {
            name,
            sns_id,
            sel_range,
        }
    }
}

pub static HUB_PORTS: &[HubPort] = &[
    HubPort::new("Port1", 51, 53),
    HubPort::new("Port2", 55, 57),
    HubPort::new("Port3", 59, 61),
    HubPort::new("Port4", 63, 65),
    HubPort::new("Port1S", 67, 69),
    HubPort::new("Port2S", 71, 73),
    HubPort::new("Port3S", 75, 77),
    HubPort::new("Port4S", 79, 81),
];

/// How many u32 sample slots fit between `SENSORS_DATA_FIRST` and
/// `SENSORS_DATA_LAST`.
pub const MAX_SAMPLE_SLOTS: u16 = (SENSORS_DATA_LAST + 1 - SENSORS_DATA_FIRST) / 4;

/// Address of sample slot `slot`, or `None` if it would reach past
/// `SENSORS_DATA_LAST`.
pub fn data_address(slot: u16) -> Option<u16> {
    let address = SENSORS_DATA_FIRST.checked_add(slot.checked_mul(4)?)?;
    if address + 3 <= SENSORS_DATA_LAST {
        Some(address)
    } else {
        None
    }
}
