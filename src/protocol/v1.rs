use super::{with_retries, Protocol, ProtocolError, ProtocolVersion, Result};
use log::debug;
use serialport::SerialPort;

pub struct ProtocolV1<'a> {
    port: &'a mut dyn SerialPort,
    retries: usize,
}

impl<'a> ProtocolV1<'a> {
    pub fn new(port: &'a mut dyn SerialPort, retries: usize) -> Self {
        Self { port, retries }
    }
}

impl<'a> Protocol for ProtocolV1<'a> {
    fn ping(&mut self, id: u8) -> Result<()> {
        let port = &mut *self.port;
        with_retries(self.retries, move || ping_v1(&mut *port, id))
    }

    fn read(&mut self, id: u8, address: u16, count: u16) -> Result<Vec<u8>> {
        if address > 0xFE {
            return Err(ProtocolError::InvalidAddress.into());
        }

        if count > 0xFF {
            return Err(ProtocolError::InvalidCount.into());
        }

        let port = &mut *self.port;
        with_retries(self.retries, move || {
            read_v1(&mut *port, id, address as u8, count as u8)
        })
    }

    fn write(&mut self, id: u8, address: u16, data: &[u8]) -> Result<()> {
        if address > 0xFF {
            return Err(ProtocolError::InvalidAddress.into());
        }

        let port = &mut *self.port;
        with_retries(self.retries, move || {
            write_v1(&mut *port, id, address as u8, data)
        })
    }

    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V1
    }
}

const OPCODE_PING: u8 = 1;
const OPCODE_READ: u8 = 2;
const OPCODE_WRITE: u8 = 3;

fn encode_instruction_v1(buffer: &mut [u8], id: u8, instruction: u8, params: &[u8]) -> usize {
    let length: u8 = (2 + params.len()) as u8;
    assert!(usize::from(length) <= buffer.len());

    buffer[0] = 0xFF;
    buffer[1] = 0xFF;
    buffer[2] = id;
    buffer[3] = length;
    buffer[4] = instruction;

    buffer[5..(params.len() + 5)].clone_from_slice(params);

    buffer[5 + params.len()] = !buffer[2..5 + params.len()]
        .iter()
        .cloned()
        .fold(0u8, |x, y| x.overflowing_add(y).0);
    6 + params.len()
}

fn decode_status_v1(buffer: &[u8], params: &mut [u8]) -> Result<usize> {
    if buffer.len() < 6 || buffer[3] < 2 {
        return Err(ProtocolError::BadPacket.into());
    }

    let param_length: usize = (buffer[3] - 2).into();
    if buffer.len() < (6 + param_length) || buffer[0..2] != [0xFF, 0xFF] {
        return Err(ProtocolError::BadPacket.into());
    }

    let csum = buffer[2..5 + param_length]
        .iter()
        .cloned()
        .fold(0u8, |x, y| x.overflowing_add(y).0);

    if csum != !buffer[5 + param_length] {
        return Err(ProtocolError::BadPacket.into());
    }

    if buffer[4] != 0 {
        return Err(ProtocolError::StatusError(buffer[4]).into());
    }

    params[..param_length].copy_from_slice(&buffer[5..5 + param_length]);

    Ok(6 + param_length)
}

fn ping_v1(port: &mut dyn SerialPort, id: u8) -> Result<()> {
    let mut buffer = [0u8; 255];
    let mut params = [0u8; 255];

    let len_write = encode_instruction_v1(&mut buffer, id, OPCODE_PING, &[]);
    let len_read = 6;

    debug!("ping {}", id);
    debug!("send {:02X?}", &buffer[0..len_write]);
    port.write_all(&buffer[0..len_write])?;

    port.read_exact(&mut buffer[0..len_read])?;
    debug!("recv {:02X?}", &buffer[0..len_read]);

    decode_status_v1(&buffer, &mut params).map(|_| ())
}

fn read_v1(port: &mut dyn SerialPort, id: u8, address: u8, count: u8) -> Result<Vec<u8>> {
    let mut buffer = [0u8; 255];
    let mut params = [0u8; 255];

    let len_write = encode_instruction_v1(&mut buffer, id, OPCODE_READ, &[address, count]);

    debug!("read1 {} {} {}", id, address, count);
    debug!("send {:02X?}", &buffer[0..len_write]);
    port.write_all(&buffer[0..len_write])?;

    let len_read = (6 + count) as usize;
    port.read_exact(&mut buffer[0..len_read])?;
    debug!("recv {:02X?}", &buffer[0..len_read]);

    decode_status_v1(&buffer, &mut params).map(|_| params[0..count.into()].to_vec())
}

fn write_v1(port: &mut dyn SerialPort, id: u8, address: u8, data: &[u8]) -> Result<()> {
    let mut buffer = [0u8; 255];
    let mut params = [0u8; 255];

    params[0] = address;
    params[1..data.len() + 1].copy_from_slice(data);

    let len_write = encode_instruction_v1(&mut buffer, id, OPCODE_WRITE, &params[..data.len() + 1]);

    debug!("write1 {} {} {:02X?}", id, address, data);
    debug!("send {:02X?}", &buffer[0..len_write]);
    port.write_all(&buffer[0..len_write])?;

    let len_read = 6;

    port.read_exact(&mut buffer[0..len_read])?;
    debug!("recv {:02X?}", &buffer[0..len_read]);

    decode_status_v1(&buffer, &mut params).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::super::testutil::MockPort;
    use super::*;

    #[test]
    fn encode_ping() {
        let reference: [u8; 6] = [0xFF, 0xFF, 0xAB, 0x02, 0x01, 0x51];
        let mut check = [0u8; 6];

        assert_eq!(
            encode_instruction_v1(&mut check, 171, OPCODE_PING, &[]),
            check.len()
        );

        assert_eq!(reference, check);
    }

    #[test]
    fn encode_read_sensor_id() {
        // read 2 bytes from Port1 SNS_ID (51) of hub 171
        let reference: [u8; 8] = [0xFF, 0xFF, 0xAB, 0x04, 0x02, 0x33, 0x02, 0x19];
        let mut check = [0u8; 8];

        assert_eq!(
            encode_instruction_v1(&mut check, 171, OPCODE_READ, &[51, 2]),
            check.len()
        );

        assert_eq!(reference, check);
    }

    #[test]
    fn decode_status_ok() {
        let reference: [u8; 6] = [0xFF, 0xFF, 0xAB, 0x02, 0x00, 0x52];
        let mut params: [u8; 0] = [];

        assert_eq!(
            decode_status_v1(&reference, &mut params).unwrap(),
            reference.len()
        );
    }

    #[test]
    fn decode_status_with_params() {
        // 2500 little endian
        let reference: [u8; 8] = [0xFF, 0xFF, 0xAB, 0x04, 0x00, 0xC4, 0x09, 0x83];
        let mut params = [0u8; 2];

        assert_eq!(
            decode_status_v1(&reference, &mut params).unwrap(),
            reference.len()
        );

        assert_eq!(params, [0xC4, 0x09]);
    }

    #[test]
    fn decode_status_device_error() {
        let reference: [u8; 6] = [0xFF, 0xFF, 0xAB, 0x02, 0x04, 0x4E];
        let mut params: [u8; 0] = [];

        let err = decode_status_v1(&reference, &mut params).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::StatusError(4))
        ));
    }

    #[test]
    fn decode_status_bad_checksum() {
        let reference: [u8; 6] = [0xFF, 0xFF, 0xAB, 0x02, 0x00, 0x00];
        let mut params: [u8; 0] = [];

        let err = decode_status_v1(&reference, &mut params).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::BadPacket)
        ));
    }

    #[test]
    fn ping_over_port() {
        let mut port = MockPort::new(&[0xFF, 0xFF, 0xAB, 0x02, 0x00, 0x52]);

        ProtocolV1::new(&mut port, 0).ping(171).unwrap();
        assert_eq!(port.tx, [0xFF, 0xFF, 0xAB, 0x02, 0x01, 0x51]);
    }

    #[test]
    fn read_rejects_wide_address() {
        let mut port = MockPort::new(&[]);

        let err = ProtocolV1::new(&mut port, 0).read(171, 0x100, 2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::InvalidAddress)
        ));
        assert!(port.tx.is_empty());
    }
}
