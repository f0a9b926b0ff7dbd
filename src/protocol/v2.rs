use super::{with_retries, Protocol, ProtocolError, ProtocolVersion, Result};
use crc::{Crc, CRC_16_UMTS};
use log::debug;
use serialport::SerialPort;

pub struct ProtocolV2<'a> {
    port: &'a mut dyn SerialPort,
    retries: usize,
}

impl<'a> ProtocolV2<'a> {
    pub fn new(port: &'a mut dyn SerialPort, retries: usize) -> Self {
        Self { port, retries }
    }
}

impl<'a> Protocol for ProtocolV2<'a> {
    fn ping(&mut self, id: u8) -> Result<()> {
        let port = &mut *self.port;
        with_retries(self.retries, move || ping_v2(&mut *port, id))
    }

    fn read(&mut self, id: u8, address: u16, count: u16) -> Result<Vec<u8>> {
        let port = &mut *self.port;
        with_retries(self.retries, move || {
            read_v2(&mut *port, id, address, count)
        })
    }

    fn write(&mut self, id: u8, address: u16, data: &[u8]) -> Result<()> {
        let port = &mut *self.port;
        with_retries(self.retries, move || write_v2(&mut *port, id, address, data))
    }

    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V2
    }
}

const OPCODE_PING: u8 = 1;
const OPCODE_READ: u8 = 2;
const OPCODE_WRITE: u8 = 3;

fn encode_instruction_v2(buffer: &mut [u8], id: u8, instruction: u8, params: &[u8]) -> usize {
    let length = (3 + params.len()) as u16;
    assert!(usize::from(length) <= buffer.len());

    buffer[0] = 0xFF;
    buffer[1] = 0xFF;
    buffer[2] = 0xFD;
    buffer[3] = 0x00;
    buffer[4] = id;
    buffer[5..7].copy_from_slice(&length.to_le_bytes());
    buffer[7] = instruction;

    buffer[8..(8 + params.len())].clone_from_slice(params);

    let crc = Crc::<u16>::new(&CRC_16_UMTS);
    let cs = crc.checksum(&buffer[0..(8 + params.len())]);

    buffer[8 + params.len()..10 + params.len()].clone_from_slice(&cs.to_le_bytes());
    10 + params.len()
}

fn decode_status_v2(buffer: &[u8], params: &mut [u8]) -> Result<usize> {
    if buffer.len() < 10 {
        return Err(ProtocolError::BadPacket.into());
    }

    let length = u16::from_le_bytes(buffer[5..7].try_into().unwrap());
    if length < 4 {
        return Err(ProtocolError::BadPacket.into());
    }
    let param_length: usize = length as usize - 4;

    if buffer.len() < (11 + param_length) || buffer[0..4] != [0xFF, 0xFF, 0xFD, 0x00] {
        return Err(ProtocolError::BadPacket.into());
    }

    let crc = Crc::<u16>::new(&CRC_16_UMTS);
    let cs = crc.checksum(&buffer[0..(9 + param_length)]);

    if buffer[9 + param_length..11 + param_length] != cs.to_le_bytes() {
        return Err(ProtocolError::BadPacket.into());
    }

    if buffer[8] != 0 {
        return Err(ProtocolError::StatusError(buffer[8]).into());
    }

    params[..param_length].copy_from_slice(&buffer[9..9 + param_length]);

    Ok(11 + param_length)
}

fn ping_v2(port: &mut dyn SerialPort, id: u8) -> Result<()> {
    let mut buffer = [0u8; 255];
    let mut params = [0u8; 255];

    let len_write = encode_instruction_v2(&mut buffer, id, OPCODE_PING, &[]);
    let len_read = 14;

    debug!("ping {}", id);
    debug!("send {:02X?}", &buffer[0..len_write]);
    port.write_all(&buffer[0..len_write])?;

    port.read_exact(&mut buffer[0..len_read])?;
    debug!("recv {:02X?}", &buffer[0..len_read]);

    decode_status_v2(&buffer, &mut params).map(|_| ())
}

fn read_v2(port: &mut dyn SerialPort, id: u8, address: u16, count: u16) -> Result<Vec<u8>> {
    let mut buffer = [0u8; 255];
    let mut params = [0u8; 255];

    let len_write = encode_instruction_v2(
        &mut buffer,
        id,
        OPCODE_READ,
        &[address.to_le_bytes(), count.to_le_bytes()].concat(),
    );

    debug!("read1 {} {} {}", id, address, count);
    debug!("send {:02X?}", &buffer[0..len_write]);
    port.write_all(&buffer[0..len_write])?;

    let len_read = (11 + count) as usize;
    port.read_exact(&mut buffer[0..len_read])?;
    debug!("recv {:02X?}", &buffer[0..len_read]);

    decode_status_v2(&buffer, &mut params).map(|_| params[0..count.into()].to_vec())
}

fn write_v2(port: &mut dyn SerialPort, id: u8, address: u16, data: &[u8]) -> Result<()> {
    let mut buffer = [0u8; 255];
    let mut params = [0u8; 255];

    params[0..2].clone_from_slice(&address.to_le_bytes());
    params[2..2 + data.len()].copy_from_slice(data);

    let len_write = encode_instruction_v2(&mut buffer, id, OPCODE_WRITE, &params[..2 + data.len()]);

    debug!("write1 {} {} {:02X?}", id, address, data);
    debug!("send {:02X?}", &buffer[0..len_write]);
    port.write_all(&buffer[0..len_write])?;

    let len_read = 11;

    port.read_exact(&mut buffer[0..len_read])?;
    debug!("recv {:02X?}", &buffer[0..len_read]);

    decode_status_v2(&buffer, &mut params).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::super::testutil::MockPort;
    use super::*;

    fn status_packet(id: u8, error: u8, params: &[u8]) -> Vec<u8> {
        let mut pkt = vec![0xFF, 0xFF, 0xFD, 0x00, id];
        pkt.extend_from_slice(&((4 + params.len()) as u16).to_le_bytes());
        pkt.push(0x55);
        pkt.push(error);
        pkt.extend_from_slice(params);

        let crc = Crc::<u16>::new(&CRC_16_UMTS);
        let cs = crc.checksum(&pkt);
        pkt.extend_from_slice(&cs.to_le_bytes());
        pkt
    }

    #[test]
    fn encode_ping_reference() {
        // reference packet from the protocol 2.0 documentation
        let reference: [u8; 10] = [0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x03, 0x00, 0x01, 0x19, 0x4E];
        let mut check = [0u8; 10];

        assert_eq!(
            encode_instruction_v2(&mut check, 1, OPCODE_PING, &[]),
            check.len()
        );

        assert_eq!(reference, check);
    }

    #[test]
    fn decode_status_reference() {
        // ping response of an XM430-W210 (model 1030, firmware 38)
        let reference: [u8; 14] = [
            0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x07, 0x00, 0x55, 0x00, 0x06, 0x04, 0x26, 0x65, 0x5D,
        ];
        let mut params = [0u8; 3];

        assert_eq!(
            decode_status_v2(&reference, &mut params).unwrap(),
            reference.len()
        );

        assert_eq!(params, [0x06, 0x04, 0x26]);
    }

    #[test]
    fn decode_status_bad_magic() {
        let mut pkt = status_packet(171, 0, &[]);
        pkt[2] = 0xFF;
        let mut params = [0u8; 8];

        let err = decode_status_v2(&pkt, &mut params).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::BadPacket)
        ));
    }

    #[test]
    fn decode_status_device_error() {
        let pkt = status_packet(171, 0x07, &[]);
        let mut params = [0u8; 8];

        let err = decode_status_v2(&pkt, &mut params).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProtocolError>(),
            Some(ProtocolError::StatusError(0x07))
        ));
    }

    #[test]
    fn read_sensor_id_over_port() {
        // hub 171 reporting sensor 46 on Port1
        let mut port = MockPort::new(&status_packet(171, 0, &[46, 0]));

        let bytes = ProtocolV2::new(&mut port, 0).read(171, 51, 2).unwrap();
        assert_eq!(bytes, [46, 0]);

        // read instruction: address 51, count 2
        assert_eq!(&port.tx[0..4], &[0xFF, 0xFF, 0xFD, 0x00]);
        assert_eq!(port.tx[4], 171);
        assert_eq!(port.tx[7], OPCODE_READ);
        assert_eq!(&port.tx[8..12], &[51, 0, 2, 0]);
    }

    #[test]
    fn write_retries_after_corrupt_status() {
        // first status is garbage, second one is good
        let mut rx = vec![0u8; 11];
        rx.extend_from_slice(&status_packet(171, 0, &[]));
        let mut port = MockPort::new(&rx);

        ProtocolV2::new(&mut port, 1).write(171, 24, &[1]).unwrap();

        // the instruction went out twice
        assert_eq!(port.tx.len(), 2 * 13);
    }

    #[test]
    fn write_fails_without_retries() {
        let mut rx = vec![0u8; 11];
        rx.extend_from_slice(&status_packet(171, 0, &[]));
        let mut port = MockPort::new(&rx);

        assert!(ProtocolV2::new(&mut port, 0).write(171, 24, &[1]).is_err());
    }
}
