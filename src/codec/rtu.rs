//! RTU encapsulation: body followed by CRC-16, low byte first.

use crate::checksum::crc16;
use crate::constants::MIN_RTU_PACKET_LEN;
use crate::error::{ModbusError, ModbusResult};
use crate::packet::Packet;

/// Append the CRC to a finished body.
pub(crate) fn wrap(body: &Packet) -> ModbusResult<Packet> {
    let mut packet = body.clone();
    let crc = crc16(body.as_slice());
    packet.extend(&crc.to_le_bytes())?;
    Ok(packet)
}

/// Check the CRC and return the body without it.
pub(crate) fn unwrap(packet: &[u8]) -> ModbusResult<&[u8]> {
    if packet.len() < MIN_RTU_PACKET_LEN {
        return Err(ModbusError::frame(format!(
            "RTU packet too short: {} bytes",
            packet.len()
        )));
    }
    if crc16(packet) != 0 {
        let (body, tail) = packet.split_at(packet.len() - 2);
        return Err(ModbusError::frame(format!(
            "RTU CRC mismatch: calculated 0x{:04X}, received 0x{:04X}",
            crc16(body),
            u16::from_le_bytes([tail[0], tail[1]])
        )));
    }
    Ok(&packet[..packet.len() - 2])
}

#[inline]
pub(crate) fn is_valid(packet: &[u8]) -> bool {
    packet.len() >= MIN_RTU_PACKET_LEN && crc16(packet) == 0
}
