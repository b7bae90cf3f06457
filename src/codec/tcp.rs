//! TCP/UDP encapsulation: MBAP header then the body, no checksum.

use crate::constants::{MBAP_HEADER_LEN, MIN_TCP_PACKET_LEN};
use crate::error::{ModbusError, ModbusResult};
use crate::packet::Packet;

/// Protocol identifier of Modbus in the MBAP header
const MODBUS_PROTOCOL_ID: u16 = 0x0000;

/// Prefix a body with the MBAP header.
pub(crate) fn wrap(body: &Packet, transaction_id: u16) -> ModbusResult<Packet> {
    let mut packet = Packet::new();
    packet.push_u16(transaction_id)?;
    packet.push_u16(MODBUS_PROTOCOL_ID)?;
    packet.push_u16(body.len() as u16)?;
    packet.extend(body.as_slice())?;
    Ok(packet)
}

/// Check the MBAP length and split off the transaction id.
pub(crate) fn unwrap(packet: &[u8]) -> ModbusResult<(u16, &[u8])> {
    if packet.len() < MIN_TCP_PACKET_LEN {
        return Err(ModbusError::frame(format!(
            "MBAP packet too short: {} bytes",
            packet.len()
        )));
    }
    let declared = usize::from(u16::from_be_bytes([packet[4], packet[5]]));
    let actual = packet.len() - MBAP_HEADER_LEN;
    if declared != actual {
        return Err(ModbusError::frame(format!(
            "MBAP length mismatch: declared {}, actual {}",
            declared, actual
        )));
    }
    let transaction_id = u16::from_be_bytes([packet[0], packet[1]]);
    Ok((transaction_id, &packet[MBAP_HEADER_LEN..]))
}

#[inline]
pub(crate) fn is_valid(packet: &[u8]) -> bool {
    packet.len() >= MIN_TCP_PACKET_LEN
        && usize::from(u16::from_be_bytes([packet[4], packet[5]])) == packet.len() - MBAP_HEADER_LEN
}
