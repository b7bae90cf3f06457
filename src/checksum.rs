//! Frame checksums: CRC-16/MODBUS for RTU and LRC for ASCII.

use crc::{Crc, CRC_16_MODBUS};

/// Table-driven CRC-16/MODBUS (reflected, seed 0xFFFF)
const CRC_MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// CRC-16/MODBUS of `data`.
///
/// Appended to an RTU frame low byte first. Run over a whole frame
/// including its CRC the result is zero.
///
/// ```rust
/// use voltage_modbus_engine::checksum::crc16;
///
/// let crc = crc16(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]);
/// assert_eq!(crc.to_le_bytes(), [0x84, 0x0A]);
/// ```
#[inline]
pub fn crc16(data: &[u8]) -> u16 {
    CRC_MODBUS.checksum(data)
}

/// Longitudinal redundancy check: two's complement of the byte sum.
///
/// Run over a payload followed by its LRC the result is zero.
#[inline]
pub fn lrc(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |acc, &b| acc.wrapping_add(b))
        .wrapping_neg()
}
