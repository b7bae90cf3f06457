//! ASCII encapsulation: `:` + uppercase hex of (body + LRC) + CR LF.

use crate::checksum::lrc;
use crate::constants::{ASCII_END, ASCII_START, MIN_ASCII_PAYLOAD_LEN};
use crate::error::{ModbusError, ModbusResult};
use crate::packet::Packet;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Convert a byte to two uppercase hex characters
#[inline]
fn byte_to_hex(byte: u8) -> [u8; 2] {
    [
        HEX_DIGITS[usize::from(byte >> 4)],
        HEX_DIGITS[usize::from(byte & 0x0F)],
    ]
}

/// Value of one hex character, lowercase accepted
#[inline]
fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

/// Hex-encode a body and its LRC between the start marker and CR LF.
pub(crate) fn wrap(body: &Packet) -> ModbusResult<Packet> {
    let mut packet = Packet::new();
    packet.push(ASCII_START)?;
    for &byte in body.as_slice() {
        packet.extend(&byte_to_hex(byte))?;
    }
    packet.extend(&byte_to_hex(lrc(body.as_slice())))?;
    packet.extend(&ASCII_END)?;
    Ok(packet)
}

/// Decode the hex payload, including the LRC byte.
fn decode_payload(packet: &[u8]) -> ModbusResult<Packet> {
    if packet.first() != Some(&ASCII_START) {
        return Err(ModbusError::frame("ASCII packet missing ':' start marker"));
    }
    if !packet.ends_with(&ASCII_END) {
        return Err(ModbusError::frame("ASCII packet missing CR LF terminator"));
    }
    let hex = &packet[1..packet.len() - ASCII_END.len()];
    if hex.len() % 2 != 0 {
        return Err(ModbusError::frame(format!(
            "odd ASCII hex digit count {}",
            hex.len()
        )));
    }

    let mut payload = Packet::new();
    for pair in hex.chunks_exact(2) {
        match (hex_value(pair[0]), hex_value(pair[1])) {
            (Some(hi), Some(lo)) => payload.push(hi << 4 | lo)?,
            _ => {
                return Err(ModbusError::frame(format!(
                    "invalid ASCII hex pair {:?}",
                    String::from_utf8_lossy(pair)
                )))
            }
        }
    }
    if payload.len() < MIN_ASCII_PAYLOAD_LEN {
        return Err(ModbusError::frame(format!(
            "ASCII payload too short: {} bytes",
            payload.len()
        )));
    }
    Ok(payload)
}

/// Check framing and LRC, return the body without the LRC.
pub(crate) fn unwrap(packet: &[u8]) -> ModbusResult<Packet> {
    let payload = decode_payload(packet)?;
    if lrc(payload.as_slice()) != 0 {
        return Err(ModbusError::frame(format!(
            "ASCII LRC mismatch: payload {}",
            payload.to_hex()
        )));
    }
    Packet::from_slice(&payload.as_slice()[..payload.len() - 1])
}

pub(crate) fn is_valid(packet: &[u8]) -> bool {
    decode_payload(packet)
        .map(|payload| lrc(payload.as_slice()) == 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_known_packet() {
        let body = Packet::from_slice(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]).unwrap();
        let packet = wrap(&body).unwrap();
        assert_eq!(packet.as_slice(), b":010300000001FB\r\n");
        assert!(is_valid(packet.as_slice()));
        assert_eq!(unwrap(packet.as_slice()).unwrap(), body);
    }

    #[test]
    fn test_lowercase_hex_accepted() {
        assert!(is_valid(b":010300000001fb\r\n"));
    }

    #[test]
    fn test_invalid_packets() {
        // missing start marker
        assert!(!is_valid(b"010300000001FB\r\n"));
        // missing terminator
        assert!(!is_valid(b":010300000001FB"));
        // odd digit count
        assert!(!is_valid(b":010300000001F\r\n"));
        // non-hex
        assert!(!is_valid(b":01030000000GFB\r\n"));
        // bad LRC
        assert!(!is_valid(b":010300000001FC\r\n"));
        // too short
        assert!(!is_valid(b":0101\r\n"));
    }
}
