//! Fixed-capacity wire packet
//!
//! One encoded frame in any encapsulation. Backed by a stack array so
//! encoding never allocates.

use std::fmt;

use crate::constants::{MAX_PACKET_SIZE, MBAP_HEADER_LEN};
use crate::error::{ModbusError, ModbusResult};

/// Raw bytes of one RTU, ASCII or TCP/UDP packet.
#[derive(Clone)]
pub struct Packet {
    /// Fixed-size buffer (stack)
    data: [u8; MAX_PACKET_SIZE],
    /// Actual data length
    len: usize,
}

impl Packet {
    /// Create an empty packet
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0; MAX_PACKET_SIZE],
            len: 0,
        }
    }

    /// Create a packet from a byte slice
    pub fn from_slice(data: &[u8]) -> ModbusResult<Self> {
        let mut packet = Self::new();
        packet.extend(data)?;
        Ok(packet)
    }

    /// Push a single byte
    #[inline]
    pub fn push(&mut self, byte: u8) -> ModbusResult<()> {
        if self.len >= MAX_PACKET_SIZE {
            return Err(ModbusError::BufferOverflow {
                needed: self.len + 1,
                capacity: MAX_PACKET_SIZE,
            });
        }
        self.data[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Push u16 in big-endian
    #[inline]
    pub fn push_u16(&mut self, value: u16) -> ModbusResult<()> {
        self.extend(&value.to_be_bytes())
    }

    /// Extend with a byte slice
    #[inline]
    pub fn extend(&mut self, data: &[u8]) -> ModbusResult<()> {
        if self.len + data.len() > MAX_PACKET_SIZE {
            return Err(ModbusError::BufferOverflow {
                needed: self.len + data.len(),
                capacity: MAX_PACKET_SIZE,
            });
        }
        self.data[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();
        Ok(())
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Overwrite the MBAP transaction id of a TCP/UDP packet in place.
    pub fn set_transaction_id(&mut self, transaction_id: u16) -> ModbusResult<()> {
        if self.len < MBAP_HEADER_LEN {
            return Err(ModbusError::frame(format!(
                "packet of {} bytes has no MBAP header",
                self.len
            )));
        }
        self.data[..2].copy_from_slice(&transaction_id.to_be_bytes());
        Ok(())
    }

    /// Space separated uppercase hex, as written to the traffic log.
    pub fn to_hex(&self) -> String {
        to_hex_string(self.as_slice())
    }
}

impl Default for Packet {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Packet {}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Packet[{}]", self.to_hex())
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// Format bytes as `01 03 00 0A` for logging.
pub fn to_hex_string(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<String>>()
        .join(" ")
}
