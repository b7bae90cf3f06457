//! # Frame Model
//!
//! Protocol-neutral view of one Modbus transaction, shared by every codec
//! and both session roles.
//!
//! ## Value layout
//!
//! The value buffer is tagged with its packing:
//! - [`ValueLayout::Words`]: big-endian 16-bit registers (FC03/04/06/10,
//!   FC05 wire value, exception code)
//! - [`ValueLayout::Bits`]: bit `i` of byte `i / 8` is coil `i`
//!   (FC01/02/0F)
//!
//! Word accessors fail on a bit buffer and bit accessors fail on a word
//! buffer, so the two packings never mix inside one frame.

use std::fmt;

use crate::constants::*;
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::{is_exception_function, ModbusFunction, UnitId};

// ============================================================================
// Value Buffer
// ============================================================================

/// Packing of a frame's value bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueLayout {
    Words,
    Bits,
}

impl ValueLayout {
    /// Layout the values of `function` travel in.
    #[inline]
    pub fn for_function(function: u8) -> Self {
        match function {
            FC_READ_COILS | FC_READ_DISCRETE_INPUTS | FC_WRITE_MULTIPLE_COILS => Self::Bits,
            _ => Self::Words,
        }
    }
}

/// Fixed 246-byte value storage of a frame.
#[derive(Clone)]
pub struct ValueBuffer {
    layout: ValueLayout,
    bytes: [u8; MAX_FRAME_VALUE_BYTES],
    /// Number of meaningful bytes
    len: usize,
}

impl ValueBuffer {
    #[inline]
    pub fn new(layout: ValueLayout) -> Self {
        Self {
            layout,
            bytes: [0; MAX_FRAME_VALUE_BYTES],
            len: 0,
        }
    }

    /// Build a word buffer from register values.
    pub fn from_words(words: &[u16]) -> ModbusResult<Self> {
        if words.len() > MAX_FRAME_REGISTERS {
            return Err(ModbusError::invalid_data(format!(
                "{} registers exceed frame capacity of {}",
                words.len(),
                MAX_FRAME_REGISTERS
            )));
        }
        let mut buf = Self::new(ValueLayout::Words);
        for (i, &word) in words.iter().enumerate() {
            buf.bytes[i * 2..i * 2 + 2].copy_from_slice(&word.to_be_bytes());
        }
        buf.len = words.len() * 2;
        Ok(buf)
    }

    /// Build a bit buffer from coil states.
    pub fn from_bits(bits: &[bool]) -> ModbusResult<Self> {
        if bits.len() > MAX_FRAME_COILS {
            return Err(ModbusError::invalid_data(format!(
                "{} coils exceed frame capacity of {}",
                bits.len(),
                MAX_FRAME_COILS
            )));
        }
        let mut buf = Self::new(ValueLayout::Bits);
        for (i, &on) in bits.iter().enumerate() {
            if on {
                buf.bytes[i / 8] |= 1 << (i % 8);
            }
        }
        buf.len = bits.len().div_ceil(8);
        Ok(buf)
    }

    /// Build a buffer from packed wire bytes.
    pub fn from_raw(layout: ValueLayout, raw: &[u8]) -> ModbusResult<Self> {
        if raw.len() > MAX_FRAME_VALUE_BYTES {
            return Err(ModbusError::BufferOverflow {
                needed: raw.len(),
                capacity: MAX_FRAME_VALUE_BYTES,
            });
        }
        let mut buf = Self::new(layout);
        buf.bytes[..raw.len()].copy_from_slice(raw);
        buf.len = raw.len();
        Ok(buf)
    }

    #[inline]
    pub fn layout(&self) -> ValueLayout {
        self.layout
    }

    /// Meaningful bytes, as they travel on the wire.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of complete registers held.
    #[inline]
    pub fn word_count(&self) -> usize {
        self.len / 2
    }

    fn expect_layout(&self, layout: ValueLayout) -> ModbusResult<()> {
        if self.layout != layout {
            return Err(ModbusError::protocol(format!(
                "{:?} accessor used on a {:?} value buffer",
                layout, self.layout
            )));
        }
        Ok(())
    }

    /// Register `index`.
    pub fn word(&self, index: usize) -> ModbusResult<u16> {
        self.expect_layout(ValueLayout::Words)?;
        if index >= self.word_count() {
            return Err(ModbusError::invalid_data(format!(
                "register index {} out of range ({} held)",
                index,
                self.word_count()
            )));
        }
        Ok(u16::from_be_bytes([
            self.bytes[index * 2],
            self.bytes[index * 2 + 1],
        ]))
    }

    pub fn set_word(&mut self, index: usize, value: u16) -> ModbusResult<()> {
        self.expect_layout(ValueLayout::Words)?;
        if index >= MAX_FRAME_REGISTERS {
            return Err(ModbusError::invalid_data(format!(
                "register index {} exceeds frame capacity",
                index
            )));
        }
        self.bytes[index * 2..index * 2 + 2].copy_from_slice(&value.to_be_bytes());
        self.len = self.len.max(index * 2 + 2);
        Ok(())
    }

    /// Coil `index`.
    pub fn bit(&self, index: usize) -> ModbusResult<bool> {
        self.expect_layout(ValueLayout::Bits)?;
        if index / 8 >= self.len {
            return Err(ModbusError::invalid_data(format!(
                "coil index {} out of range ({} bytes held)",
                index, self.len
            )));
        }
        Ok(self.bytes[index / 8] & (1 << (index % 8)) != 0)
    }

    pub fn set_bit(&mut self, index: usize, on: bool) -> ModbusResult<()> {
        self.expect_layout(ValueLayout::Bits)?;
        if index >= MAX_FRAME_COILS {
            return Err(ModbusError::invalid_data(format!(
                "coil index {} exceeds frame capacity",
                index
            )));
        }
        if on {
            self.bytes[index / 8] |= 1 << (index % 8);
        } else {
            self.bytes[index / 8] &= !(1 << (index % 8));
        }
        self.len = self.len.max(index / 8 + 1);
        Ok(())
    }

    /// Iterate the held registers.
    pub fn words(&self) -> ModbusResult<impl Iterator<Item = u16> + '_> {
        self.expect_layout(ValueLayout::Words)?;
        Ok(self
            .as_bytes()
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]])))
    }
}

impl PartialEq for ValueBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.layout == other.layout && self.as_bytes() == other.as_bytes()
    }
}

impl Eq for ValueBuffer {}

impl fmt::Debug for ValueBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{:02X?}", self.layout, self.as_bytes())
    }
}

// ============================================================================
// Frame
// ============================================================================

/// One request or response, independent of its encapsulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// MBAP transaction id, meaningful for TCP/UDP only
    pub transaction_id: u16,
    pub unit_id: UnitId,
    /// Raw function byte, `| 0x80` on exception replies
    pub function: u8,
    pub start_address: u16,
    pub quantity: u16,
    pub values: ValueBuffer,
}

impl Frame {
    /// Empty frame for `function`, with the matching value layout.
    pub fn new(unit_id: UnitId, function: u8, start_address: u16, quantity: u16) -> Self {
        Self {
            transaction_id: 0,
            unit_id,
            function,
            start_address,
            quantity,
            values: ValueBuffer::new(ValueLayout::for_function(function)),
        }
    }

    /// FC01-04 request.
    pub fn read_request(
        unit_id: UnitId,
        function: ModbusFunction,
        start_address: u16,
        quantity: u16,
    ) -> ModbusResult<Self> {
        if !function.is_read_function() {
            return Err(ModbusError::invalid_function(function.to_u8()));
        }
        Ok(Self::new(unit_id, function.to_u8(), start_address, quantity))
    }

    /// FC05 request; `on` travels as 0xFF00.
    pub fn write_single_coil(unit_id: UnitId, address: u16, on: bool) -> Self {
        let mut frame = Self::new(unit_id, FC_WRITE_SINGLE_COIL, address, 1);
        frame.values = single_word(if on { COIL_ON } else { COIL_OFF });
        frame
    }

    /// FC06 request.
    pub fn write_single_register(unit_id: UnitId, address: u16, value: u16) -> Self {
        let mut frame = Self::new(unit_id, FC_WRITE_SINGLE_REGISTER, address, 1);
        frame.values = single_word(value);
        frame
    }

    /// FC0F request.
    pub fn write_multiple_coils(
        unit_id: UnitId,
        start_address: u16,
        coils: &[bool],
    ) -> ModbusResult<Self> {
        if coils.is_empty() {
            return Err(ModbusError::invalid_data("Invalid quantity: no coils"));
        }
        let mut frame = Self::new(
            unit_id,
            FC_WRITE_MULTIPLE_COILS,
            start_address,
            coils.len() as u16,
        );
        frame.values = ValueBuffer::from_bits(coils)?;
        Ok(frame)
    }

    /// FC10 request.
    pub fn write_multiple_registers(
        unit_id: UnitId,
        start_address: u16,
        registers: &[u16],
    ) -> ModbusResult<Self> {
        if registers.is_empty() {
            return Err(ModbusError::invalid_data("Invalid quantity: no registers"));
        }
        let mut frame = Self::new(
            unit_id,
            FC_WRITE_MULTIPLE_REGISTERS,
            start_address,
            registers.len() as u16,
        );
        frame.values = ValueBuffer::from_words(registers)?;
        Ok(frame)
    }

    /// Exception reply to a request with function `function`.
    pub fn exception(unit_id: UnitId, function: u8, code: u8) -> Self {
        let mut frame = Self::new(unit_id, function | EXCEPTION_FLAG, 0, 0);
        frame.values = single_word(u16::from(code));
        frame
    }

    #[inline]
    pub fn with_transaction_id(mut self, transaction_id: u16) -> Self {
        self.transaction_id = transaction_id;
        self
    }

    #[inline]
    pub fn is_exception(&self) -> bool {
        is_exception_function(self.function)
    }

    /// Exception code of an exception reply.
    pub fn exception_code(&self) -> Option<u8> {
        if !self.is_exception() {
            return None;
        }
        self.values.word(0).ok().map(|w| (w & 0xFF) as u8)
    }

    /// Function byte with the exception flag stripped.
    #[inline]
    pub fn base_function(&self) -> u8 {
        self.function & !EXCEPTION_FLAG
    }

    /// Typed function code, error for exceptions and unknown codes.
    pub fn function_code(&self) -> ModbusResult<ModbusFunction> {
        ModbusFunction::from_u8(self.function)
    }

    /// Last address covered, `None` when the range wraps past 0xFFFF.
    pub fn end_address(&self) -> Option<u16> {
        let span = self.quantity.max(1) - 1;
        self.start_address.checked_add(span)
    }
}

fn single_word(value: u16) -> ValueBuffer {
    let mut buf = ValueBuffer::new(ValueLayout::Words);
    buf.bytes[..2].copy_from_slice(&value.to_be_bytes());
    buf.len = 2;
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_accessors() {
        let mut values = ValueBuffer::new(ValueLayout::Words);
        values.set_word(0, 0x1234).unwrap();
        values.set_word(2, 0xABCD).unwrap();

        assert_eq!(values.word_count(), 3);
        assert_eq!(values.word(0).unwrap(), 0x1234);
        assert_eq!(values.word(1).unwrap(), 0);
        assert_eq!(values.word(2).unwrap(), 0xABCD);
        assert!(values.word(3).is_err());
        assert_eq!(values.as_bytes(), &[0x12, 0x34, 0x00, 0x00, 0xAB, 0xCD]);
    }

    #[test]
    fn test_bit_accessors() {
        let values = ValueBuffer::from_bits(&[true, false, true, true, false, false, false, false, true])
            .unwrap();
        assert_eq!(values.as_bytes(), &[0b0000_1101, 0b0000_0001]);
        assert!(values.bit(0).unwrap());
        assert!(!values.bit(1).unwrap());
        assert!(values.bit(8).unwrap());
        assert!(values.bit(16).is_err());
    }

    #[test]
    fn test_layouts_do_not_mix() {
        let mut bits = ValueBuffer::new(ValueLayout::Bits);
        assert!(matches!(
            bits.set_word(0, 1),
            Err(ModbusError::Protocol { .. })
        ));
        let words = ValueBuffer::from_words(&[1, 2]).unwrap();
        assert!(words.bit(0).is_err());
    }

    #[test]
    fn test_capacity_limits() {
        assert!(ValueBuffer::from_words(&[0u16; MAX_FRAME_REGISTERS]).is_ok());
        assert!(ValueBuffer::from_words(&[0u16; MAX_FRAME_REGISTERS + 1]).is_err());
        assert!(ValueBuffer::from_bits(&vec![true; MAX_FRAME_COILS + 1]).is_err());

        let mut words = ValueBuffer::new(ValueLayout::Words);
        assert!(words.set_word(MAX_FRAME_REGISTERS, 1).is_err());
    }

    #[test]
    fn test_write_single_coil_wire_value() {
        let on = Frame::write_single_coil(1, 0x00AC, true);
        assert_eq!(on.values.word(0).unwrap(), 0xFF00);
        assert_eq!(on.quantity, 1);

        let off = Frame::write_single_coil(1, 0x00AC, false);
        assert_eq!(off.values.word(0).unwrap(), 0x0000);
    }

    #[test]
    fn test_multiple_writes() {
        let frame = Frame::write_multiple_registers(1, 10, &[1, 2, 3]).unwrap();
        assert_eq!(frame.quantity, 3);
        assert_eq!(frame.values.layout(), ValueLayout::Words);

        let frame = Frame::write_multiple_coils(1, 10, &[true; 10]).unwrap();
        assert_eq!(frame.quantity, 10);
        assert_eq!(frame.values.layout(), ValueLayout::Bits);
        assert_eq!(frame.values.byte_len(), 2);

        assert!(Frame::write_multiple_registers(1, 0, &[]).is_err());
    }

    #[test]
    fn test_exception_frame() {
        let frame = Frame::exception(7, 0x03, 0x02);
        assert_eq!(frame.function, 0x83);
        assert!(frame.is_exception());
        assert_eq!(frame.exception_code(), Some(0x02));
        assert_eq!(frame.base_function(), 0x03);
        assert!(frame.function_code().is_err());
    }

    #[test]
    fn test_read_request_rejects_write_function() {
        assert!(Frame::read_request(1, ModbusFunction::WriteSingleCoil, 0, 1).is_err());
        let frame = Frame::read_request(1, ModbusFunction::ReadCoils, 0, 16).unwrap();
        assert_eq!(frame.values.layout(), ValueLayout::Bits);
    }

    #[test]
    fn test_end_address() {
        let frame = Frame::new(1, FC_READ_HOLDING_REGISTERS, 100, 4);
        assert_eq!(frame.end_address(), Some(103));
        let frame = Frame::new(1, FC_READ_HOLDING_REGISTERS, 0xFFFF, 2);
        assert_eq!(frame.end_address(), None);
    }
}
