//! Encapsulation-independent frame body: `unit fc data...`
//!
//! This is the RTU layout without its CRC. ASCII wraps it in hex and TCP/UDP
//! prefixes the MBAP header, so all three share these routines.

use crate::constants::*;
use crate::error::{ModbusError, ModbusResult};
use crate::frame::{Frame, ValueBuffer, ValueLayout};
use crate::packet::Packet;
use crate::protocol::is_exception_function;

// ============================================================================
// Encoding
// ============================================================================

/// Append the request body of `frame` (master → slave).
pub(crate) fn encode_request(frame: &Frame, out: &mut Packet) -> ModbusResult<()> {
    out.push(frame.unit_id)?;
    out.push(frame.function)?;

    match frame.function {
        FC_READ_COILS | FC_READ_DISCRETE_INPUTS | FC_READ_HOLDING_REGISTERS
        | FC_READ_INPUT_REGISTERS => {
            out.push_u16(frame.start_address)?;
            out.push_u16(frame.quantity)?;
        }
        FC_WRITE_SINGLE_COIL | FC_WRITE_SINGLE_REGISTER => {
            out.push_u16(frame.start_address)?;
            out.push_u16(frame.values.word(0)?)?;
        }
        FC_WRITE_MULTIPLE_COILS => {
            let byte_count = coil_byte_count(frame.quantity)?;
            out.push_u16(frame.start_address)?;
            out.push_u16(frame.quantity)?;
            out.push(byte_count as u8)?;
            out.extend(value_bytes(frame, ValueLayout::Bits, byte_count)?)?;
        }
        FC_WRITE_MULTIPLE_REGISTERS => {
            let byte_count = register_byte_count(frame.quantity)?;
            out.push_u16(frame.start_address)?;
            out.push_u16(frame.quantity)?;
            out.push(byte_count as u8)?;
            out.extend(value_bytes(frame, ValueLayout::Words, byte_count)?)?;
        }
        other => return Err(ModbusError::invalid_function(other)),
    }
    Ok(())
}

/// Append the response body of `frame` (slave → master).
pub(crate) fn encode_response(frame: &Frame, out: &mut Packet) -> ModbusResult<()> {
    out.push(frame.unit_id)?;
    out.push(frame.function)?;

    if frame.is_exception() {
        let code = frame
            .exception_code()
            .ok_or_else(|| ModbusError::frame("exception reply without a code"))?;
        return out.push(code);
    }

    match frame.function {
        FC_READ_COILS | FC_READ_DISCRETE_INPUTS => {
            let byte_count = coil_byte_count(frame.quantity)?;
            out.push(byte_count as u8)?;
            out.extend(value_bytes(frame, ValueLayout::Bits, byte_count)?)?;
        }
        FC_READ_HOLDING_REGISTERS | FC_READ_INPUT_REGISTERS => {
            let byte_count = register_byte_count(frame.quantity)?;
            out.push(byte_count as u8)?;
            out.extend(value_bytes(frame, ValueLayout::Words, byte_count)?)?;
        }
        FC_WRITE_SINGLE_COIL | FC_WRITE_SINGLE_REGISTER => {
            out.push_u16(frame.start_address)?;
            out.push_u16(frame.values.word(0)?)?;
        }
        FC_WRITE_MULTIPLE_COILS | FC_WRITE_MULTIPLE_REGISTERS => {
            out.push_u16(frame.start_address)?;
            out.push_u16(frame.quantity)?;
        }
        other => return Err(ModbusError::invalid_function(other)),
    }
    Ok(())
}

fn coil_byte_count(quantity: u16) -> ModbusResult<usize> {
    let quantity = usize::from(quantity);
    if quantity == 0 || quantity > MAX_FRAME_COILS {
        return Err(ModbusError::invalid_data(format!(
            "Invalid quantity: {} coils (1..={})",
            quantity, MAX_FRAME_COILS
        )));
    }
    Ok(quantity.div_ceil(8))
}

fn register_byte_count(quantity: u16) -> ModbusResult<usize> {
    let quantity = usize::from(quantity);
    if quantity == 0 || quantity > MAX_FRAME_REGISTERS {
        return Err(ModbusError::invalid_data(format!(
            "Invalid quantity: {} registers (1..={})",
            quantity, MAX_FRAME_REGISTERS
        )));
    }
    Ok(quantity * 2)
}

fn value_bytes(frame: &Frame, layout: ValueLayout, byte_count: usize) -> ModbusResult<&[u8]> {
    if frame.values.layout() != layout {
        return Err(ModbusError::protocol(format!(
            "function 0x{:02X} needs {:?} values, frame holds {:?}",
            frame.function,
            layout,
            frame.values.layout()
        )));
    }
    let bytes = frame.values.as_bytes();
    if bytes.len() < byte_count {
        return Err(ModbusError::invalid_data(format!(
            "quantity {} needs {} value bytes, frame holds {}",
            frame.quantity,
            byte_count,
            bytes.len()
        )));
    }
    Ok(&bytes[..byte_count])
}

// ============================================================================
// Decoding
// ============================================================================

/// Bounds-checked big-endian reader over a body.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn u8(&mut self) -> ModbusResult<u8> {
        let byte = *self.data.get(self.pos).ok_or_else(|| self.truncated(1))?;
        self.pos += 1;
        Ok(byte)
    }

    fn u16(&mut self) -> ModbusResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn take(&mut self, n: usize) -> ModbusResult<&'a [u8]> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(self.truncated(n));
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn truncated(&self, wanted: usize) -> ModbusError {
        ModbusError::frame(format!(
            "body truncated: need {} more bytes at offset {}, have {}",
            wanted,
            self.pos,
            self.data.len().saturating_sub(self.pos)
        ))
    }
}

/// Decode a request body (slave side).
///
/// An unsupported function code decodes to a bare frame carrying only the
/// unit and function, so the slave can answer it with an exception.
pub(crate) fn decode_request(body: &[u8]) -> ModbusResult<Frame> {
    let mut r = Reader::new(body);
    let unit_id = r.u8()?;
    let function = r.u8()?;

    match function {
        FC_READ_COILS | FC_READ_DISCRETE_INPUTS | FC_READ_HOLDING_REGISTERS
        | FC_READ_INPUT_REGISTERS => {
            let start = r.u16()?;
            let quantity = r.u16()?;
            Ok(Frame::new(unit_id, function, start, quantity))
        }
        FC_WRITE_SINGLE_COIL | FC_WRITE_SINGLE_REGISTER => {
            let start = r.u16()?;
            let value = r.u16()?;
            let mut frame = Frame::new(unit_id, function, start, 1);
            frame.values = ValueBuffer::from_words(&[value])?;
            Ok(frame)
        }
        FC_WRITE_MULTIPLE_COILS | FC_WRITE_MULTIPLE_REGISTERS => {
            let start = r.u16()?;
            let quantity = r.u16()?;
            let byte_count = usize::from(r.u8()?);
            let raw = r.take(byte_count)?;
            let mut frame = Frame::new(unit_id, function, start, quantity);
            frame.values = ValueBuffer::from_raw(ValueLayout::for_function(function), raw)?;
            Ok(frame)
        }
        other => Ok(Frame::new(unit_id, other, 0, 0)),
    }
}

/// Decode a response body (master side).
pub(crate) fn decode_response(body: &[u8]) -> ModbusResult<Frame> {
    let mut r = Reader::new(body);
    let unit_id = r.u8()?;
    let function = r.u8()?;

    if is_exception_function(function) {
        let code = r.u8()?;
        return Ok(Frame::exception(unit_id, function, code));
    }

    match function {
        FC_READ_COILS | FC_READ_DISCRETE_INPUTS => {
            let byte_count = r.u8()?;
            let raw = r.take(usize::from(byte_count))?;
            let mut frame = Frame::new(unit_id, function, 0, u16::from(byte_count) * 8);
            frame.values = ValueBuffer::from_raw(ValueLayout::Bits, raw)?;
            Ok(frame)
        }
        FC_READ_HOLDING_REGISTERS | FC_READ_INPUT_REGISTERS => {
            let byte_count = r.u8()?;
            if byte_count % 2 != 0 {
                return Err(ModbusError::frame(format!(
                    "odd register byte count {}",
                    byte_count
                )));
            }
            let raw = r.take(usize::from(byte_count))?;
            let mut frame = Frame::new(unit_id, function, 0, u16::from(byte_count / 2));
            frame.values = ValueBuffer::from_raw(ValueLayout::Words, raw)?;
            Ok(frame)
        }
        FC_WRITE_SINGLE_COIL | FC_WRITE_SINGLE_REGISTER => {
            let start = r.u16()?;
            let value = r.u16()?;
            let mut frame = Frame::new(unit_id, function, start, 1);
            frame.values = ValueBuffer::from_words(&[value])?;
            Ok(frame)
        }
        FC_WRITE_MULTIPLE_COILS | FC_WRITE_MULTIPLE_REGISTERS => {
            let start = r.u16()?;
            let quantity = r.u16()?;
            Ok(Frame::new(unit_id, function, start, quantity))
        }
        other => Err(ModbusError::invalid_function(other)),
    }
}
