//! # Slave Session
//!
//! Serves requests against the session's register tables and answers each
//! valid request with exactly one reply packet.
//!
//! Table resolution follows the usual Modbus precedence, evaluated over all
//! tables before anything is answered:
//!
//! 1. the function is unsupported, or no table for the unit serves it:
//!    `Illegal Function`
//! 2. a table serves the function but none contains the range:
//!    `Illegal Data Address`
//! 3. otherwise the first containing table handles the request
//!
//! Write functions land in the table of their read counterpart: FC05/FC0F
//! in the coil table (FC01), FC06/FC10 in the holding table (FC03).

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::codec::ModbusCodec;
use crate::config::SessionConfig;
use crate::constants::*;
use crate::device::ModbusDevice;
use crate::error::{ModbusError, ModbusResult};
use crate::frame::{Frame, ValueBuffer};
use crate::packet::to_hex_string;
use crate::protocol::{ErrorCode, ModbusFunction, Role, UnitId};
use crate::register_table::{RegisterTable, TableConfig, TableHandle};

/// Input of the slave state machine.
#[derive(Debug, Clone)]
pub enum SlaveEvent {
    BytesReceived(Bytes),
}

/// Request-servicing side of a Modbus link.
pub struct SlaveSession<D: ModbusDevice> {
    codec: ModbusCodec,
    device: D,
    tables: Vec<RegisterTable>,
    next_table_id: u64,
    receive_buffer: BytesMut,
    error_counts: HashMap<ErrorCode, u32>,
}

impl<D: ModbusDevice> SlaveSession<D> {
    pub fn new(config: SessionConfig, device: D) -> ModbusResult<Self> {
        config.validate()?;
        if config.role != Role::Slave {
            return Err(ModbusError::configuration(
                "slave session needs a slave configuration",
            ));
        }
        Ok(Self {
            codec: ModbusCodec::for_protocol(config.protocol),
            device,
            tables: Vec::new(),
            next_table_id: 0,
            receive_buffer: BytesMut::with_capacity(MAX_PACKET_SIZE),
            error_counts: HashMap::new(),
        })
    }

    /// Feed one event. Errors come from encoding or writing the reply.
    pub fn handle_event(&mut self, event: SlaveEvent) -> ModbusResult<()> {
        match event {
            SlaveEvent::BytesReceived(data) => self.on_bytes(&data),
        }
    }

    fn on_bytes(&mut self, data: &[u8]) -> ModbusResult<()> {
        self.receive_buffer.extend_from_slice(data);
        if self.receive_buffer.len() > MAX_PACKET_SIZE {
            warn!(
                "Receive buffer overflow ({} bytes), discarding",
                self.receive_buffer.len()
            );
            self.receive_buffer.clear();
            return Ok(());
        }
        if !self.codec.is_valid_packet(&self.receive_buffer) {
            return Ok(());
        }

        let packet = self.receive_buffer.split().freeze();
        self.device.clear_receive_buffer();
        debug!("<< {}", to_hex_string(&packet));

        let request = match self.codec.slave_packet_to_frame(&packet) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Malformed request dropped: {}", e);
                return Ok(());
            }
        };

        let reply = self.process(&request);
        let packet = self.codec.slave_frame_to_packet(&reply)?;
        debug!(">> {}", packet.to_hex());
        self.device.write(packet.as_slice())
    }

    /// Build the reply to a decoded request, mutating tables for writes.
    pub fn process(&mut self, request: &Frame) -> Frame {
        let result = self
            .resolve(request)
            .and_then(|index| self.apply(index, request));
        match result {
            Ok(reply) => reply,
            Err(code) => {
                *self.error_counts.entry(code).or_insert(0) += 1;
                warn!(
                    "Unit {} function 0x{:02X} at {}: {}",
                    request.unit_id, request.function, request.start_address, code
                );
                let wire = code.wire_code().unwrap_or(EXCEPTION_SLAVE_DEVICE_FAILURE);
                Frame::exception(request.unit_id, request.function, wire)
                    .with_transaction_id(request.transaction_id)
            }
        }
    }

    fn resolve(&self, request: &Frame) -> Result<usize, ErrorCode> {
        let function =
            ModbusFunction::from_u8(request.function).map_err(|_| ErrorCode::IllegalFunction)?;
        self.find_table_index(request.unit_id, function, request.start_address, request.quantity)
    }

    /// Table that serves `quantity` cells of `function` at `start` for
    /// `unit_id`, or the exception the request deserves.
    pub fn find_table(
        &self,
        unit_id: UnitId,
        function: ModbusFunction,
        start: u16,
        quantity: u16,
    ) -> Result<&RegisterTable, ErrorCode> {
        self.find_table_index(unit_id, function, start, quantity)
            .map(|index| &self.tables[index])
    }

    fn find_table_index(
        &self,
        unit_id: UnitId,
        function: ModbusFunction,
        start: u16,
        quantity: u16,
    ) -> Result<usize, ErrorCode> {
        let storage = function.storage_function();
        // u32 so ranges running past 0xFFFF never wrap into a table
        let first = u32::from(start);
        let last = first + u32::from(quantity.max(1)) - 1;

        let mut function_matched = false;
        let mut found = None;
        for (index, table) in self.tables.iter().enumerate() {
            if table.unit_id() != unit_id
                || (table.function() != function && table.function() != storage)
            {
                continue;
            }
            function_matched = true;
            let contained = u32::from(table.start_address()) <= first
                && last <= u32::from(table.end_address());
            if contained && found.is_none() {
                found = Some(index);
            }
        }

        match found {
            Some(index) => Ok(index),
            None if function_matched => Err(ErrorCode::IllegalDataAddress),
            None => Err(ErrorCode::IllegalFunction),
        }
    }

    fn apply(&mut self, index: usize, request: &Frame) -> Result<Frame, ErrorCode> {
        let function =
            ModbusFunction::from_u8(request.function).map_err(|_| ErrorCode::IllegalFunction)?;
        let capacity = if function.is_bit_function() {
            MAX_FRAME_COILS
        } else {
            MAX_FRAME_REGISTERS
        };
        let quantity = usize::from(request.quantity);
        if quantity == 0 || quantity > capacity {
            return Err(ErrorCode::IllegalDataValue);
        }

        let table = &mut self.tables[index];
        let start = request.start_address;
        let offset = table
            .offset_of(start)
            .ok_or(ErrorCode::IllegalDataAddress)?;
        let device_failure = |e: ModbusError| {
            warn!("Slave table access failed: {}", e);
            ErrorCode::SlaveDeviceFailure
        };

        let mut reply = Frame::new(request.unit_id, request.function, start, request.quantity)
            .with_transaction_id(request.transaction_id);

        match function {
            ModbusFunction::ReadHoldingRegisters | ModbusFunction::ReadInputRegisters => {
                let words = &table.values()[offset..offset + quantity];
                reply.values = ValueBuffer::from_words(words).map_err(device_failure)?;
            }
            ModbusFunction::ReadCoils | ModbusFunction::ReadDiscreteInputs => {
                let bits: Vec<bool> = table.values()[offset..offset + quantity]
                    .iter()
                    .map(|&v| v != 0)
                    .collect();
                reply.values = ValueBuffer::from_bits(&bits).map_err(device_failure)?;
            }
            ModbusFunction::WriteSingleCoil => {
                let value = request.values.word(0).map_err(|_| ErrorCode::IllegalDataValue)?;
                table
                    .set_coil(start, (value >> 8) != 0)
                    .map_err(device_failure)?;
                reply = request.clone();
            }
            ModbusFunction::WriteSingleRegister => {
                let value = request.values.word(0).map_err(|_| ErrorCode::IllegalDataValue)?;
                table.set_value(start, value).map_err(device_failure)?;
                reply = request.clone();
            }
            ModbusFunction::WriteMultipleCoils => {
                let cells = (0..quantity)
                    .map(|i| request.values.bit(i).map(u16::from))
                    .collect::<ModbusResult<Vec<u16>>>()
                    .map_err(|_| ErrorCode::IllegalDataValue)?;
                table.set_values(start, &cells).map_err(device_failure)?;
            }
            ModbusFunction::WriteMultipleRegisters => {
                let words: Vec<u16> = request
                    .values
                    .words()
                    .map_err(|_| ErrorCode::IllegalDataValue)?
                    .take(quantity)
                    .collect();
                if words.len() < quantity {
                    return Err(ErrorCode::IllegalDataValue);
                }
                table.set_values(start, &words).map_err(device_failure)?;
            }
        }
        Ok(reply)
    }

    // ========================================================================
    // Tables
    // ========================================================================

    pub fn add_table(&mut self, config: &TableConfig) -> ModbusResult<TableHandle> {
        config.validate_for_slave()?;
        let handle = TableHandle(self.next_table_id);
        let table = RegisterTable::new(handle, config)?;
        self.next_table_id += 1;
        self.tables.push(table);
        Ok(handle)
    }

    pub fn remove_table(&mut self, handle: TableHandle) -> Option<RegisterTable> {
        let index = self.tables.iter().position(|t| t.handle() == handle)?;
        Some(self.tables.remove(index))
    }

    /// Change a table's shape; values restart at zero.
    pub fn reconfigure_table(
        &mut self,
        handle: TableHandle,
        config: &TableConfig,
    ) -> ModbusResult<()> {
        config.validate_for_slave()?;
        self.table_mut(handle)
            .ok_or_else(|| ModbusError::invalid_data(format!("unknown {}", handle)))?
            .reconfigure(config)
    }

    pub fn table(&self, handle: TableHandle) -> Option<&RegisterTable> {
        self.tables.iter().find(|t| t.handle() == handle)
    }

    /// Mutable access for preloading values the slave serves.
    pub fn table_mut(&mut self, handle: TableHandle) -> Option<&mut RegisterTable> {
        self.tables.iter_mut().find(|t| t.handle() == handle)
    }

    pub fn tables(&self) -> &[RegisterTable] {
        &self.tables
    }

    #[inline]
    pub fn codec(&self) -> ModbusCodec {
        self.codec
    }

    /// Exceptions sent for `code`.
    pub fn error_count(&self, code: ErrorCode) -> u32 {
        self.error_counts.get(&code).copied().unwrap_or(0)
    }

    pub fn error_counts(&self) -> &HashMap<ErrorCode, u32> {
        &self.error_counts
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn close(&mut self) -> ModbusResult<()> {
        self.device.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Protocol;

    #[derive(Default)]
    struct VecDevice {
        written: Vec<Vec<u8>>,
    }

    impl ModbusDevice for VecDevice {
        fn write(&mut self, data: &[u8]) -> ModbusResult<()> {
            self.written.push(data.to_vec());
            Ok(())
        }

        fn close(&mut self) -> ModbusResult<()> {
            Ok(())
        }
    }

    fn slave(protocol: Protocol) -> SlaveSession<VecDevice> {
        SlaveSession::new(SessionConfig::slave(protocol), VecDevice::default()).unwrap()
    }

    fn holding_slave() -> (SlaveSession<VecDevice>, TableHandle) {
        let mut session = slave(Protocol::Rtu);
        let handle = session
            .add_table(&TableConfig::new(1, ModbusFunction::ReadHoldingRegisters, 100, 11))
            .unwrap();
        (session, handle)
    }

    #[test]
    fn test_read_holding_returns_stored_values() {
        let (mut session, handle) = holding_slave();
        session
            .table_mut(handle)
            .unwrap()
            .set_values(100, &[10, 20, 30, 40])
            .unwrap();

        let reply = session.process(&Frame::new(1, FC_READ_HOLDING_REGISTERS, 100, 4));
        assert!(!reply.is_exception());
        assert_eq!(reply.values.words().unwrap().collect::<Vec<_>>(), vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_unknown_unit_is_illegal_function() {
        let (mut session, _) = holding_slave();
        let reply = session.process(&Frame::new(2, FC_READ_HOLDING_REGISTERS, 100, 4));
        assert_eq!(reply.function, FC_READ_HOLDING_REGISTERS | EXCEPTION_FLAG);
        assert_eq!(reply.exception_code(), Some(EXCEPTION_ILLEGAL_FUNCTION));
        assert_eq!(session.error_count(ErrorCode::IllegalFunction), 1);
    }

    #[test]
    fn test_out_of_range_is_illegal_data_address() {
        let (mut session, _) = holding_slave();
        let reply = session.process(&Frame::new(1, FC_READ_HOLDING_REGISTERS, 200, 1));
        assert_eq!(reply.exception_code(), Some(EXCEPTION_ILLEGAL_DATA_ADDRESS));

        // partially overlapping range
        let reply = session.process(&Frame::new(1, FC_READ_HOLDING_REGISTERS, 108, 4));
        assert_eq!(reply.exception_code(), Some(EXCEPTION_ILLEGAL_DATA_ADDRESS));
        assert_eq!(session.error_count(ErrorCode::IllegalDataAddress), 2);
    }

    #[test]
    fn test_address_precedence_is_global() {
        let mut session = slave(Protocol::Rtu);
        session
            .add_table(&TableConfig::new(1, ModbusFunction::ReadCoils, 0, 8))
            .unwrap();
        session
            .add_table(&TableConfig::new(1, ModbusFunction::ReadHoldingRegisters, 0, 8))
            .unwrap();

        // function matched table 2, range contained nowhere
        let reply = session.process(&Frame::new(1, FC_READ_HOLDING_REGISTERS, 50, 1));
        assert_eq!(reply.exception_code(), Some(EXCEPTION_ILLEGAL_DATA_ADDRESS));
        // input registers served by no table
        let reply = session.process(&Frame::new(1, FC_READ_INPUT_REGISTERS, 0, 1));
        assert_eq!(reply.exception_code(), Some(EXCEPTION_ILLEGAL_FUNCTION));
    }

    #[test]
    fn test_first_containing_table_wins() {
        let mut session = slave(Protocol::Rtu);
        let a = session
            .add_table(&TableConfig::new(1, ModbusFunction::ReadHoldingRegisters, 0, 10))
            .unwrap();
        session
            .add_table(&TableConfig::new(1, ModbusFunction::ReadHoldingRegisters, 0, 20))
            .unwrap();
        let found = session
            .find_table(1, ModbusFunction::WriteSingleRegister, 5, 1)
            .unwrap();
        assert_eq!(found.handle(), a);
    }

    #[test]
    fn test_write_single_coil_stores_high_byte() {
        let mut session = slave(Protocol::Rtu);
        let handle = session
            .add_table(&TableConfig::new(1, ModbusFunction::ReadCoils, 0, 8))
            .unwrap();

        let request = Frame::write_single_coil(1, 3, true);
        let reply = session.process(&request);
        assert_eq!(reply, request);
        assert_eq!(session.table(handle).unwrap().coil(3), Some(true));

        let mut raw = Frame::write_single_register(1, 3, 0x0001);
        raw.function = FC_WRITE_SINGLE_COIL;
        session.process(&raw);
        assert_eq!(session.table(handle).unwrap().coil(3), Some(false));
    }

    #[test]
    fn test_write_multiple_coils_and_registers() {
        let mut session = slave(Protocol::Tcp);
        let coils = session
            .add_table(&TableConfig::new(1, ModbusFunction::ReadCoils, 0, 16))
            .unwrap();
        let regs = session
            .add_table(&TableConfig::new(1, ModbusFunction::ReadHoldingRegisters, 0, 16))
            .unwrap();

        let request = Frame::write_multiple_coils(1, 2, &[true, false, true])
            .unwrap()
            .with_transaction_id(42);
        let reply = session.process(&request);
        assert_eq!(reply.transaction_id, 42);
        assert_eq!((reply.start_address, reply.quantity), (2, 3));
        assert_eq!(&session.table(coils).unwrap().values()[..6], &[0, 0, 1, 0, 1, 0]);

        let request = Frame::write_multiple_registers(1, 4, &[0xAAAA, 0xBBBB]).unwrap();
        session.process(&request);
        assert_eq!(session.table(regs).unwrap().value(5), Some(0xBBBB));
    }

    #[test]
    fn test_zero_quantity_is_illegal_data_value() {
        let (mut session, _) = holding_slave();
        let reply = session.process(&Frame::new(1, FC_READ_HOLDING_REGISTERS, 100, 0));
        assert_eq!(reply.exception_code(), Some(EXCEPTION_ILLEGAL_DATA_VALUE));

        // an unknown unit still gets Illegal Function first
        let reply = session.process(&Frame::new(9, FC_READ_HOLDING_REGISTERS, 100, 0));
        assert_eq!(reply.exception_code(), Some(EXCEPTION_ILLEGAL_FUNCTION));
    }

    #[test]
    fn test_rtu_write_single_register_scenario() {
        let mut session = slave(Protocol::Rtu);
        let handle = session
            .add_table(&TableConfig::new(1, ModbusFunction::ReadHoldingRegisters, 0, 11))
            .unwrap();

        let request = ModbusCodec::Rtu
            .master_frame_to_packet(&Frame::write_single_register(1, 10, 5))
            .unwrap();
        session
            .handle_event(SlaveEvent::BytesReceived(Bytes::copy_from_slice(request.as_slice())))
            .unwrap();

        assert_eq!(session.table(handle).unwrap().value(10), Some(5));
        assert_eq!(session.device().written, vec![request.as_slice().to_vec()]);
        assert_eq!(&request.as_slice()[..6], &[0x01, 0x06, 0x00, 0x0A, 0x00, 0x05]);
    }

    #[test]
    fn test_corrupt_packet_gets_no_reply() {
        let (mut session, _) = holding_slave();
        let mut bytes = ModbusCodec::Rtu
            .master_frame_to_packet(&Frame::new(1, FC_READ_HOLDING_REGISTERS, 100, 1))
            .unwrap()
            .as_slice()
            .to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        session
            .handle_event(SlaveEvent::BytesReceived(Bytes::from(bytes)))
            .unwrap();
        assert!(session.device().written.is_empty());
    }

    #[test]
    fn test_slave_rejects_write_tables() {
        let mut session = slave(Protocol::Ascii);
        assert!(session
            .add_table(&TableConfig::new(1, ModbusFunction::WriteSingleRegister, 0, 1))
            .is_err());
        assert!(SlaveSession::new(SessionConfig::master(Protocol::Rtu), VecDevice::default()).is_err());
    }

    #[test]
    fn test_unsupported_function_gets_illegal_function() {
        let (mut session, _) = holding_slave();
        let reply = session.process(&Frame::new(1, 0x2B, 0, 0));
        assert_eq!(reply.function, 0xAB);
        assert_eq!(reply.exception_code(), Some(EXCEPTION_ILLEGAL_FUNCTION));
    }

    #[test]
    fn test_unsupported_function_on_the_wire_is_answered() {
        let (mut session, _) = holding_slave();
        let mut request = vec![0x01, 0x2B, 0x0E, 0x01, 0x00];
        let crc = crate::checksum::crc16(&request);
        request.extend_from_slice(&crc.to_le_bytes());
        assert!(ModbusCodec::Rtu.is_valid_packet(&request));

        session
            .handle_event(SlaveEvent::BytesReceived(Bytes::from(request)))
            .unwrap();

        let written = &session.device().written;
        assert_eq!(written.len(), 1);
        assert_eq!(&written[0][..3], &[0x01, 0xAB, EXCEPTION_ILLEGAL_FUNCTION]);
        assert!(ModbusCodec::Rtu.is_valid_packet(&written[0]));
        assert_eq!(session.error_count(ErrorCode::IllegalFunction), 1);
    }
}
