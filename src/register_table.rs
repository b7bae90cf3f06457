//! # Register Tables
//!
//! A register table is one addressable block of coils or registers owned by
//! a session: what a master polls or writes cyclically, and what a slave
//! serves to its peers.
//!
//! Coil tables hold one cell per coil, `1` for ON and `0` for OFF. Register
//! tables hold raw 16-bit register values.

use std::fmt;

use crate::codec::ModbusCodec;
use crate::constants::*;
use crate::endian::ByteOrder;
use crate::error::{ModbusError, ModbusResult};
use crate::frame::Frame;
use crate::packet::Packet;
use crate::protocol::{ErrorCode, ModbusFunction, UnitId};
use crate::value::{DataType, ModbusValue};

/// Stable identifier of a table inside its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableHandle(pub(crate) u64);

impl fmt::Display for TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table#{}", self.0)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Shape of a register table.
///
/// # Example
///
/// ```rust
/// use voltage_modbus_engine::{ModbusFunction, TableConfig};
///
/// let config = TableConfig::new(1, ModbusFunction::ReadHoldingRegisters, 100, 10)
///     .with_scan_interval_ms(500);
/// assert_eq!(config.end_address().unwrap(), 109);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    pub unit_id: UnitId,
    pub function: ModbusFunction,
    pub start_address: u16,
    pub quantity: u16,
    /// Master only: minimum time between two scans of the table
    pub scan_interval_ms: u64,
}

impl TableConfig {
    pub fn new(
        unit_id: UnitId,
        function: ModbusFunction,
        start_address: u16,
        quantity: u16,
    ) -> Self {
        Self {
            unit_id,
            function,
            start_address,
            quantity,
            scan_interval_ms: DEFAULT_SCAN_INTERVAL_MS,
        }
    }

    pub fn with_scan_interval_ms(mut self, scan_interval_ms: u64) -> Self {
        self.scan_interval_ms = scan_interval_ms;
        self
    }

    /// Inclusive last address.
    pub fn end_address(&self) -> ModbusResult<u16> {
        if self.quantity == 0 {
            return Err(ModbusError::configuration("table quantity must be at least 1"));
        }
        self.start_address
            .checked_add(self.quantity - 1)
            .ok_or_else(|| {
                ModbusError::configuration(format!(
                    "table {}+{} runs past address 0xFFFF",
                    self.start_address, self.quantity
                ))
            })
    }

    /// Check the shape of the table.
    pub fn validate(&self) -> ModbusResult<()> {
        self.end_address()?;
        if self.scan_interval_ms == 0 {
            return Err(ModbusError::configuration("scan interval must be positive"));
        }
        Ok(())
    }

    /// Additional checks for tables a master polls: one request frame must
    /// carry the whole table.
    pub fn validate_for_master(&self) -> ModbusResult<()> {
        self.validate()?;
        let capacity = if self.function.is_bit_function() {
            MAX_FRAME_COILS
        } else {
            MAX_FRAME_REGISTERS
        };
        if usize::from(self.quantity) > capacity {
            return Err(ModbusError::configuration(format!(
                "{} cells do not fit one {} frame (max {})",
                self.quantity, self.function, capacity
            )));
        }
        Ok(())
    }

    /// Additional checks for tables a slave serves: only read functions
    /// name storage.
    pub fn validate_for_slave(&self) -> ModbusResult<()> {
        self.validate()?;
        if !self.function.is_read_function() {
            return Err(ModbusError::configuration(format!(
                "slave tables must use a read function, got {}",
                self.function
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Table
// ============================================================================

/// One block of coils or registers.
#[derive(Debug, Clone)]
pub struct RegisterTable {
    handle: TableHandle,
    unit_id: UnitId,
    function: ModbusFunction,
    start_address: u16,
    end_address: u16,
    values: Vec<u16>,
    scan_interval_ms: u64,
    send_count: u32,
    error_count: u32,
    /// Cached read request, master tables only
    packet: Option<Packet>,
    /// Last error text recorded against the table
    status: Option<String>,
}

impl RegisterTable {
    pub(crate) fn new(handle: TableHandle, config: &TableConfig) -> ModbusResult<Self> {
        let end_address = config.end_address()?;
        Ok(Self {
            handle,
            unit_id: config.unit_id,
            function: config.function,
            start_address: config.start_address,
            end_address,
            values: vec![0; usize::from(config.quantity)],
            scan_interval_ms: config.scan_interval_ms,
            send_count: 0,
            error_count: 0,
            packet: None,
            status: None,
        })
    }

    /// Apply a new shape. Values are reallocated and zeroed, the cached
    /// request is dropped until the owner refreshes it.
    pub(crate) fn reconfigure(&mut self, config: &TableConfig) -> ModbusResult<()> {
        let end_address = config.end_address()?;
        self.unit_id = config.unit_id;
        self.function = config.function;
        self.start_address = config.start_address;
        self.end_address = end_address;
        self.scan_interval_ms = config.scan_interval_ms;
        self.values = vec![0; usize::from(config.quantity)];
        self.packet = None;
        self.status = None;
        Ok(())
    }

    #[inline]
    pub fn handle(&self) -> TableHandle {
        self.handle
    }

    #[inline]
    pub fn unit_id(&self) -> UnitId {
        self.unit_id
    }

    #[inline]
    pub fn function(&self) -> ModbusFunction {
        self.function
    }

    #[inline]
    pub fn start_address(&self) -> u16 {
        self.start_address
    }

    #[inline]
    pub fn end_address(&self) -> u16 {
        self.end_address
    }

    #[inline]
    pub fn quantity(&self) -> u16 {
        self.end_address - self.start_address + 1
    }

    #[inline]
    pub fn scan_interval_ms(&self) -> u64 {
        self.scan_interval_ms
    }

    #[inline]
    pub fn send_count(&self) -> u32 {
        self.send_count
    }

    #[inline]
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// All cells, starting at `start_address`.
    #[inline]
    pub fn values(&self) -> &[u16] {
        &self.values
    }

    pub fn cached_packet(&self) -> Option<&Packet> {
        self.packet.as_ref()
    }

    pub fn config(&self) -> TableConfig {
        TableConfig {
            unit_id: self.unit_id,
            function: self.function,
            start_address: self.start_address,
            quantity: self.quantity(),
            scan_interval_ms: self.scan_interval_ms,
        }
    }

    /// Whether `start..=end` lies inside the table.
    #[inline]
    pub fn contains(&self, start: u16, end: u16) -> bool {
        self.start_address <= start && end <= self.end_address
    }

    /// Index of `address` in `values`.
    #[inline]
    pub fn offset_of(&self, address: u16) -> Option<usize> {
        if self.contains(address, address) {
            Some(usize::from(address - self.start_address))
        } else {
            None
        }
    }

    fn checked_range(&self, address: u16, len: usize) -> ModbusResult<usize> {
        let offset = self.offset_of(address).ok_or_else(|| {
            ModbusError::invalid_data(format!(
                "address {} outside {} ({}..={})",
                address, self.handle, self.start_address, self.end_address
            ))
        })?;
        if offset + len > self.values.len() {
            return Err(ModbusError::invalid_data(format!(
                "{} cells at address {} overrun {}",
                len, address, self.handle
            )));
        }
        Ok(offset)
    }

    /// Register value at `address`.
    pub fn value(&self, address: u16) -> Option<u16> {
        self.offset_of(address).map(|i| self.values[i])
    }

    /// Coil state at `address`.
    pub fn coil(&self, address: u16) -> Option<bool> {
        self.value(address).map(|v| v != 0)
    }

    pub fn set_value(&mut self, address: u16, value: u16) -> ModbusResult<()> {
        let offset = self.checked_range(address, 1)?;
        self.values[offset] = value;
        Ok(())
    }

    pub fn set_coil(&mut self, address: u16, on: bool) -> ModbusResult<()> {
        self.set_value(address, u16::from(on))
    }

    /// Overwrite consecutive cells starting at `address`.
    pub fn set_values(&mut self, address: u16, values: &[u16]) -> ModbusResult<()> {
        let offset = self.checked_range(address, values.len())?;
        self.values[offset..offset + values.len()].copy_from_slice(values);
        Ok(())
    }

    /// Decode a typed value stored at `address`.
    pub fn read_value(
        &self,
        address: u16,
        data_type: DataType,
        order: ByteOrder,
    ) -> ModbusResult<ModbusValue> {
        let offset = self.checked_range(address, data_type.register_count())?;
        ModbusValue::from_registers(data_type, &self.values[offset..], order)
    }

    // ------------------------------------------------------------------------
    // Master bookkeeping
    // ------------------------------------------------------------------------

    /// Request frame that scans this table.
    ///
    /// Read tables ask for the whole range. Write tables send their stored
    /// values: single-write tables send the first cell.
    pub(crate) fn request_frame(&self) -> ModbusResult<Frame> {
        match self.function {
            f if f.is_read_function() => {
                Frame::read_request(self.unit_id, f, self.start_address, self.quantity())
            }
            ModbusFunction::WriteSingleCoil => Ok(Frame::write_single_coil(
                self.unit_id,
                self.start_address,
                self.values[0] != 0,
            )),
            ModbusFunction::WriteSingleRegister => Ok(Frame::write_single_register(
                self.unit_id,
                self.start_address,
                self.values[0],
            )),
            ModbusFunction::WriteMultipleCoils => {
                let coils: Vec<bool> = self.values.iter().map(|&v| v != 0).collect();
                Frame::write_multiple_coils(self.unit_id, self.start_address, &coils)
            }
            _ => Frame::write_multiple_registers(self.unit_id, self.start_address, &self.values),
        }
    }

    /// Rebuild the cached read request after a shape change.
    pub(crate) fn refresh_packet(&mut self, codec: &ModbusCodec) -> ModbusResult<()> {
        self.packet = if self.function.is_read_function() {
            Some(codec.master_frame_to_packet(&self.request_frame()?)?)
        } else {
            None
        };
        Ok(())
    }

    /// Packet for the next scan: the cached request for reads, a fresh one
    /// carrying the current values for writes.
    pub(crate) fn scan_packet(&self, codec: &ModbusCodec) -> ModbusResult<Packet> {
        match &self.packet {
            Some(packet) => Ok(packet.clone()),
            None => codec.master_frame_to_packet(&self.request_frame()?),
        }
    }

    pub(crate) fn record_send(&mut self) {
        self.send_count = self.send_count.wrapping_add(1);
    }

    pub(crate) fn record_error(&mut self, code: ErrorCode) {
        self.error_count = self.error_count.wrapping_add(1);
        self.status = Some(code.as_str().to_string());
    }

    pub(crate) fn clear_status(&mut self) {
        self.status = None;
    }

    /// Summary line: `Tx=..;Err=..;ID=..;F=..;SR=..ms`.
    pub fn info(&self) -> String {
        format!(
            "Tx={};Err={};ID={};F={:02};SR={}ms",
            self.send_count,
            self.error_count,
            self.unit_id,
            self.function.to_u8(),
            self.scan_interval_ms
        )
    }
}
