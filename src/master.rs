//! # Master Session
//!
//! Polls register tables and sends manual commands over one device, with
//! exactly one request in flight at a time.
//!
//! ## Event model
//!
//! The session never reads clocks or spawns timers. The owner feeds it
//! [`MasterEvent`]s stamped with a monotonic millisecond time:
//!
//! - `Tick`: expire an overdue request, schedule due tables, send the next
//!   request when idle
//! - `BytesReceived`: accumulate bytes until they form a valid packet, then
//!   correlate it with the in-flight request
//! - `ReceiveTimeout`: expire the in-flight request if its deadline passed
//!
//! [`next_deadline_ms`](MasterSession::next_deadline_ms) tells the owner
//! when the next timeout is due.
//!
//! ## Scheduling
//!
//! Manual commands always go before cyclic scans. A new scan sweep is only
//! scheduled once every request of the previous sweep completed, so scan
//! intervals are a lower bound.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::codec::ModbusCodec;
use crate::config::{validate_recv_timeout, SessionConfig};
use crate::constants::{EXCEPTION_SLAVE_DEVICE_FAILURE, MAX_PACKET_SIZE};
use crate::device::ModbusDevice;
use crate::endian::ByteOrder;
use crate::error::{ModbusError, ModbusResult};
use crate::frame::Frame;
use crate::packet::{to_hex_string, Packet};
use crate::protocol::{ErrorCode, ModbusFunction, Role, UnitId};
use crate::register_table::{RegisterTable, TableConfig, TableHandle};
use crate::value::ModbusValue;

/// Identifier of a manual command, echoed in its [`WriteCompletion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(u64);

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cmd#{}", self.0)
    }
}

/// Input of the master state machine.
#[derive(Debug, Clone)]
pub enum MasterEvent {
    Tick { now_ms: u64 },
    BytesReceived { data: Bytes, now_ms: u64 },
    ReceiveTimeout { now_ms: u64 },
}

/// Outcome of a manual write command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteCompletion {
    pub command: CommandId,
    pub result: ErrorCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Manual { id: CommandId, function: u8 },
    Cyclic(TableHandle),
}

#[derive(Debug)]
struct ManualCommand {
    id: CommandId,
    function: u8,
    packet: Packet,
}

#[derive(Debug)]
struct CyclicRequest {
    table: TableHandle,
    packet: Packet,
}

#[derive(Debug)]
struct InFlight {
    source: Source,
    request: Packet,
    deadline_ms: u64,
}

fn is_write_function(function: u8) -> bool {
    ModbusFunction::from_u8(function)
        .map(ModbusFunction::is_write_function)
        .unwrap_or(false)
}

/// Polling/commanding side of a Modbus link.
pub struct MasterSession<D: ModbusDevice> {
    codec: ModbusCodec,
    device: D,
    recv_timeout_ms: u64,
    tables: Vec<RegisterTable>,
    next_table_id: u64,
    manual_queue: VecDeque<ManualCommand>,
    cyclic_queue: VecDeque<CyclicRequest>,
    last_scan_ms: HashMap<TableHandle, u64>,
    in_flight: Option<InFlight>,
    transaction_id: u16,
    error_counts: HashMap<ErrorCode, u32>,
    receive_buffer: BytesMut,
    completions: VecDeque<WriteCompletion>,
    next_command_id: u64,
}

impl<D: ModbusDevice> MasterSession<D> {
    pub fn new(config: SessionConfig, device: D) -> ModbusResult<Self> {
        config.validate()?;
        if config.role != Role::Master {
            return Err(ModbusError::configuration(
                "master session needs a master configuration",
            ));
        }
        Ok(Self {
            codec: ModbusCodec::for_protocol(config.protocol),
            device,
            recv_timeout_ms: config.recv_timeout_ms,
            tables: Vec::new(),
            next_table_id: 0,
            manual_queue: VecDeque::new(),
            cyclic_queue: VecDeque::new(),
            last_scan_ms: HashMap::new(),
            in_flight: None,
            transaction_id: 0,
            error_counts: HashMap::new(),
            receive_buffer: BytesMut::with_capacity(MAX_PACKET_SIZE),
            completions: VecDeque::new(),
            next_command_id: 0,
        })
    }

    // ========================================================================
    // Event handling
    // ========================================================================

    /// Feed one event. Errors are device write failures; the session stays
    /// usable and the affected request runs into its timeout.
    pub fn handle_event(&mut self, event: MasterEvent) -> ModbusResult<()> {
        match event {
            MasterEvent::Tick { now_ms } => {
                self.expire(now_ms);
                self.scan(now_ms);
                self.send_next(now_ms)
            }
            MasterEvent::BytesReceived { data, now_ms } => self.on_bytes(&data, now_ms),
            MasterEvent::ReceiveTimeout { now_ms } => {
                self.expire(now_ms);
                self.send_next(now_ms)
            }
        }
    }

    /// Deadline of the in-flight request, if any.
    pub fn next_deadline_ms(&self) -> Option<u64> {
        self.in_flight.as_ref().map(|f| f.deadline_ms)
    }

    #[inline]
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The cyclic queue counts as empty only when no scan request is queued
    /// or in flight.
    fn cyclic_idle(&self) -> bool {
        self.cyclic_queue.is_empty()
            && !matches!(
                self.in_flight,
                Some(InFlight {
                    source: Source::Cyclic(_),
                    ..
                })
            )
    }

    fn scan(&mut self, now_ms: u64) {
        if !self.cyclic_idle() {
            return;
        }
        for table in &self.tables {
            let handle = table.handle();
            let due = self
                .last_scan_ms
                .get(&handle)
                .map_or(true, |&last| now_ms.saturating_sub(last) >= table.scan_interval_ms());
            if !due {
                continue;
            }
            match table.scan_packet(&self.codec) {
                Ok(packet) => self.cyclic_queue.push_back(CyclicRequest {
                    table: handle,
                    packet,
                }),
                Err(e) => warn!("Cannot build scan request for {}: {}", handle, e),
            }
            self.last_scan_ms.insert(handle, now_ms);
        }
    }

    fn send_next(&mut self, now_ms: u64) -> ModbusResult<()> {
        if self.in_flight.is_some() {
            return Ok(());
        }

        let (source, mut packet) = if let Some(cmd) = self.manual_queue.pop_front() {
            let source = Source::Manual {
                id: cmd.id,
                function: cmd.function,
            };
            (source, cmd.packet)
        } else if let Some(req) = self.cyclic_queue.pop_front() {
            if let Some(table) = self.tables.iter_mut().find(|t| t.handle() == req.table) {
                table.record_send();
            }
            (Source::Cyclic(req.table), req.packet)
        } else {
            return Ok(());
        };

        if self.codec.uses_transaction_id() {
            packet.set_transaction_id(self.transaction_id)?;
            self.transaction_id = self.transaction_id.wrapping_add(1);
        }

        debug!(">> {}", packet.to_hex());
        let result = self.device.write(packet.as_slice());
        self.in_flight = Some(InFlight {
            source,
            request: packet,
            deadline_ms: now_ms.saturating_add(self.recv_timeout_ms),
        });
        if let Err(e) = &result {
            warn!("Device write failed, waiting for timeout: {}", e);
        }
        result
    }

    fn expire(&mut self, now_ms: u64) {
        let overdue = self
            .in_flight
            .as_ref()
            .is_some_and(|f| now_ms >= f.deadline_ms);
        if !overdue {
            return;
        }
        let Some(in_flight) = self.in_flight.take() else {
            return;
        };

        warn!("Timeout Error");
        *self.error_counts.entry(ErrorCode::Timeout).or_insert(0) += 1;
        match in_flight.source {
            Source::Cyclic(handle) => {
                if let Some(table) = self.table_mut(handle) {
                    table.record_error(ErrorCode::Timeout);
                }
            }
            Source::Manual { id, function } => {
                if is_write_function(function) {
                    self.completions.push_back(WriteCompletion {
                        command: id,
                        result: ErrorCode::Timeout,
                    });
                }
            }
        }
        self.receive_buffer.clear();
        self.device.clear_receive_buffer();
    }

    fn on_bytes(&mut self, data: &[u8], now_ms: u64) -> ModbusResult<()> {
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

        let Some(in_flight) = &self.in_flight else {
            debug!("Response with no request in flight, dropped");
            return Ok(());
        };
        let response = match self.codec.master_packet_to_frame(&packet) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Undecodable response dropped: {}", e);
                return Ok(());
            }
        };
        let request = match self.codec.slave_packet_to_frame(in_flight.request.as_slice()) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("In-flight request cannot be decoded: {}", e);
                return Ok(());
            }
        };

        if response.unit_id != request.unit_id {
            debug!(
                "Response unit {} does not match request unit {}, dropped",
                response.unit_id, request.unit_id
            );
            return Ok(());
        }
        if self.codec.uses_transaction_id() && response.transaction_id != request.transaction_id {
            debug!(
                "Response transaction {} does not match request transaction {}, dropped",
                response.transaction_id, request.transaction_id
            );
            return Ok(());
        }
        if response.base_function() != request.function {
            debug!(
                "Response function 0x{:02X} does not answer request function 0x{:02X}, dropped",
                response.function, request.function
            );
            return Ok(());
        }

        if let Some(in_flight) = self.in_flight.take() {
            self.apply_response(in_flight.source, &request, &response);
        }
        self.send_next(now_ms)
    }

    fn apply_response(&mut self, source: Source, request: &Frame, response: &Frame) {
        if response.is_exception() {
            let code = ErrorCode::from_wire(
                response
                    .exception_code()
                    .unwrap_or(EXCEPTION_SLAVE_DEVICE_FAILURE),
            );
            warn!(
                "Unit {} answered function 0x{:02X} with {}",
                response.unit_id,
                response.base_function(),
                code
            );
            *self.error_counts.entry(code).or_insert(0) += 1;
            match source {
                Source::Cyclic(handle) => {
                    if let Some(table) = self.table_mut(handle) {
                        table.record_error(code);
                    }
                }
                Source::Manual { id, .. } => {
                    if is_write_function(response.base_function()) {
                        self.completions.push_back(WriteCompletion {
                            command: id,
                            result: code,
                        });
                    }
                }
            }
            return;
        }

        let function = match ModbusFunction::from_u8(response.function) {
            Ok(function) => function,
            Err(e) => {
                warn!("Unknown Function: {}", e);
                return;
            }
        };

        if function.is_write_function() {
            match source {
                Source::Manual { id, .. } => self.completions.push_back(WriteCompletion {
                    command: id,
                    result: ErrorCode::Ok,
                }),
                Source::Cyclic(handle) => {
                    if let Some(table) = self.table_mut(handle) {
                        table.clear_status();
                    }
                }
            }
            return;
        }

        let target = match source {
            Source::Cyclic(handle) => self.tables.iter_mut().find(|t| t.handle() == handle),
            Source::Manual { .. } => {
                let end = request.end_address().unwrap_or(u16::MAX);
                self.tables.iter_mut().find(|t| {
                    t.unit_id() == request.unit_id
                        && t.function() == function
                        && t.contains(request.start_address, end)
                })
            }
        };
        let Some(table) = target else {
            debug!("No table owns the read of {} at {}", function, request.start_address);
            return;
        };
        let Some(room) = table
            .end_address()
            .checked_sub(request.start_address)
            .map(|n| usize::from(n) + 1)
        else {
            return;
        };

        let cells: Vec<u16> = if function.is_bit_function() {
            let count = usize::from(request.quantity)
                .min(response.values.byte_len() * 8)
                .min(room);
            (0..count)
                .map(|i| u16::from(response.values.bit(i).unwrap_or(false)))
                .collect()
        } else {
            match response.values.words() {
                Ok(words) => words.take(room).collect(),
                Err(e) => {
                    warn!("Register response without register values: {}", e);
                    return;
                }
            }
        };
        match table.set_values(request.start_address, &cells) {
            Ok(()) => table.clear_status(),
            Err(e) => warn!("Cannot store response in {}: {}", table.handle(), e),
        }
    }

    // ========================================================================
    // Manual commands
    // ========================================================================

    /// Queue an arbitrary request ahead of all cyclic scans.
    pub fn enqueue_manual(&mut self, frame: &Frame) -> ModbusResult<CommandId> {
        let packet = self.codec.master_frame_to_packet(frame)?;
        let id = CommandId(self.next_command_id);
        self.next_command_id += 1;
        self.manual_queue.push_back(ManualCommand {
            id,
            function: frame.function,
            packet,
        });
        debug!("Queued {} function 0x{:02X} for unit {}", id, frame.function, frame.unit_id);
        Ok(id)
    }

    pub fn write_single_coil(
        &mut self,
        unit_id: UnitId,
        address: u16,
        on: bool,
    ) -> ModbusResult<CommandId> {
        self.enqueue_manual(&Frame::write_single_coil(unit_id, address, on))
    }

    pub fn write_single_register(
        &mut self,
        unit_id: UnitId,
        address: u16,
        value: u16,
    ) -> ModbusResult<CommandId> {
        self.enqueue_manual(&Frame::write_single_register(unit_id, address, value))
    }

    /// Write one coil with FC15, for devices that only accept multiple writes.
    pub fn write_single_coil_as_multiple(
        &mut self,
        unit_id: UnitId,
        address: u16,
        on: bool,
    ) -> ModbusResult<CommandId> {
        self.write_multiple_coils(unit_id, address, &[on])
    }

    /// Write one register with FC16.
    pub fn write_single_register_as_multiple(
        &mut self,
        unit_id: UnitId,
        address: u16,
        value: u16,
    ) -> ModbusResult<CommandId> {
        self.write_multiple_registers(unit_id, address, &[value])
    }

    pub fn write_multiple_coils(
        &mut self,
        unit_id: UnitId,
        address: u16,
        coils: &[bool],
    ) -> ModbusResult<CommandId> {
        self.enqueue_manual(&Frame::write_multiple_coils(unit_id, address, coils)?)
    }

    pub fn write_multiple_registers(
        &mut self,
        unit_id: UnitId,
        address: u16,
        registers: &[u16],
    ) -> ModbusResult<CommandId> {
        self.enqueue_manual(&Frame::write_multiple_registers(unit_id, address, registers)?)
    }

    /// Write a typed value into a table cell and queue the matching command.
    ///
    /// Coil tables get FC05, one-register values FC06 and wider values FC16
    /// laid out in `order`. The table is updated before the reply arrives.
    pub fn write_value(
        &mut self,
        handle: TableHandle,
        address: u16,
        value: ModbusValue,
        order: ByteOrder,
    ) -> ModbusResult<CommandId> {
        let table = self
            .table_mut(handle)
            .ok_or_else(|| ModbusError::invalid_data(format!("unknown {}", handle)))?;
        let unit_id = table.unit_id();
        let coil_table = table.function().is_bit_function();
        let registers = value.to_registers(order);

        let frame = if coil_table {
            let on = match value {
                ModbusValue::Bool(on) => on,
                other => other.as_f64() != 0.0,
            };
            table.set_coil(address, on)?;
            Frame::write_single_coil(unit_id, address, on)
        } else if registers.len() == 1 {
            table.set_values(address, &registers)?;
            Frame::write_single_register(unit_id, address, registers[0])
        } else {
            table.set_values(address, &registers)?;
            Frame::write_multiple_registers(unit_id, address, &registers)?
        };
        self.enqueue_manual(&frame)
    }

    /// Drain the outcomes of finished manual writes.
    pub fn take_completions(&mut self) -> Vec<WriteCompletion> {
        self.completions.drain(..).collect()
    }

    #[inline]
    pub fn pending_manual(&self) -> usize {
        self.manual_queue.len()
    }

    #[inline]
    pub fn pending_cyclic(&self) -> usize {
        self.cyclic_queue.len()
    }

    // ========================================================================
    // Tables
    // ========================================================================

    pub fn add_table(&mut self, config: &TableConfig) -> ModbusResult<TableHandle> {
        config.validate_for_master()?;
        let handle = TableHandle(self.next_table_id);
        let mut table = RegisterTable::new(handle, config)?;
        table.refresh_packet(&self.codec)?;
        self.next_table_id += 1;
        self.tables.push(table);
        Ok(handle)
    }

    /// Remove a table and its queued scans. A scan already in flight
    /// completes without a table to land in.
    pub fn remove_table(&mut self, handle: TableHandle) -> Option<RegisterTable> {
        let index = self.tables.iter().position(|t| t.handle() == handle)?;
        self.cyclic_queue.retain(|req| req.table != handle);
        self.last_scan_ms.remove(&handle);
        Some(self.tables.remove(index))
    }

    /// Change a table's shape; values restart at zero.
    pub fn reconfigure_table(
        &mut self,
        handle: TableHandle,
        config: &TableConfig,
    ) -> ModbusResult<()> {
        config.validate_for_master()?;
        let codec = self.codec;
        let table = self
            .table_mut(handle)
            .ok_or_else(|| ModbusError::invalid_data(format!("unknown {}", handle)))?;
        table.reconfigure(config)?;
        table.refresh_packet(&codec)?;
        self.cyclic_queue.retain(|req| req.table != handle);
        Ok(())
    }

    pub fn table(&self, handle: TableHandle) -> Option<&RegisterTable> {
        self.tables.iter().find(|t| t.handle() == handle)
    }

    pub fn table_mut(&mut self, handle: TableHandle) -> Option<&mut RegisterTable> {
        self.tables.iter_mut().find(|t| t.handle() == handle)
    }

    pub fn tables(&self) -> &[RegisterTable] {
        &self.tables
    }

    // ========================================================================
    // Settings and statistics
    // ========================================================================

    #[inline]
    pub fn codec(&self) -> ModbusCodec {
        self.codec
    }

    #[inline]
    pub fn recv_timeout_ms(&self) -> u64 {
        self.recv_timeout_ms
    }

    /// Applies to requests sent from now on.
    pub fn set_recv_timeout_ms(&mut self, timeout_ms: u64) -> ModbusResult<()> {
        validate_recv_timeout(timeout_ms)?;
        self.recv_timeout_ms = timeout_ms;
        Ok(())
    }

    /// Transaction id the next TCP/UDP request will carry.
    #[inline]
    pub fn next_transaction_id(&self) -> u16 {
        self.transaction_id
    }

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

    /// Close the device. Queued work stays queued.
    pub fn close(&mut self) -> ModbusResult<()> {
        self.device.close()
    }
}
