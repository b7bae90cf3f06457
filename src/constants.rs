//! Modbus protocol constants used by the engine
//!
//! Frame limits follow the engine's fixed buffers:
//! - One frame carries at most 123 registers (246 value bytes)
//! - One wire packet is at most 512 bytes, whatever the encapsulation

// ============================================================================
// Frame Size Constants
// ============================================================================

/// Maximum number of 16-bit registers one frame can carry.
///
/// Calculation for the largest request PDU (FC16):
/// - Function Code: 1 byte
/// - Starting Address: 2 bytes
/// - Quantity of Registers: 2 bytes
/// - Byte Count: 1 byte
/// - Register Values: N × 2 bytes
/// - Total: 1 + 2 + 2 + 1 + (N × 2) ≤ 253
/// - Therefore: N ≤ 123
pub const MAX_FRAME_REGISTERS: usize = 123;

/// Size of the frame value buffer in bytes.
pub const MAX_FRAME_VALUE_BYTES: usize = MAX_FRAME_REGISTERS * 2;

/// Maximum number of coils one frame can carry (every bit of the value buffer).
pub const MAX_FRAME_COILS: usize = MAX_FRAME_VALUE_BYTES * 8;

/// Upper bound of one encoded packet in any encapsulation.
///
/// The worst case is an ASCII FC16 request with 123 registers:
/// 1 (':') + 2 × (7 + 246 + 1) hex digits + 2 (CR LF) = 511 bytes.
pub const MAX_PACKET_SIZE: usize = 512;

/// Modbus MBAP header length for TCP/UDP (without the unit id)
/// Format: Transaction ID(2) + Protocol ID(2) + Length(2)
pub const MBAP_HEADER_LEN: usize = 6;

/// Shortest valid RTU packet: unit + function + one byte + CRC(2)
pub const MIN_RTU_PACKET_LEN: usize = 5;

/// Shortest valid TCP/UDP packet: MBAP header + unit + function
pub const MIN_TCP_PACKET_LEN: usize = MBAP_HEADER_LEN + 2;

/// Shortest decoded ASCII payload: unit + function + LRC
pub const MIN_ASCII_PAYLOAD_LEN: usize = 3;

/// ASCII start marker
pub const ASCII_START: u8 = b':';

/// ASCII terminator
pub const ASCII_END: [u8; 2] = [b'\r', b'\n'];

// ============================================================================
// Session Timing
// ============================================================================

/// Default receive timeout of the master session
pub const DEFAULT_RECV_TIMEOUT_MS: u64 = 300;

/// Smallest receive timeout the master accepts
pub const MIN_RECV_TIMEOUT_MS: u64 = 200;

/// Default scan interval of a register table
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 1000;

/// Default driver tick resolution
pub const DEFAULT_TICK_MS: u64 = 10;

// ============================================================================
// Modbus Function Codes
// ============================================================================

/// Read Coils (FC01)
pub const FC_READ_COILS: u8 = 0x01;

/// Read Discrete Inputs (FC02)
pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;

/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Read Input Registers (FC04)
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;

/// Write Single Coil (FC05)
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;

/// Write Single Register (FC06)
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Write Multiple Coils (FC15)
pub const FC_WRITE_MULTIPLE_COILS: u8 = 0x0F;

/// Write Multiple Registers (FC16)
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Bit set on the function byte of an exception reply
pub const EXCEPTION_FLAG: u8 = 0x80;

/// Wire value of an ON coil in FC05
pub const COIL_ON: u16 = 0xFF00;

/// Wire value of an OFF coil in FC05
pub const COIL_OFF: u16 = 0x0000;

// ============================================================================
// Modbus Exception Codes
// ============================================================================

/// Illegal Function
pub const EXCEPTION_ILLEGAL_FUNCTION: u8 = 0x01;

/// Illegal Data Address
pub const EXCEPTION_ILLEGAL_DATA_ADDRESS: u8 = 0x02;

/// Illegal Data Value
pub const EXCEPTION_ILLEGAL_DATA_VALUE: u8 = 0x03;

/// Slave Device Failure
pub const EXCEPTION_SLAVE_DEVICE_FAILURE: u8 = 0x04;

/// Acknowledge
pub const EXCEPTION_ACKNOWLEDGE: u8 = 0x05;

/// Slave Device Busy
pub const EXCEPTION_SLAVE_DEVICE_BUSY: u8 = 0x06;

/// Negative Acknowledgment
pub const EXCEPTION_NEGATIVE_ACKNOWLEDGMENT: u8 = 0x07;

/// Memory Parity Error
pub const EXCEPTION_MEMORY_PARITY_ERROR: u8 = 0x08;

/// Gateway Path Unavailable
pub const EXCEPTION_GATEWAY_PATH_UNAVAILABLE: u8 = 0x0A;

/// Gateway Target Device Failed to Respond
pub const EXCEPTION_GATEWAY_TARGET_FAILED: u8 = 0x0B;
