//! # Voltage Modbus Engine - Modbus Protocol State Machines
//!
//! **Author:** Evan Liu <liuyifanz.1996@gmail.com>
//! **License:** MIT
//!
//! A transport-agnostic Modbus protocol engine: frame model, RTU/ASCII/TCP
//! codecs with their checksums, and master/slave session state machines
//! that run over any byte-stream device.
//!
//! ## Features
//!
//! - **Three Encapsulations**: RTU (CRC-16), ASCII (LRC, hex text) and
//!   TCP/UDP (MBAP header)
//! - **Master Sessions**: cyclic table polling, prioritized manual writes,
//!   one request in flight, timeouts and transaction-id correlation
//! - **Slave Sessions**: request validation against register tables with
//!   standard exception replies
//! - **Stack-Allocated Packets**: fixed 512-byte buffers on the encode path
//! - **Byte Orders**: ABCD, BADC, CDAB and DCBA layouts for 32/64-bit values
//! - **Async Driver**: optional tokio task around a session (`driver` feature)
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Master | Slave |
//! |------|----------|--------|-------|
//! | 0x01 | Read Coils | ✅ | ✅ |
//! | 0x02 | Read Discrete Inputs | ✅ | ✅ |
//! | 0x03 | Read Holding Registers | ✅ | ✅ |
//! | 0x04 | Read Input Registers | ✅ | ✅ |
//! | 0x05 | Write Single Coil | ✅ | ✅ |
//! | 0x06 | Write Single Register | ✅ | ✅ |
//! | 0x0F | Write Multiple Coils | ✅ | ✅ |
//! | 0x10 | Write Multiple Registers | ✅ | ✅ |
//!
//! ## Quick Start
//!
//! ```rust
//! use voltage_modbus_engine::{
//!     Frame, MasterEvent, MasterSession, ModbusDevice, ModbusFunction, ModbusResult,
//!     Protocol, SessionConfig, TableConfig,
//! };
//!
//! struct Wire(Vec<Vec<u8>>);
//!
//! impl ModbusDevice for Wire {
//!     fn write(&mut self, data: &[u8]) -> ModbusResult<()> {
//!         self.0.push(data.to_vec());
//!         Ok(())
//!     }
//!
//!     fn close(&mut self) -> ModbusResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> ModbusResult<()> {
//! let mut master = MasterSession::new(SessionConfig::master(Protocol::Rtu), Wire(Vec::new()))?;
//! master.add_table(&TableConfig::new(1, ModbusFunction::ReadHoldingRegisters, 0, 10))?;
//!
//! master.handle_event(MasterEvent::Tick { now_ms: 0 })?;
//! assert_eq!(master.device().0[0][..6], [0x01, 0x03, 0x00, 0x00, 0x00, 0x0A]);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Modbus protocol constants and frame limits
pub mod constants;

/// Function codes, exception codes and wire variants
pub mod protocol;

/// Stack-allocated wire packet
pub mod packet;

/// CRC-16 and LRC checksums
pub mod checksum;

/// Encapsulation-independent request/response model
pub mod frame;

/// RTU, ASCII and TCP/UDP packet codecs
pub mod codec;

// ============================================================================
// Data handling
// ============================================================================

/// Byte order handling for multi-register data types
pub mod endian;

/// Typed values stored in registers
pub mod value;

/// Register storage owned by sessions
pub mod register_table;

// ============================================================================
// Sessions
// ============================================================================

/// Session configuration
pub mod config;

/// Byte-stream device abstraction
pub mod device;

/// Master polling/commanding state machine
pub mod master;

/// Slave request-servicing state machine
pub mod slave;

/// tokio task around a session
#[cfg(feature = "driver")]
pub mod driver;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Async runtime (users can use voltage_modbus_engine::tokio) ===
#[cfg(feature = "driver")]
pub use tokio;

// === Error handling ===
pub use error::{ModbusError, ModbusResult};

// === Core types ===
pub use codec::ModbusCodec;
pub use endian::ByteOrder;
pub use frame::{Frame, ValueBuffer, ValueLayout};
pub use packet::Packet;
pub use protocol::{ErrorCode, ModbusFunction, Protocol, Role, UnitId};
pub use value::{DataType, ModbusValue};

// === Sessions ===
pub use config::SessionConfig;
pub use device::ModbusDevice;
pub use master::{CommandId, MasterEvent, MasterSession, WriteCompletion};
pub use register_table::{RegisterTable, TableConfig, TableHandle};
pub use slave::{SlaveEvent, SlaveSession};

#[cfg(feature = "driver")]
pub use device::ChannelDevice;
#[cfg(feature = "driver")]
pub use driver::{spawn_master, run_slave, MasterHandle, MasterTask};

// === Protocol limits (commonly needed constants) ===
pub use constants::{
    DEFAULT_RECV_TIMEOUT_MS, MAX_FRAME_COILS, MAX_FRAME_REGISTERS, MAX_PACKET_SIZE,
    MIN_RECV_TIMEOUT_MS,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!(
        "Voltage Modbus Engine v{} - Modbus protocol engine by Evan Liu",
        VERSION
    )
}
