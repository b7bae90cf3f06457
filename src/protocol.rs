//! Modbus protocol definitions
//!
//! Function codes, exception/error codes and the wire encapsulations the
//! engine speaks.

use std::fmt;

use tracing::warn;

use crate::constants::*;
use crate::error::{ModbusError, ModbusResult};

/// Modbus slave/unit identifier
pub type UnitId = u8;

// ============================================================================
// Function Codes
// ============================================================================

/// Function codes handled by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ModbusFunction {
    /// Read Coils (0x01)
    ReadCoils = FC_READ_COILS,
    /// Read Discrete Inputs (0x02)
    ReadDiscreteInputs = FC_READ_DISCRETE_INPUTS,
    /// Read Holding Registers (0x03)
    ReadHoldingRegisters = FC_READ_HOLDING_REGISTERS,
    /// Read Input Registers (0x04)
    ReadInputRegisters = FC_READ_INPUT_REGISTERS,
    /// Write Single Coil (0x05)
    WriteSingleCoil = FC_WRITE_SINGLE_COIL,
    /// Write Single Register (0x06)
    WriteSingleRegister = FC_WRITE_SINGLE_REGISTER,
    /// Write Multiple Coils (0x0F)
    WriteMultipleCoils = FC_WRITE_MULTIPLE_COILS,
    /// Write Multiple Registers (0x10)
    WriteMultipleRegisters = FC_WRITE_MULTIPLE_REGISTERS,
}

impl ModbusFunction {
    /// Convert from u8 to ModbusFunction
    pub fn from_u8(value: u8) -> ModbusResult<Self> {
        match value {
            FC_READ_COILS => Ok(Self::ReadCoils),
            FC_READ_DISCRETE_INPUTS => Ok(Self::ReadDiscreteInputs),
            FC_READ_HOLDING_REGISTERS => Ok(Self::ReadHoldingRegisters),
            FC_READ_INPUT_REGISTERS => Ok(Self::ReadInputRegisters),
            FC_WRITE_SINGLE_COIL => Ok(Self::WriteSingleCoil),
            FC_WRITE_SINGLE_REGISTER => Ok(Self::WriteSingleRegister),
            FC_WRITE_MULTIPLE_COILS => Ok(Self::WriteMultipleCoils),
            FC_WRITE_MULTIPLE_REGISTERS => Ok(Self::WriteMultipleRegisters),
            _ => Err(ModbusError::invalid_function(value)),
        }
    }

    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    #[inline]
    pub fn is_read_function(self) -> bool {
        matches!(
            self,
            Self::ReadCoils
                | Self::ReadDiscreteInputs
                | Self::ReadHoldingRegisters
                | Self::ReadInputRegisters
        )
    }

    #[inline]
    pub fn is_write_function(self) -> bool {
        !self.is_read_function()
    }

    /// Functions whose values travel as packed bits.
    #[inline]
    pub fn is_bit_function(self) -> bool {
        matches!(
            self,
            Self::ReadCoils
                | Self::ReadDiscreteInputs
                | Self::WriteSingleCoil
                | Self::WriteMultipleCoils
        )
    }

    /// Read function of the table a write function lands in.
    ///
    /// Coil writes (05, 0F) target coil tables (01), register writes
    /// (06, 10) target holding-register tables (03). Reads map to themselves.
    #[inline]
    pub fn storage_function(self) -> Self {
        match self {
            Self::WriteSingleCoil | Self::WriteMultipleCoils => Self::ReadCoils,
            Self::WriteSingleRegister | Self::WriteMultipleRegisters => {
                Self::ReadHoldingRegisters
            }
            other => other,
        }
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::ReadCoils => "Read Coils",
            Self::ReadDiscreteInputs => "Read Discrete Inputs",
            Self::ReadHoldingRegisters => "Read Holding Registers",
            Self::ReadInputRegisters => "Read Input Registers",
            Self::WriteSingleCoil => "Write Single Coil",
            Self::WriteSingleRegister => "Write Single Register",
            Self::WriteMultipleCoils => "Write Multiple Coils",
            Self::WriteMultipleRegisters => "Write Multiple Registers",
        }
    }
}

impl fmt::Display for ModbusFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), *self as u8)
    }
}

impl TryFrom<u8> for ModbusFunction {
    type Error = ModbusError;

    fn try_from(value: u8) -> ModbusResult<Self> {
        Self::from_u8(value)
    }
}

/// True when the function byte flags an exception reply.
#[inline]
pub fn is_exception_function(function: u8) -> bool {
    function & EXCEPTION_FLAG != 0
}

// ============================================================================
// Error Codes
// ============================================================================

/// Outcome of one transaction, as tracked by the sessions.
///
/// Everything except [`ErrorCode::Ok`] and [`ErrorCode::Timeout`] is a Modbus
/// exception code that travels on the wire. `Timeout` is produced locally
/// when a request gets no answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorCode {
    Ok,
    Timeout,
    IllegalFunction,
    IllegalDataAddress,
    IllegalDataValue,
    SlaveDeviceFailure,
    Acknowledge,
    SlaveDeviceBusy,
    NegativeAcknowledgment,
    MemoryParityError,
    GatewayPathUnavailable,
    GatewayTargetDeviceFailedToRespond,
}

impl ErrorCode {
    /// Map an exception code received from a peer.
    ///
    /// Codes outside the known set are reported as `SlaveDeviceFailure`.
    pub fn from_wire(code: u8) -> Self {
        match code {
            EXCEPTION_ILLEGAL_FUNCTION => Self::IllegalFunction,
            EXCEPTION_ILLEGAL_DATA_ADDRESS => Self::IllegalDataAddress,
            EXCEPTION_ILLEGAL_DATA_VALUE => Self::IllegalDataValue,
            EXCEPTION_SLAVE_DEVICE_FAILURE => Self::SlaveDeviceFailure,
            EXCEPTION_ACKNOWLEDGE => Self::Acknowledge,
            EXCEPTION_SLAVE_DEVICE_BUSY => Self::SlaveDeviceBusy,
            EXCEPTION_NEGATIVE_ACKNOWLEDGMENT => Self::NegativeAcknowledgment,
            EXCEPTION_MEMORY_PARITY_ERROR => Self::MemoryParityError,
            EXCEPTION_GATEWAY_PATH_UNAVAILABLE => Self::GatewayPathUnavailable,
            EXCEPTION_GATEWAY_TARGET_FAILED => Self::GatewayTargetDeviceFailedToRespond,
            other => {
                warn!("Unknown exception code 0x{:02X}, treating as slave device failure", other);
                Self::SlaveDeviceFailure
            }
        }
    }

    /// Exception code on the wire, `None` for `Ok` and `Timeout`.
    pub fn wire_code(self) -> Option<u8> {
        match self {
            Self::Ok | Self::Timeout => None,
            Self::IllegalFunction => Some(EXCEPTION_ILLEGAL_FUNCTION),
            Self::IllegalDataAddress => Some(EXCEPTION_ILLEGAL_DATA_ADDRESS),
            Self::IllegalDataValue => Some(EXCEPTION_ILLEGAL_DATA_VALUE),
            Self::SlaveDeviceFailure => Some(EXCEPTION_SLAVE_DEVICE_FAILURE),
            Self::Acknowledge => Some(EXCEPTION_ACKNOWLEDGE),
            Self::SlaveDeviceBusy => Some(EXCEPTION_SLAVE_DEVICE_BUSY),
            Self::NegativeAcknowledgment => Some(EXCEPTION_NEGATIVE_ACKNOWLEDGMENT),
            Self::MemoryParityError => Some(EXCEPTION_MEMORY_PARITY_ERROR),
            Self::GatewayPathUnavailable => Some(EXCEPTION_GATEWAY_PATH_UNAVAILABLE),
            Self::GatewayTargetDeviceFailedToRespond => Some(EXCEPTION_GATEWAY_TARGET_FAILED),
        }
    }

    #[inline]
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// Short display name, also used as a table's status text.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Timeout => "Timeout Error",
            Self::IllegalFunction => "Illegal Function",
            Self::IllegalDataAddress => "Illegal Data Address",
            Self::IllegalDataValue => "Illegal Data Value",
            Self::SlaveDeviceFailure => "Slave Device Failure",
            Self::Acknowledge => "Acknowledge",
            Self::SlaveDeviceBusy => "Slave Device Busy",
            Self::NegativeAcknowledgment => "Negative Acknowledgment",
            Self::MemoryParityError => "Memory Parity Error",
            Self::GatewayPathUnavailable => "Gateway Path Unavailable",
            Self::GatewayTargetDeviceFailedToRespond => "Gateway Target Device Failed To Respond",
        }
    }

    /// Longer explanation of the code.
    pub fn description(self) -> &'static str {
        match self {
            Self::Ok => "The request completed successfully.",
            Self::Timeout => "The slave did not reply within the specified time.",
            Self::IllegalFunction => {
                "The function code received in the request is not an authorized action for the slave."
            }
            Self::IllegalDataAddress => {
                "The data address received by the slave is not an authorized address for the slave."
            }
            Self::IllegalDataValue => {
                "The value in the request data field is not an authorized value for the slave."
            }
            Self::SlaveDeviceFailure => {
                "The slave fails to perform a requested action because of an unrecoverable error."
            }
            Self::Acknowledge => {
                "The slave accepts the request but needs a long time to process it."
            }
            Self::SlaveDeviceBusy => {
                "The slave is busy processing another command. The master must send the request once the slave is available."
            }
            Self::NegativeAcknowledgment => {
                "The slave cannot perform the programming request sent by the master."
            }
            Self::MemoryParityError => {
                "The slave detects a parity error in the memory when attempting to read extended memory."
            }
            Self::GatewayPathUnavailable => "The gateway is overloaded or not correctly configured.",
            Self::GatewayTargetDeviceFailedToRespond => "The slave is not present on the network.",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Encapsulations and Roles
// ============================================================================

/// Wire encapsulation of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Rtu,
    Ascii,
    Tcp,
    /// Same framing as TCP, one datagram per packet
    Udp,
}

impl Protocol {
    /// Whether packets carry an MBAP transaction id.
    #[inline]
    pub fn uses_transaction_id(self) -> bool {
        matches!(self, Self::Tcp | Self::Udp)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rtu => "RTU",
            Self::Ascii => "ASCII",
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
        };
        f.write_str(name)
    }
}

/// Side of the conversation a session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Master,
    Slave,
}
