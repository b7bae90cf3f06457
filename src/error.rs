//! Error types for the Modbus engine
//!
//! Every fallible operation in the crate returns [`ModbusResult`]. Peer
//! exception replies are not errors at this level: they are decoded into
//! frames and accounted as [`ErrorCode`](crate::protocol::ErrorCode)s by the
//! sessions. [`ModbusError`] covers local failures only.

use thiserror::Error;

/// Local failures raised by codecs, tables and sessions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModbusError {
    /// Protocol level violation (unexpected structure, unsupported layout)
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Malformed or truncated wire frame
    #[error("Frame error: {message}")]
    Frame { message: String },

    /// Function code outside the supported set
    #[error("Invalid function code: 0x{code:02X}")]
    InvalidFunction { code: u8 },

    /// Value outside the accepted range
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Rejected configuration value
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Device write/close failure or closed channel
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Fixed-size buffer would overflow
    #[error("Buffer overflow: {needed} bytes needed, capacity {capacity}")]
    BufferOverflow { needed: usize, capacity: usize },
}

/// Result alias used across the crate.
pub type ModbusResult<T> = Result<T, ModbusError>;

impl ModbusError {
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn frame(message: impl Into<String>) -> Self {
        Self::Frame {
            message: message.into(),
        }
    }

    pub fn invalid_function(code: u8) -> Self {
        Self::InvalidFunction { code }
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_function_display() {
        let err = ModbusError::invalid_function(0x2B);
        assert_eq!(err.to_string(), "Invalid function code: 0x2B");
    }

    #[test]
    fn test_buffer_overflow_display() {
        let err = ModbusError::BufferOverflow {
            needed: 600,
            capacity: 512,
        };
        assert_eq!(
            err.to_string(),
            "Buffer overflow: 600 bytes needed, capacity 512"
        );
    }

    #[test]
    fn test_helpers_build_struct_variants() {
        assert!(matches!(
            ModbusError::frame("short"),
            ModbusError::Frame { .. }
        ));
        assert!(matches!(
            ModbusError::configuration("bad"),
            ModbusError::Configuration { .. }
        ));
        assert_eq!(
            ModbusError::transport("closed").to_string(),
            "Transport error: closed"
        );
    }
}
