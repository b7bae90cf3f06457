//! # Session Configuration
//!
//! Settings fixed when a session is created: the wire encapsulation, the
//! role it plays and the master's timing.

use crate::constants::{DEFAULT_RECV_TIMEOUT_MS, DEFAULT_TICK_MS, MIN_RECV_TIMEOUT_MS};
use crate::error::{ModbusError, ModbusResult};
use crate::protocol::{Protocol, Role};

/// Configuration of one master or slave session.
///
/// # Example
///
/// ```rust
/// use voltage_modbus_engine::{Protocol, Role, SessionConfig};
///
/// let config = SessionConfig::new(Protocol::Tcp, Role::Master)
///     .with_recv_timeout_ms(500)
///     .with_tick_ms(5);
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.recv_timeout_ms, 500);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Wire encapsulation
    pub protocol: Protocol,
    /// Master or slave
    pub role: Role,
    /// Master: how long to wait for a reply before giving up
    pub recv_timeout_ms: u64,
    /// Driver: resolution of the scan/send tick
    pub tick_ms: u64,
}

impl SessionConfig {
    pub fn new(protocol: Protocol, role: Role) -> Self {
        Self {
            protocol,
            role,
            recv_timeout_ms: DEFAULT_RECV_TIMEOUT_MS,
            tick_ms: DEFAULT_TICK_MS,
        }
    }

    /// Master session over `protocol` with default timing.
    pub fn master(protocol: Protocol) -> Self {
        Self::new(protocol, Role::Master)
    }

    /// Slave session over `protocol`.
    pub fn slave(protocol: Protocol) -> Self {
        Self::new(protocol, Role::Slave)
    }

    pub fn with_recv_timeout_ms(mut self, recv_timeout_ms: u64) -> Self {
        self.recv_timeout_ms = recv_timeout_ms;
        self
    }

    pub fn with_tick_ms(mut self, tick_ms: u64) -> Self {
        self.tick_ms = tick_ms;
        self
    }

    pub fn validate(&self) -> ModbusResult<()> {
        validate_recv_timeout(self.recv_timeout_ms)?;
        if self.tick_ms == 0 {
            return Err(ModbusError::configuration("tick resolution must be positive"));
        }
        Ok(())
    }
}

/// Reject receive timeouts below the supported minimum.
pub(crate) fn validate_recv_timeout(timeout_ms: u64) -> ModbusResult<()> {
    if timeout_ms < MIN_RECV_TIMEOUT_MS {
        return Err(ModbusError::configuration(format!(
            "receive timeout {} ms is below the minimum of {} ms",
            timeout_ms, MIN_RECV_TIMEOUT_MS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::master(Protocol::Rtu);
        assert_eq!(config.role, Role::Master);
        assert_eq!(config.recv_timeout_ms, 300);
        assert_eq!(config.tick_ms, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timeout_minimum() {
        assert!(SessionConfig::master(Protocol::Rtu)
            .with_recv_timeout_ms(200)
            .validate()
            .is_ok());
        assert!(matches!(
            SessionConfig::master(Protocol::Rtu)
                .with_recv_timeout_ms(199)
                .validate(),
            Err(ModbusError::Configuration { .. })
        ));
    }

    #[test]
    fn test_zero_tick_rejected() {
        assert!(SessionConfig::slave(Protocol::Ascii)
            .with_tick_ms(0)
            .validate()
            .is_err());
    }
}
