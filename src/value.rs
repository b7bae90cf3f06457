//! # Typed Register Values
//!
//! Typed scalars for manual write commands and for reading typed values back
//! out of a register table. Wide values are laid out with a [`ByteOrder`].

use std::fmt;

use crate::endian::{self, ByteOrder};
use crate::error::{ModbusError, ModbusResult};

/// Value written to or read from one or more registers.
///
/// # Register Mapping
///
/// | Type | Registers | Write function |
/// |------|-----------|----------------|
/// | Bool | 1 (coil) | FC05 |
/// | U16/I16 | 1 | FC06 |
/// | U32/I32/F32 | 2 | FC16 |
/// | U64/I64/F64 | 4 | FC16 |
///
/// # Example
///
/// ```rust
/// use voltage_modbus_engine::{ByteOrder, ModbusValue};
///
/// let temp = ModbusValue::F32(25.0);
/// assert_eq!(temp.register_count(), 2);
/// assert_eq!(temp.to_registers(ByteOrder::BigEndian), vec![0x41C8, 0x0000]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModbusValue {
    Bool(bool),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    F32(f32),
    U64(u64),
    I64(i64),
    F64(f64),
}

/// Type tag used to decode registers into a [`ModbusValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Bool,
    U16,
    I16,
    U32,
    I32,
    F32,
    U64,
    I64,
    F64,
}

impl DataType {
    /// Registers occupied by one value of this type.
    #[inline]
    pub fn register_count(self) -> usize {
        match self {
            Self::Bool | Self::U16 | Self::I16 => 1,
            Self::U32 | Self::I32 | Self::F32 => 2,
            Self::U64 | Self::I64 | Self::F64 => 4,
        }
    }
}

impl ModbusValue {
    /// Convert the value to f64 for uniform numeric handling.
    #[inline]
    pub fn as_f64(&self) -> f64 {
        match self {
            ModbusValue::Bool(b) => f64::from(u8::from(*b)),
            ModbusValue::U16(v) => f64::from(*v),
            ModbusValue::I16(v) => f64::from(*v),
            ModbusValue::U32(v) => f64::from(*v),
            ModbusValue::I32(v) => f64::from(*v),
            ModbusValue::F32(v) => f64::from(*v),
            ModbusValue::U64(v) => *v as f64,
            ModbusValue::I64(v) => *v as f64,
            ModbusValue::F64(v) => *v,
        }
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        match self {
            ModbusValue::Bool(_) => DataType::Bool,
            ModbusValue::U16(_) => DataType::U16,
            ModbusValue::I16(_) => DataType::I16,
            ModbusValue::U32(_) => DataType::U32,
            ModbusValue::I32(_) => DataType::I32,
            ModbusValue::F32(_) => DataType::F32,
            ModbusValue::U64(_) => DataType::U64,
            ModbusValue::I64(_) => DataType::I64,
            ModbusValue::F64(_) => DataType::F64,
        }
    }

    /// Number of registers (or coils, for Bool) the value occupies.
    #[inline]
    pub fn register_count(&self) -> usize {
        self.data_type().register_count()
    }

    /// Register words of the value in `order`.
    ///
    /// Single-register values ignore the ordering. Bool encodes as 1/0,
    /// the form a coil table stores.
    pub fn to_registers(&self, order: ByteOrder) -> Vec<u16> {
        match *self {
            ModbusValue::Bool(b) => vec![u16::from(b)],
            ModbusValue::U16(v) => vec![v],
            ModbusValue::I16(v) => vec![v as u16],
            ModbusValue::U32(v) => endian::encode_to_vec(v, order),
            ModbusValue::I32(v) => endian::encode_to_vec(v, order),
            ModbusValue::F32(v) => endian::encode_to_vec(v, order),
            ModbusValue::U64(v) => endian::encode_to_vec(v, order),
            ModbusValue::I64(v) => endian::encode_to_vec(v, order),
            ModbusValue::F64(v) => endian::encode_to_vec(v, order),
        }
    }

    /// Decode a value of `data_type` from the leading registers of `regs`.
    pub fn from_registers(
        data_type: DataType,
        regs: &[u16],
        order: ByteOrder,
    ) -> ModbusResult<Self> {
        let first = *regs
            .first()
            .ok_or_else(|| ModbusError::invalid_data("no registers to decode"))?;
        Ok(match data_type {
            DataType::Bool => ModbusValue::Bool(first != 0),
            DataType::U16 => ModbusValue::U16(first),
            DataType::I16 => ModbusValue::I16(first as i16),
            DataType::U32 => ModbusValue::U32(endian::decode(regs, order)?),
            DataType::I32 => ModbusValue::I32(endian::decode(regs, order)?),
            DataType::F32 => ModbusValue::F32(endian::decode(regs, order)?),
            DataType::U64 => ModbusValue::U64(endian::decode(regs, order)?),
            DataType::I64 => ModbusValue::I64(endian::decode(regs, order)?),
            DataType::F64 => ModbusValue::F64(endian::decode(regs, order)?),
        })
    }
}

impl fmt::Display for ModbusValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModbusValue::Bool(v) => write!(f, "{}", v),
            ModbusValue::U16(v) => write!(f, "{}", v),
            ModbusValue::I16(v) => write!(f, "{}", v),
            ModbusValue::U32(v) => write!(f, "{}", v),
            ModbusValue::I32(v) => write!(f, "{}", v),
            ModbusValue::F32(v) => write!(f, "{}", v),
            ModbusValue::U64(v) => write!(f, "{}", v),
            ModbusValue::I64(v) => write!(f, "{}", v),
            ModbusValue::F64(v) => write!(f, "{}", v),
        }
    }
}

// ============================================================================
// From implementations for ergonomic construction
// ============================================================================

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ModbusValue {
                fn from(v: $ty) -> Self {
                    ModbusValue::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    f32 => F32,
    u64 => U64,
    i64 => I64,
    f64 => F64,
}
