//! # Register Word Ordering
//!
//! Conversion between 32/64-bit scalars and runs of 16-bit Modbus registers.
//! Devices disagree on how a wide value is laid out over consecutive
//! registers, so every conversion names its [`ByteOrder`].
//!
//! ## Naming Convention
//!
//! Uses ABCD notation where:
//! - A = Most significant byte (MSB)
//! - B = Second byte
//! - C = Third byte
//! - D = Least significant byte (LSB)
//!
//! For 32-bit value `0x12345678` the registers on the wire are:
//! - `BigEndian (ABCD)`: \[0x1234, 0x5678\]
//! - `BigEndianByteSwap (BADC)`: \[0x3412, 0x7856\]
//! - `LittleEndian (CDAB)`: \[0x5678, 0x1234\]
//! - `LittleEndianByteSwap (DCBA)`: \[0x7856, 0x3412\]
//!
//! 64-bit values extend the same pattern over four registers.

use std::fmt;

use crate::error::{ModbusError, ModbusResult};

/// Layout of a multi-register value on the wire.
///
/// # Example
///
/// ```rust
/// use voltage_modbus_engine::ByteOrder;
///
/// let order = ByteOrder::from_str("CDAB").unwrap();
/// assert_eq!(order, ByteOrder::LittleEndian);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ByteOrder {
    /// ABCD: most significant register first, bytes big-endian
    #[default]
    BigEndian,

    /// BADC: registers in big-endian order, bytes inside each register swapped
    BigEndianByteSwap,

    /// CDAB: least significant register first, bytes big-endian
    ///
    /// The most common "word swapped" layout on PLCs.
    LittleEndian,

    /// DCBA: the full byte sequence reversed
    LittleEndianByteSwap,
}

impl ByteOrder {
    /// All orderings, handy for exhaustive checks.
    pub const ALL: [ByteOrder; 4] = [
        ByteOrder::BigEndian,
        ByteOrder::BigEndianByteSwap,
        ByteOrder::LittleEndian,
        ByteOrder::LittleEndianByteSwap,
    ];

    /// Parse the usual textual spellings.
    ///
    /// - "ABCD", "BE", "BIG_ENDIAN" → BigEndian
    /// - "BADC", "BIG_ENDIAN_BYTE_SWAP" → BigEndianByteSwap
    /// - "CDAB", "LE", "LITTLE_ENDIAN" → LittleEndian
    /// - "DCBA", "LITTLE_ENDIAN_BYTE_SWAP" → LittleEndianByteSwap
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_' && *c != ' ')
            .map(|c| c.to_ascii_uppercase())
            .collect();
        match normalized.as_str() {
            "ABCD" | "BE" | "BIGENDIAN" | "ABCDEFGH" => Some(Self::BigEndian),
            "BADC" | "BIGENDIANBYTESWAP" | "BADCFEHG" => Some(Self::BigEndianByteSwap),
            "CDAB" | "LE" | "LITTLEENDIAN" | "GHEFCDAB" => Some(Self::LittleEndian),
            "DCBA" | "LITTLEENDIANBYTESWAP" | "HGFEDCBA" => Some(Self::LittleEndianByteSwap),
            _ => None,
        }
    }

    /// Get descriptive name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BigEndian => "ABCD (Big-Endian)",
            Self::BigEndianByteSwap => "BADC (Big-Endian Byte Swap)",
            Self::LittleEndian => "CDAB (Little-Endian)",
            Self::LittleEndianByteSwap => "DCBA (Little-Endian Byte Swap)",
        }
    }

    /// Reorder between the big-endian value bytes and the wire bytes.
    ///
    /// Every ordering is its own inverse, so the same permutation serves
    /// both directions. `bytes.len()` must be even.
    #[inline]
    fn permute(&self, bytes: &mut [u8]) {
        match self {
            Self::BigEndian => {}
            Self::LittleEndianByteSwap => bytes.reverse(),
            Self::BigEndianByteSwap => {
                for pair in bytes.chunks_exact_mut(2) {
                    pair.swap(0, 1);
                }
            }
            Self::LittleEndian => {
                // reverse the register order, keep each register's bytes
                bytes.reverse();
                for pair in bytes.chunks_exact_mut(2) {
                    pair.swap(0, 1);
                }
            }
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Scalar Types
// ============================================================================

/// Scalar that spans a whole number of registers.
pub trait RegisterScalar: Copy {
    /// Number of 16-bit registers the value occupies.
    const WORDS: usize;

    /// Write the big-endian bytes of `self` into `out` (`WORDS * 2` bytes).
    fn write_be(self, out: &mut [u8]);

    /// Read a value from its big-endian bytes (`WORDS * 2` bytes).
    fn read_be(bytes: &[u8]) -> Self;
}

macro_rules! register_scalar {
    ($($ty:ty => $words:expr),* $(,)?) => {
        $(
            impl RegisterScalar for $ty {
                const WORDS: usize = $words;

                #[inline]
                fn write_be(self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_be_bytes());
                }

                #[inline]
                fn read_be(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_be_bytes(raw)
                }
            }
        )*
    };
}

register_scalar! {
    i32 => 2,
    u32 => 2,
    f32 => 2,
    i64 => 4,
    u64 => 4,
    f64 => 4,
}

// ============================================================================
// Generic Conversions
// ============================================================================

/// Decode a scalar from the leading registers of `regs`.
///
/// Registers beyond `T::WORDS` are ignored.
pub fn decode<T: RegisterScalar>(regs: &[u16], order: ByteOrder) -> ModbusResult<T> {
    if regs.len() < T::WORDS {
        return Err(ModbusError::invalid_data(format!(
            "need {} registers, got {}",
            T::WORDS,
            regs.len()
        )));
    }

    let mut buf = [0u8; 8];
    let bytes = &mut buf[..T::WORDS * 2];
    for (i, reg) in regs[..T::WORDS].iter().enumerate() {
        bytes[i * 2..i * 2 + 2].copy_from_slice(&reg.to_be_bytes());
    }
    order.permute(bytes);
    Ok(T::read_be(bytes))
}

/// Encode a scalar into the leading registers of `out`.
pub fn encode<T: RegisterScalar>(value: T, order: ByteOrder, out: &mut [u16]) -> ModbusResult<()> {
    if out.len() < T::WORDS {
        return Err(ModbusError::invalid_data(format!(
            "need {} registers, buffer holds {}",
            T::WORDS,
            out.len()
        )));
    }

    let mut buf = [0u8; 8];
    let bytes = &mut buf[..T::WORDS * 2];
    value.write_be(bytes);
    order.permute(bytes);
    for (i, reg) in out[..T::WORDS].iter_mut().enumerate() {
        *reg = u16::from_be_bytes([bytes[i * 2], bytes[i * 2 + 1]]);
    }
    Ok(())
}

/// Encode a scalar into a freshly allocated register vector.
///
/// # Example
///
/// ```rust
/// use voltage_modbus_engine::{endian, ByteOrder};
///
/// let regs = endian::encode_to_vec(0x12345678u32, ByteOrder::LittleEndian);
/// assert_eq!(regs, vec![0x5678, 0x1234]);
/// ```
pub fn encode_to_vec<T: RegisterScalar>(value: T, order: ByteOrder) -> Vec<u16> {
    let mut out = vec![0u16; T::WORDS];
    // the buffer is sized from T::WORDS, so encoding cannot fail
    let _ = encode(value, order, &mut out);
    out
}

// ============================================================================
// Named Conversions
// ============================================================================

#[inline]
pub fn from_big_endian<T: RegisterScalar>(regs: &[u16]) -> ModbusResult<T> {
    decode(regs, ByteOrder::BigEndian)
}

#[inline]
pub fn from_big_endian_byte_swap<T: RegisterScalar>(regs: &[u16]) -> ModbusResult<T> {
    decode(regs, ByteOrder::BigEndianByteSwap)
}

#[inline]
pub fn from_little_endian<T: RegisterScalar>(regs: &[u16]) -> ModbusResult<T> {
    decode(regs, ByteOrder::LittleEndian)
}

#[inline]
pub fn from_little_endian_byte_swap<T: RegisterScalar>(regs: &[u16]) -> ModbusResult<T> {
    decode(regs, ByteOrder::LittleEndianByteSwap)
}

#[inline]
pub fn to_big_endian<T: RegisterScalar>(value: T, out: &mut [u16]) -> ModbusResult<()> {
    encode(value, ByteOrder::BigEndian, out)
}

#[inline]
pub fn to_big_endian_byte_swap<T: RegisterScalar>(value: T, out: &mut [u16]) -> ModbusResult<()> {
    encode(value, ByteOrder::BigEndianByteSwap, out)
}

#[inline]
pub fn to_little_endian<T: RegisterScalar>(value: T, out: &mut [u16]) -> ModbusResult<()> {
    encode(value, ByteOrder::LittleEndian, out)
}

#[inline]
pub fn to_little_endian_byte_swap<T: RegisterScalar>(
    value: T,
    out: &mut [u16],
) -> ModbusResult<()> {
    encode(value, ByteOrder::LittleEndianByteSwap, out)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_valid() {
        assert_eq!(ByteOrder::from_str("ABCD"), Some(ByteOrder::BigEndian));
        assert_eq!(ByteOrder::from_str("ab-cd"), Some(ByteOrder::BigEndian));
        assert_eq!(
            ByteOrder::from_str("big_endian_byte_swap"),
            Some(ByteOrder::BigEndianByteSwap)
        );
        assert_eq!(ByteOrder::from_str("LE"), Some(ByteOrder::LittleEndian));
        assert_eq!(ByteOrder::from_str("CDAB"), Some(ByteOrder::LittleEndian));
        assert_eq!(
            ByteOrder::from_str("GHEFCDAB"),
            Some(ByteOrder::LittleEndian)
        );
        assert_eq!(
            ByteOrder::from_str("DCBA"),
            Some(ByteOrder::LittleEndianByteSwap)
        );
        assert_eq!(
            ByteOrder::from_str("HGFEDCBA"),
            Some(ByteOrder::LittleEndianByteSwap)
        );
    }

    #[test]
    fn test_from_str_invalid() {
        assert_eq!(ByteOrder::from_str("invalid"), None);
        assert_eq!(ByteOrder::from_str(""), None);
    }

    #[test]
    fn test_default() {
        assert_eq!(ByteOrder::default(), ByteOrder::BigEndian);
    }

    #[test]
    fn test_u32_wire_layout_all_orders() {
        let value = 0x12345678u32;
        assert_eq!(
            encode_to_vec(value, ByteOrder::BigEndian),
            vec![0x1234, 0x5678]
        );
        assert_eq!(
            encode_to_vec(value, ByteOrder::BigEndianByteSwap),
            vec![0x3412, 0x7856]
        );
        assert_eq!(
            encode_to_vec(value, ByteOrder::LittleEndian),
            vec![0x5678, 0x1234]
        );
        assert_eq!(
            encode_to_vec(value, ByteOrder::LittleEndianByteSwap),
            vec![0x7856, 0x3412]
        );
    }

    #[test]
    fn test_u64_wire_layout_all_orders() {
        let value = 0x1122334455667788u64;
        assert_eq!(
            encode_to_vec(value, ByteOrder::BigEndian),
            vec![0x1122, 0x3344, 0x5566, 0x7788]
        );
        assert_eq!(
            encode_to_vec(value, ByteOrder::BigEndianByteSwap),
            vec![0x2211, 0x4433, 0x6655, 0x8877]
        );
        assert_eq!(
            encode_to_vec(value, ByteOrder::LittleEndian),
            vec![0x7788, 0x5566, 0x3344, 0x1122]
        );
        assert_eq!(
            encode_to_vec(value, ByteOrder::LittleEndianByteSwap),
            vec![0x8877, 0x6655, 0x4433, 0x2211]
        );
    }

    #[test]
    fn test_f32_known_value() {
        // 25.0 in IEEE 754: 0x41C80000
        let value: f32 = from_big_endian(&[0x41C8, 0x0000]).unwrap();
        assert!((value - 25.0).abs() < f32::EPSILON);

        let value: f32 = from_little_endian(&[0x0000, 0x41C8]).unwrap();
        assert!((value - 25.0).abs() < f32::EPSILON);

        let value: f32 = from_little_endian_byte_swap(&[0x0000, 0xC841]).unwrap();
        assert!((value - 25.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_little_endian_reads_word_swapped_registers() {
        assert_eq!(
            from_little_endian::<u32>(&[0x5678, 0x1234]).unwrap(),
            0x12345678
        );
        assert_eq!(
            from_little_endian_byte_swap::<u32>(&[0x7856, 0x3412]).unwrap(),
            0x12345678
        );
        assert_eq!(
            from_little_endian::<u64>(&[0x7788, 0x5566, 0x3344, 0x1122]).unwrap(),
            0x1122334455667788
        );
    }

    #[test]
    fn test_i32_roundtrip() {
        let value = -123_456_789i32;
        for order in ByteOrder::ALL {
            let regs = encode_to_vec(value, order);
            let decoded: i32 = decode(&regs, order).unwrap();
            assert_eq!(decoded, value, "Roundtrip failed for {:?}", order);
        }
    }

    #[test]
    fn test_i64_roundtrip() {
        let value = i64::MIN + 12345;
        for order in ByteOrder::ALL {
            let regs = encode_to_vec(value, order);
            let decoded: i64 = decode(&regs, order).unwrap();
            assert_eq!(decoded, value, "Roundtrip failed for {:?}", order);
        }
    }

    #[test]
    fn test_f64_roundtrip() {
        let value = 123456.789012345f64;
        for order in ByteOrder::ALL {
            let regs = encode_to_vec(value, order);
            let decoded: f64 = decode(&regs, order).unwrap();
            assert_eq!(
                decoded.to_bits(),
                value.to_bits(),
                "Roundtrip failed for {:?}",
                order
            );
        }
    }

    #[test]
    fn test_named_functions_match_generic() {
        let mut out = [0u16; 2];
        to_big_endian_byte_swap(0xA1B2C3D4u32, &mut out).unwrap();
        assert_eq!(out, [0xB2A1, 0xD4C3]);
        assert_eq!(from_big_endian_byte_swap::<u32>(&out).unwrap(), 0xA1B2C3D4);

        to_little_endian(0xA1B2C3D4u32, &mut out).unwrap();
        assert_eq!(from_little_endian::<u32>(&out).unwrap(), 0xA1B2C3D4);

        to_big_endian(7u32, &mut out).unwrap();
        assert_eq!(out, [0, 7]);

        to_little_endian(7u32, &mut out).unwrap();
        assert_eq!(out, [7, 0]);

        to_little_endian_byte_swap(7u32, &mut out).unwrap();
        assert_eq!(out, [0x0700, 0]);
    }

    #[test]
    fn test_short_buffer_is_error() {
        assert!(from_big_endian::<u64>(&[0x0001, 0x0002]).is_err());
        let mut out = [0u16; 3];
        assert!(to_little_endian(1.0f64, &mut out).is_err());
    }

    #[test]
    fn test_extra_registers_ignored() {
        let value: u32 = from_big_endian(&[0x0000, 0x0010, 0xFFFF]).unwrap();
        assert_eq!(value, 0x10);
    }
}
