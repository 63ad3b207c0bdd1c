//! Scalar element values
//!
//! Every numeric datatype loads into a [`Value`] and stores back from one.
//! Codecs and conversions go through this instead of matching on raw
//! widths themselves.

use crate::datatype::{Datatype, NativeLong, NativeULong};
use crate::error::{ArrayError, Result};
use std::fmt;

/// One numeric element, widened losslessly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl Value {
    /// Two's-complement view; floats round half away from zero.
    pub fn as_i64(&self) -> i64 {
        match *self {
            Value::Signed(v) => v,
            Value::Unsigned(v) => v as i64,
            Value::Float(v) => v.round() as i64,
        }
    }

    pub fn as_u64(&self) -> u64 {
        match *self {
            Value::Signed(v) => v as u64,
            Value::Unsigned(v) => v,
            Value::Float(v) if v < 0.0 => v.round() as i64 as u64,
            Value::Float(v) => v.round() as u64,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Value::Signed(v) => v as f64,
            Value::Unsigned(v) => v as f64,
            Value::Float(v) => v,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Signed(v) => write!(f, "{}", v),
            Value::Unsigned(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
        }
    }
}

fn not_numeric(datatype: Datatype) -> ArrayError {
    ArrayError::UnsupportedDatatype(format!("{} elements are not numeric", datatype))
}

pub(crate) fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| {
        ArrayError::IllegalArgument(format!(
            "element slice of {} bytes, expected {}",
            bytes.len(),
            N
        ))
    })
}

/// Load one element stored in native layout.
pub fn load(datatype: Datatype, bytes: &[u8]) -> Result<Value> {
    let value = match datatype {
        Datatype::Char | Datatype::Int8 => Value::Signed(i8::from_ne_bytes(fixed(bytes)?) as i64),
        Datatype::UChar | Datatype::UInt8 => Value::Unsigned(u8::from_ne_bytes(fixed(bytes)?) as u64),
        Datatype::Short | Datatype::Int16 => {
            Value::Signed(i16::from_ne_bytes(fixed(bytes)?) as i64)
        }
        Datatype::UShort | Datatype::UInt16 => {
            Value::Unsigned(u16::from_ne_bytes(fixed(bytes)?) as u64)
        }
        Datatype::Int32 => Value::Signed(i32::from_ne_bytes(fixed(bytes)?) as i64),
        Datatype::UInt32 | Datatype::Bool => {
            Value::Unsigned(u32::from_ne_bytes(fixed(bytes)?) as u64)
        }
        Datatype::Int64 => Value::Signed(i64::from_ne_bytes(fixed(bytes)?)),
        Datatype::UInt64 => Value::Unsigned(u64::from_ne_bytes(fixed(bytes)?)),
        Datatype::Long => Value::Signed(NativeLong::from_ne_bytes(fixed(bytes)?) as i64),
        Datatype::ULong | Datatype::Hex => {
            Value::Unsigned(NativeULong::from_ne_bytes(fixed(bytes)?) as u64)
        }
        Datatype::Float => Value::Float(f32::from_ne_bytes(fixed(bytes)?) as f64),
        Datatype::Double => Value::Float(f64::from_ne_bytes(fixed(bytes)?)),
        Datatype::String | Datatype::Record | Datatype::RecordType | Datatype::Interface => {
            return Err(not_numeric(datatype))
        }
    };
    Ok(value)
}

/// Store `value` into one element, converting with `as` semantics.
/// Booleans store 1 for any non-zero value.
pub fn store(datatype: Datatype, value: Value, bytes: &mut [u8]) -> Result<()> {
    let expected = datatype.native_size();
    if bytes.len() != expected {
        return Err(ArrayError::IllegalArgument(format!(
            "element slice of {} bytes, {} needs {}",
            bytes.len(),
            datatype,
            expected
        )));
    }
    match datatype {
        Datatype::Char | Datatype::Int8 => bytes.copy_from_slice(&(value.as_i64() as i8).to_ne_bytes()),
        Datatype::UChar | Datatype::UInt8 => bytes.copy_from_slice(&(value.as_u64() as u8).to_ne_bytes()),
        Datatype::Short | Datatype::Int16 => {
            bytes.copy_from_slice(&(value.as_i64() as i16).to_ne_bytes())
        }
        Datatype::UShort | Datatype::UInt16 => {
            bytes.copy_from_slice(&(value.as_u64() as u16).to_ne_bytes())
        }
        Datatype::Int32 => bytes.copy_from_slice(&(value.as_i64() as i32).to_ne_bytes()),
        Datatype::UInt32 => bytes.copy_from_slice(&(value.as_u64() as u32).to_ne_bytes()),
        Datatype::Bool => {
            let flag = match value {
                Value::Float(v) => v != 0.0,
                other => other.as_u64() != 0,
            };
            bytes.copy_from_slice(&(flag as u32).to_ne_bytes())
        }
        Datatype::Int64 => bytes.copy_from_slice(&value.as_i64().to_ne_bytes()),
        Datatype::UInt64 => bytes.copy_from_slice(&value.as_u64().to_ne_bytes()),
        Datatype::Long => bytes.copy_from_slice(&(value.as_i64() as NativeLong).to_ne_bytes()),
        Datatype::ULong | Datatype::Hex => {
            bytes.copy_from_slice(&(value.as_u64() as NativeULong).to_ne_bytes())
        }
        Datatype::Float => bytes.copy_from_slice(&(value.as_f64() as f32).to_ne_bytes()),
        Datatype::Double => bytes.copy_from_slice(&value.as_f64().to_ne_bytes()),
        Datatype::String | Datatype::Record | Datatype::RecordType | Datatype::Interface => {
            return Err(not_numeric(datatype))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(datatype: Datatype, value: Value) -> Value {
        let mut slot = vec![0u8; datatype.native_size()];
        store(datatype, value, &mut slot).unwrap();
        load(datatype, &slot).unwrap()
    }

    #[test]
    fn test_wraps_like_as() {
        assert_eq!(round_trip(Datatype::UInt8, Value::Signed(-1)), Value::Unsigned(255));
        assert_eq!(round_trip(Datatype::Int16, Value::Unsigned(40000)), Value::Signed(-25536));
        assert_eq!(round_trip(Datatype::Int8, Value::Signed(300)), Value::Signed(44));
    }

    #[test]
    fn test_float_to_integer_rounds_away_from_zero() {
        assert_eq!(round_trip(Datatype::Int32, Value::Float(2.5)), Value::Signed(3));
        assert_eq!(round_trip(Datatype::Int32, Value::Float(-2.5)), Value::Signed(-3));
        assert_eq!(round_trip(Datatype::UInt16, Value::Float(7.4)), Value::Unsigned(7));
    }

    #[test]
    fn test_bool_normalises() {
        assert_eq!(round_trip(Datatype::Bool, Value::Signed(42)), Value::Unsigned(1));
        assert_eq!(round_trip(Datatype::Bool, Value::Float(0.0)), Value::Unsigned(0));
    }

    #[test]
    fn test_float_precision() {
        assert_eq!(round_trip(Datatype::Float, Value::Float(0.5)), Value::Float(0.5));
        assert_eq!(
            round_trip(Datatype::Double, Value::Float(std::f64::consts::PI)),
            Value::Float(std::f64::consts::PI)
        );
    }

    #[test]
    fn test_rejects_strings() {
        assert!(matches!(
            load(Datatype::String, &[0]),
            Err(ArrayError::UnsupportedDatatype(_))
        ));
        let mut slot = [0u8; 8];
        assert!(store(Datatype::Record, Value::Signed(1), &mut slot).is_err());
    }

    #[test]
    fn test_wrong_slot_size() {
        let mut slot = [0u8; 2];
        assert!(matches!(
            store(Datatype::Int32, Value::Signed(1), &mut slot),
            Err(ArrayError::IllegalArgument(_))
        ));
    }
}
