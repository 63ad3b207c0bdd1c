//! Element datatypes
//!
//! Codes match the ones the record framework hands out, so they can be
//! stored verbatim in array headers and data files.

use crate::error::{ArrayError, Result};
use crate::raw::ADDRESS_SIZE;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Native storage for the negotiable-width `long` type
pub type NativeLong = isize;

/// Native storage for the negotiable-width `ulong` and `hex` types
pub type NativeULong = usize;

/// Scalar kind of every element in an array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Datatype {
    /// Fixed-length, NUL-padded byte string
    String = 1,
    Char = 2,
    UChar = 3,
    Short = 4,
    UShort = 5,
    /// 32-bit, only 0 and 1 are legal
    Bool = 6,
    Long = 8,
    ULong = 9,
    Float = 10,
    Double = 11,
    /// Stored as a `ulong`, displayed in hexadecimal
    Hex = 12,
    Int64 = 14,
    UInt64 = 15,
    Int8 = 16,
    UInt8 = 17,
    Int16 = 18,
    UInt16 = 19,
    Int32 = 20,
    UInt32 = 21,
    Record = 31,
    RecordType = 32,
    Interface = 33,
}

const ALL: [Datatype; 22] = [
    Datatype::String,
    Datatype::Char,
    Datatype::UChar,
    Datatype::Short,
    Datatype::UShort,
    Datatype::Bool,
    Datatype::Long,
    Datatype::ULong,
    Datatype::Float,
    Datatype::Double,
    Datatype::Hex,
    Datatype::Int64,
    Datatype::UInt64,
    Datatype::Int8,
    Datatype::UInt8,
    Datatype::Int16,
    Datatype::UInt16,
    Datatype::Int32,
    Datatype::UInt32,
    Datatype::Record,
    Datatype::RecordType,
    Datatype::Interface,
];

impl Datatype {
    pub fn all() -> &'static [Datatype] {
        &ALL
    }

    pub fn code(&self) -> u32 {
        *self as u32
    }

    pub fn from_code(code: u32) -> Option<Datatype> {
        ALL.iter().copied().find(|dt| dt.code() == code)
    }

    /// Bytes one element occupies in memory.
    pub fn native_size(&self) -> usize {
        match self {
            Datatype::String | Datatype::Char | Datatype::UChar => 1,
            Datatype::Int8 | Datatype::UInt8 => 1,
            Datatype::Short | Datatype::UShort | Datatype::Int16 | Datatype::UInt16 => 2,
            Datatype::Bool | Datatype::Int32 | Datatype::UInt32 | Datatype::Float => 4,
            Datatype::Long => std::mem::size_of::<NativeLong>(),
            Datatype::ULong | Datatype::Hex => std::mem::size_of::<NativeULong>(),
            Datatype::Int64 | Datatype::UInt64 | Datatype::Double => 8,
            Datatype::Record | Datatype::RecordType | Datatype::Interface => ADDRESS_SIZE,
        }
    }

    /// Bytes one element occupies in an XDR stream.
    pub fn xdr_size(&self) -> usize {
        match self {
            Datatype::String => 1,
            Datatype::Int64 | Datatype::UInt64 | Datatype::Double => 8,
            Datatype::Record | Datatype::RecordType | Datatype::Interface => {
                round_up_4(self.name_length())
            }
            _ => 4,
        }
    }

    /// Maximum name length of a structure reference, 0 for plain data.
    pub fn name_length(&self) -> usize {
        match self {
            Datatype::Record => 40,
            Datatype::RecordType => 32,
            Datatype::Interface => 121,
            _ => 0,
        }
    }

    pub fn is_structure_reference(&self) -> bool {
        matches!(
            self,
            Datatype::Record | Datatype::RecordType | Datatype::Interface
        )
    }

    /// `long` and `ulong` have a negotiable wire width; `hex` rides along
    /// since it is stored as a `ulong`.
    pub fn is_native_width(&self) -> bool {
        matches!(self, Datatype::Long | Datatype::ULong | Datatype::Hex)
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            Datatype::Char
                | Datatype::Short
                | Datatype::Long
                | Datatype::Int8
                | Datatype::Int16
                | Datatype::Int32
                | Datatype::Int64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Datatype::Float | Datatype::Double)
    }

    /// Types that convert to and from numbers: everything but strings and
    /// structure references.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Datatype::String) && !self.is_structure_reference()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Datatype::String => "string",
            Datatype::Char => "char",
            Datatype::UChar => "uchar",
            Datatype::Short => "short",
            Datatype::UShort => "ushort",
            Datatype::Bool => "bool",
            Datatype::Long => "long",
            Datatype::ULong => "ulong",
            Datatype::Float => "float",
            Datatype::Double => "double",
            Datatype::Hex => "hex",
            Datatype::Int64 => "int64",
            Datatype::UInt64 => "uint64",
            Datatype::Int8 => "int8",
            Datatype::UInt8 => "uint8",
            Datatype::Int16 => "int16",
            Datatype::UInt16 => "uint16",
            Datatype::Int32 => "int32",
            Datatype::UInt32 => "uint32",
            Datatype::Record => "record",
            Datatype::RecordType => "recordtype",
            Datatype::Interface => "interface",
        }
    }

    /// Case-insensitive lookup by name
    pub fn from_name(name: &str) -> Result<Datatype> {
        ALL.iter()
            .copied()
            .find(|dt| dt.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                ArrayError::IllegalArgument(format!(
                    "datatype name '{}' does not correspond to a valid datatype",
                    name
                ))
            })
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Datatype {
    type Err = ArrayError;

    fn from_str(s: &str) -> Result<Self> {
        Datatype::from_name(s)
    }
}

pub(crate) fn round_up_4(n: usize) -> usize {
    n.div_ceil(4) * 4
}

/// Human-readable name for a datatype code, including unknown codes.
pub fn datatype_name_from_code(code: usize) -> String {
    match u32::try_from(code).ok().and_then(Datatype::from_code) {
        Some(dt) => dt.name().to_string(),
        None if code == 0 => "none".to_string(),
        None => format!("unknown ({})", code),
    }
}
