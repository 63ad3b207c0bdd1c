//! XDR codec (RFC 4506)
//!
//! Everything is big-endian and 4-byte aligned. Types of 32 bits or less,
//! including `long`, `ulong`, `hex`, `char` and `bool`, travel as one
//! 4-byte word; `int64`, `uint64` and `double` as two words, high word
//! first.
//!
//! Layout by rank:
//! - 0: one element.
//! - 1: a counted array: element count, then the elements. Strings are
//!   counted byte strings padded to a word boundary. The slot is always
//!   `round4(4 + dims[0] * element_size)` bytes.
//! - ≥ 2: `dims[0]` fixed-size sub-arrays, each laid out as the rank below.
//!
//! Structure references go out as XDR strings in slots of
//! `round4(name_length) + 4` bytes, without a count prefix.
//!
//! When a sender declares more elements than the destination holds, the
//! decoder rewrites the count word in the input buffer to the local
//! capacity and decodes only that many elements.

use super::{
    check_room, checked_product, c_strlen, no_scalar_string, no_structure_decode, row_pointer,
    structure_name, NameResolver,
};
use crate::array::TypedArray;
use crate::config::CodecOptions;
use crate::datatype::{round_up_4, Datatype};
use crate::element::{self, fixed, Value};
use crate::error::{ArrayError, Result};
use crate::introspect;
use crate::raw::{Address, Arena};
use tracing::{debug, warn};

const COUNT_SIZE: usize = 4;

#[derive(Clone, Copy, Default)]
pub struct XdrCodec<'r> {
    options: CodecOptions,
    resolver: Option<&'r dyn NameResolver>,
}

impl<'r> XdrCodec<'r> {
    pub fn new(options: CodecOptions) -> Self {
        XdrCodec {
            options,
            resolver: None,
        }
    }

    pub fn with_resolver(mut self, resolver: &'r dyn NameResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    fn structure_slot(datatype: Datatype) -> usize {
        datatype.xdr_size() + COUNT_SIZE
    }

    fn shape_len(datatype: Datatype, dims: &[usize]) -> Result<usize> {
        let too_big = || ArrayError::IllegalArgument(format!("dimensions {:?} overflow", dims));
        match dims {
            [] => {
                no_scalar_string(datatype)?;
                if datatype.is_structure_reference() {
                    Ok(Self::structure_slot(datatype))
                } else {
                    Ok(datatype.xdr_size())
                }
            }
            [n] if datatype.is_structure_reference() => {
                checked_product(&[*n], Self::structure_slot(datatype))
            }
            [n] => n
                .checked_mul(datatype.xdr_size())
                .and_then(|bytes| bytes.checked_add(COUNT_SIZE + 3))
                .map(|bytes| bytes / 4 * 4)
                .ok_or_else(too_big),
            [outer, inner @ ..] => Self::shape_len(datatype, inner)?
                .checked_mul(*outer)
                .ok_or_else(too_big),
        }
    }

    /// Exact buffer size `encode_into` needs for this array.
    pub fn encoded_len(&self, arena: &Arena, array: TypedArray) -> Result<usize> {
        let header = introspect::header(arena, array)?;
        Self::shape_len(header.datatype, &header.dims)
    }

    pub fn encode(&self, arena: &Arena, array: TypedArray) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.encoded_len(arena, array)?];
        let written = self.encode_into(arena, array, &mut buf)?;
        buf.truncate(written);
        Ok(buf)
    }

    /// Encode into `buf` and return the number of bytes written. Padding
    /// and unused string bytes are zeroed.
    pub fn encode_into(&self, arena: &Arena, array: TypedArray, buf: &mut [u8]) -> Result<usize> {
        let header = introspect::header(arena, array)?;
        let written = self.encode_level(arena, header.datatype, array.address(), &header.dims, buf)?;
        debug!(
            "XDR-encoded {} {:?} into {} bytes",
            header.datatype, header.dims, written
        );
        Ok(written)
    }

    fn encode_level(
        &self,
        arena: &Arena,
        datatype: Datatype,
        address: Address,
        dims: &[usize],
        buf: &mut [u8],
    ) -> Result<usize> {
        let needed = Self::shape_len(datatype, dims)?;
        check_room(needed, buf.len(), self.options.quiet_overflow, "XDR array")?;
        let buf = &mut buf[..needed];

        match dims {
            [] if datatype.is_structure_reference() => {
                self.encode_name(arena, datatype, address, buf)?;
            }
            [] => {
                let stored = arena.bytes(address, datatype.native_size())?;
                encode_value(datatype, element::load(datatype, stored)?, buf)?;
            }
            [n] if datatype.is_structure_reference() => {
                let slot = Self::structure_slot(datatype);
                for i in 0..*n {
                    let element = address.checked_add(i * datatype.native_size())?;
                    self.encode_name(arena, datatype, element, &mut buf[i * slot..(i + 1) * slot])?;
                }
            }
            [n] if datatype == Datatype::String => {
                let stored = arena.bytes(address, *n)?;
                let len = c_strlen(stored);
                put_count(buf, len);
                buf[COUNT_SIZE..COUNT_SIZE + len].copy_from_slice(&stored[..len]);
                buf[COUNT_SIZE + len..].fill(0);
            }
            [n] => {
                put_count(buf, *n);
                let native = datatype.native_size();
                let wire = datatype.xdr_size();
                for i in 0..*n {
                    let stored = arena.bytes(address.checked_add(i * native)?, native)?;
                    let start = COUNT_SIZE + i * wire;
                    encode_value(
                        datatype,
                        element::load(datatype, stored)?,
                        &mut buf[start..start + wire],
                    )?;
                }
            }
            [outer, inner @ ..] => {
                let sub = Self::shape_len(datatype, inner)?;
                for row in 0..*outer {
                    let row_address = row_pointer(arena, address, row)?;
                    self.encode_level(
                        arena,
                        datatype,
                        row_address,
                        inner,
                        &mut buf[row * sub..(row + 1) * sub],
                    )?;
                }
            }
        }
        Ok(needed)
    }

    fn encode_name(&self, arena: &Arena, datatype: Datatype, address: Address, slot: &mut [u8]) -> Result<()> {
        let name = structure_name(self.resolver, arena, datatype, address)?;
        put_count(slot, name.len());
        slot[COUNT_SIZE..COUNT_SIZE + name.len()].copy_from_slice(&name);
        slot[COUNT_SIZE + name.len()..].fill(0);
        Ok(())
    }

    /// Decode `buf` into the array and return the number of bytes consumed.
    ///
    /// Takes `buf` mutably: an oversized element count is rewritten in place
    /// to the number of elements actually decoded.
    pub fn decode(&self, arena: &mut Arena, array: TypedArray, buf: &mut [u8]) -> Result<usize> {
        let header = introspect::header(arena, array)?;
        no_structure_decode(header.datatype)?;
        let consumed = self.decode_level(arena, header.datatype, array.address(), &header.dims, buf)?;
        debug!(
            "XDR-decoded {} bytes into {} {:?}",
            consumed, header.datatype, header.dims
        );
        Ok(consumed)
    }

    fn decode_level(
        &self,
        arena: &mut Arena,
        datatype: Datatype,
        address: Address,
        dims: &[usize],
        buf: &mut [u8],
    ) -> Result<usize> {
        let quiet = self.options.quiet_overflow;
        match dims {
            [] => {
                let needed = Self::shape_len(datatype, dims)?;
                check_room(needed, buf.len(), quiet, "XDR scalar")?;
                let value = decode_value(datatype, &buf[..needed])?;
                element::store(datatype, value, arena.bytes_mut(address, datatype.native_size())?)?;
                Ok(needed)
            }
            [n] => {
                let count = self.take_count(buf, *n)?;
                let wire = datatype.xdr_size();
                let payload = count * wire;
                check_room(COUNT_SIZE + payload, buf.len(), quiet, "XDR array")?;
                let body = &buf[COUNT_SIZE..COUNT_SIZE + payload];

                if datatype == Datatype::String {
                    let slot = arena.bytes_mut(address, *n)?;
                    slot[..count].copy_from_slice(body);
                    slot[count..].fill(0);
                } else {
                    let native = datatype.native_size();
                    for (i, word) in body.chunks_exact(wire).enumerate() {
                        let value = decode_value(datatype, word)?;
                        let element = address.checked_add(i * native)?;
                        element::store(datatype, value, arena.bytes_mut(element, native)?)?;
                    }
                }
                Ok(round_up_4(COUNT_SIZE + payload))
            }
            [outer, inner @ ..] => {
                let needed = Self::shape_len(datatype, dims)?;
                check_room(needed, buf.len(), quiet, "XDR array")?;
                let sub = Self::shape_len(datatype, inner)?;
                for row in 0..*outer {
                    let row_address = row_pointer(arena, address, row)?;
                    self.decode_level(
                        arena,
                        datatype,
                        row_address,
                        inner,
                        &mut buf[row * sub..(row + 1) * sub],
                    )?;
                }
                Ok(needed)
            }
        }
    }

    /// Read the element count of a counted array, clamping it to
    /// `capacity` and writing the clamped value back into `buf`.
    fn take_count(&self, buf: &mut [u8], capacity: usize) -> Result<usize> {
        check_room(COUNT_SIZE, buf.len(), self.options.quiet_overflow, "XDR count")?;
        let declared = u32::from_be_bytes(fixed(&buf[..COUNT_SIZE])?) as usize;
        if declared <= capacity {
            return Ok(declared);
        }
        warn!(
            "XDR sender declared {} elements, destination holds {}; truncating",
            declared, capacity
        );
        put_count(buf, capacity);
        Ok(capacity)
    }
}

fn put_count(buf: &mut [u8], count: usize) {
    buf[..COUNT_SIZE].copy_from_slice(&(count as u32).to_be_bytes());
}

fn out_of_range(datatype: Datatype, value: Value) -> ArrayError {
    ArrayError::IllegalArgument(format!(
        "{} value {} does not fit in a 32-bit XDR word",
        datatype, value
    ))
}

fn encode_value(datatype: Datatype, value: Value, out: &mut [u8]) -> Result<()> {
    match datatype {
        Datatype::Char
        | Datatype::Int8
        | Datatype::Short
        | Datatype::Int16
        | Datatype::Int32 => out.copy_from_slice(&(value.as_i64() as i32).to_be_bytes()),
        Datatype::Long => {
            let word = i32::try_from(value.as_i64()).map_err(|_| out_of_range(datatype, value))?;
            out.copy_from_slice(&word.to_be_bytes())
        }
        Datatype::UChar
        | Datatype::UInt8
        | Datatype::UShort
        | Datatype::UInt16
        | Datatype::UInt32
        | Datatype::Bool => out.copy_from_slice(&(value.as_u64() as u32).to_be_bytes()),
        Datatype::ULong | Datatype::Hex => {
            let word = u32::try_from(value.as_u64()).map_err(|_| out_of_range(datatype, value))?;
            out.copy_from_slice(&word.to_be_bytes())
        }
        Datatype::Float => out.copy_from_slice(&(value.as_f64() as f32).to_be_bytes()),
        Datatype::Int64 => out.copy_from_slice(&value.as_i64().to_be_bytes()),
        Datatype::UInt64 => out.copy_from_slice(&value.as_u64().to_be_bytes()),
        Datatype::Double => out.copy_from_slice(&value.as_f64().to_be_bytes()),
        Datatype::String | Datatype::Record | Datatype::RecordType | Datatype::Interface => {
            return Err(ArrayError::UnsupportedDatatype(format!(
                "{} is not an XDR scalar",
                datatype
            )))
        }
    }
    Ok(())
}

fn decode_value(datatype: Datatype, word: &[u8]) -> Result<Value> {
    let value = match datatype {
        Datatype::Char
        | Datatype::Int8
        | Datatype::Short
        | Datatype::Int16
        | Datatype::Int32
        | Datatype::Long => Value::Signed(i32::from_be_bytes(fixed(word)?) as i64),
        Datatype::UChar
        | Datatype::UInt8
        | Datatype::UShort
        | Datatype::UInt16
        | Datatype::UInt32
        | Datatype::Bool
        | Datatype::ULong
        | Datatype::Hex => Value::Unsigned(u32::from_be_bytes(fixed(word)?) as u64),
        Datatype::Float => Value::Float(f32::from_be_bytes(fixed(word)?) as f64),
        Datatype::Int64 => Value::Signed(i64::from_be_bytes(fixed(word)?)),
        Datatype::UInt64 => Value::Unsigned(u64::from_be_bytes(fixed(word)?)),
        Datatype::Double => Value::Float(f64::from_be_bytes(fixed(word)?)),
        Datatype::String | Datatype::Record | Datatype::RecordType | Datatype::Interface => {
            return Err(ArrayError::UnsupportedDatatype(format!(
                "{} is not an XDR scalar",
                datatype
            )))
        }
    };
    Ok(value)
}
