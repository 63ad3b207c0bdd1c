//! Native/network codec
//!
//! Elements travel in host byte order at their native width, except the
//! `long`, `ulong` and `hex` types, whose wire width is negotiated: 32-bit
//! wire values are truncated on encode and sign- or zero-extended on
//! decode. Sign extension assumes two's-complement hosts.
//!
//! Layout by rank:
//! - 0: one element.
//! - 1: `dims[0]` elements back to back. A top-level string takes
//!   `dims[0] + 1` bytes and is always NUL-terminated.
//! - ≥ 2: `dims[0]` sub-arrays of equal size, each laid out as the rank
//!   below it. String rows inside a matrix are exactly `dims[last]` bytes.
//!
//! Structure references go out as their names in `name_length + 1` byte
//! slots and can never be decoded.

use super::{
    check_room, checked_product, c_strlen, no_scalar_string, no_structure_decode, row_pointer,
    structure_name, NameResolver,
};
use crate::array::TypedArray;
use crate::config::{CodecOptions, LongWidth};
use crate::datatype::Datatype;
use crate::element::{self, fixed, Value};
use crate::error::Result;
use crate::introspect;
use crate::raw::{Address, Arena};
use tracing::debug;

#[derive(Clone, Copy, Default)]
pub struct NativeCodec<'r> {
    options: CodecOptions,
    resolver: Option<&'r dyn NameResolver>,
}

impl<'r> NativeCodec<'r> {
    pub fn new(options: CodecOptions) -> Self {
        NativeCodec {
            options,
            resolver: None,
        }
    }

    pub fn with_resolver(mut self, resolver: &'r dyn NameResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Bytes one element occupies on the wire.
    pub fn wire_size(&self, datatype: Datatype) -> usize {
        if datatype.is_native_width() {
            self.options.long_wire_width.bytes()
        } else if datatype.is_structure_reference() {
            datatype.name_length() + 1
        } else {
            datatype.native_size()
        }
    }

    fn shape_len(&self, datatype: Datatype, dims: &[usize], nested: bool) -> Result<usize> {
        match dims {
            [] => {
                no_scalar_string(datatype)?;
                Ok(self.wire_size(datatype))
            }
            [n] if datatype == Datatype::String && !nested => Ok(n + 1),
            _ => checked_product(dims, self.wire_size(datatype)),
        }
    }

    /// Exact buffer size `encode_into` needs for this array.
    pub fn encoded_len(&self, arena: &Arena, array: TypedArray) -> Result<usize> {
        let header = introspect::header(arena, array)?;
        self.shape_len(header.datatype, &header.dims, false)
    }

    pub fn encode(&self, arena: &Arena, array: TypedArray) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; self.encoded_len(arena, array)?];
        let written = self.encode_into(arena, array, &mut buf)?;
        buf.truncate(written);
        Ok(buf)
    }

    /// Encode into `buf` and return the number of bytes written.
    pub fn encode_into(&self, arena: &Arena, array: TypedArray, buf: &mut [u8]) -> Result<usize> {
        let header = introspect::header(arena, array)?;
        let written = self.encode_level(arena, header.datatype, array.address(), &header.dims, buf, false)?;
        debug!(
            "Native-encoded {} {:?} into {} bytes",
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
        nested: bool,
    ) -> Result<usize> {
        let needed = self.shape_len(datatype, dims, nested)?;
        check_room(needed, buf.len(), self.options.quiet_overflow, "native array")?;

        match dims {
            [] => self.encode_element(arena, datatype, address, &mut buf[..needed])?,
            [n] if datatype == Datatype::String => {
                let stored = arena.bytes(address, *n)?;
                let len = if nested { *n } else { c_strlen(stored) };
                buf[..len].copy_from_slice(&stored[..len]);
                buf[len..needed].fill(0);
            }
            [n] => {
                let native = datatype.native_size();
                let wire = self.wire_size(datatype);
                for i in 0..*n {
                    self.encode_element(
                        arena,
                        datatype,
                        address.checked_add(i * native)?,
                        &mut buf[i * wire..(i + 1) * wire],
                    )?;
                }
            }
            [outer, inner @ ..] => {
                let sub = self.shape_len(datatype, inner, true)?;
                for row in 0..*outer {
                    let row_address = row_pointer(arena, address, row)?;
                    self.encode_level(
                        arena,
                        datatype,
                        row_address,
                        inner,
                        &mut buf[row * sub..(row + 1) * sub],
                        true,
                    )?;
                }
            }
        }
        Ok(needed)
    }

    fn encode_element(&self, arena: &Arena, datatype: Datatype, address: Address, out: &mut [u8]) -> Result<()> {
        if datatype.is_structure_reference() {
            let name = structure_name(self.resolver, arena, datatype, address)?;
            out[..name.len()].copy_from_slice(&name);
            out[name.len()..].fill(0);
            return Ok(());
        }

        let stored = arena.bytes(address, datatype.native_size())?;
        if !datatype.is_native_width() {
            out.copy_from_slice(stored);
            return Ok(());
        }

        let value = element::load(datatype, stored)?;
        match (self.options.long_wire_width, datatype) {
            (LongWidth::Bits32, Datatype::Long) => {
                out.copy_from_slice(&(value.as_i64() as i32).to_ne_bytes())
            }
            (LongWidth::Bits32, _) => out.copy_from_slice(&(value.as_u64() as u32).to_ne_bytes()),
            (LongWidth::Bits64, Datatype::Long) => out.copy_from_slice(&value.as_i64().to_ne_bytes()),
            (LongWidth::Bits64, _) => out.copy_from_slice(&value.as_u64().to_ne_bytes()),
        }
        Ok(())
    }

    /// Decode `buf` into the array and return the number of bytes consumed.
    ///
    /// A vector takes as many whole elements as `buf` holds, up to its
    /// length. Higher ranks need the full encoded size.
    pub fn decode(&self, arena: &mut Arena, array: TypedArray, buf: &[u8]) -> Result<usize> {
        let header = introspect::header(arena, array)?;
        no_structure_decode(header.datatype)?;
        let consumed = self.decode_level(arena, header.datatype, array.address(), &header.dims, buf, false)?;
        debug!(
            "Native-decoded {} bytes into {} {:?}",
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
        buf: &[u8],
        nested: bool,
    ) -> Result<usize> {
        match dims {
            [] => {
                let needed = self.shape_len(datatype, dims, nested)?;
                check_room(needed, buf.len(), self.options.quiet_overflow, "native scalar")?;
                self.decode_element(arena, datatype, address, &buf[..needed])?;
                Ok(needed)
            }
            [n] if datatype == Datatype::String => {
                let n = *n;
                let (copy, consumed) = if nested {
                    check_room(n, buf.len(), self.options.quiet_overflow, "native string row")?;
                    (n, n)
                } else {
                    let len = c_strlen(buf).min(n);
                    (len, (len + 1).min(buf.len()))
                };
                let slot = arena.bytes_mut(address, n)?;
                slot[..copy].copy_from_slice(&buf[..copy]);
                slot[copy..].fill(0);
                Ok(consumed)
            }
            [n] => {
                let native = datatype.native_size();
                let wire = self.wire_size(datatype);
                let count = (buf.len() / wire).min(*n);
                for i in 0..count {
                    self.decode_element(
                        arena,
                        datatype,
                        address.checked_add(i * native)?,
                        &buf[i * wire..(i + 1) * wire],
                    )?;
                }
                Ok(count * wire)
            }
            [outer, inner @ ..] => {
                let needed = self.shape_len(datatype, dims, nested)?;
                check_room(needed, buf.len(), self.options.quiet_overflow, "native array")?;
                let sub = self.shape_len(datatype, inner, true)?;
                for row in 0..*outer {
                    let row_address = row_pointer(arena, address, row)?;
                    self.decode_level(
                        arena,
                        datatype,
                        row_address,
                        inner,
                        &buf[row * sub..(row + 1) * sub],
                        true,
                    )?;
                }
                Ok(needed)
            }
        }
    }

    fn decode_element(&self, arena: &mut Arena, datatype: Datatype, address: Address, wire: &[u8]) -> Result<()> {
        let slot = arena.bytes_mut(address, datatype.native_size())?;
        if !datatype.is_native_width() {
            slot.copy_from_slice(wire);
            return Ok(());
        }

        let signed = datatype == Datatype::Long;
        let value = match (self.options.long_wire_width, signed) {
            (LongWidth::Bits32, true) => Value::Signed(i32::from_ne_bytes(fixed(wire)?) as i64),
            (LongWidth::Bits32, false) => Value::Unsigned(u32::from_ne_bytes(fixed(wire)?) as u64),
            (LongWidth::Bits64, true) => Value::Signed(i64::from_ne_bytes(fixed(wire)?)),
            (LongWidth::Bits64, false) => Value::Unsigned(u64::from_ne_bytes(fixed(wire)?)),
        };
        element::store(datatype, value, slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{get, read_elements, read_string, set, write_elements, write_string};
    use crate::allocator::allocate;
    use crate::codec::NameTable;
    use crate::error::ArrayError;

    fn codec() -> NativeCodec<'static> {
        NativeCodec::new(CodecOptions::default())
    }

    #[test]
    fn test_scalar_round_trip() {
        let mut arena = Arena::new();
        let src = allocate(&mut arena, Datatype::Double, &[], &[]).unwrap();
        set::<f64>(&mut arena, src, &[], -12.75).unwrap();
        let bytes = codec().encode(&arena, src).unwrap();
        assert_eq!(bytes, (-12.75f64).to_ne_bytes());

        let dst = allocate(&mut arena, Datatype::Double, &[], &[]).unwrap();
        codec().decode(&mut arena, dst, &bytes).unwrap();
        assert_eq!(get::<f64>(&arena, dst, &[]).unwrap(), -12.75);
    }

    #[test]
    fn test_long_negotiation() {
        let mut arena = Arena::new();
        let src = allocate(&mut arena, Datatype::Long, &[3], &[std::mem::size_of::<isize>()]).unwrap();
        write_elements::<isize>(&mut arena, src, &[-1, 7, isize::MIN]).unwrap();

        let narrow = codec().encode(&arena, src).unwrap();
        assert_eq!(narrow.len(), 12);
        assert_eq!(&narrow[..4], &(-1i32).to_ne_bytes());

        let wide_codec = NativeCodec::new(CodecOptions::default().with_long_width(LongWidth::Bits64));
        let wide = wide_codec.encode(&arena, src).unwrap();
        assert_eq!(wide.len(), 24);

        let dst = allocate(&mut arena, Datatype::Long, &[3], &[std::mem::size_of::<isize>()]).unwrap();
        codec().decode(&mut arena, dst, &narrow).unwrap();
        let back = read_elements::<isize>(&arena, dst).unwrap();
        assert_eq!(&back[..2], &[-1, 7]);
        // 32-bit wire truncates isize::MIN to 0
        assert_eq!(back[2], 0);
    }

    #[test]
    fn test_ulong_zero_extends() {
        let mut arena = Arena::new();
        let dst = allocate(&mut arena, Datatype::ULong, &[], &[]).unwrap();
        codec().decode(&mut arena, dst, &u32::MAX.to_ne_bytes()).unwrap();
        assert_eq!(get::<usize>(&arena, dst, &[]).unwrap(), u32::MAX as usize);
    }

    #[test]
    fn test_string_vector_terminated() {
        let mut arena = Arena::new();
        let src = allocate(&mut arena, Datatype::String, &[5], &[1]).unwrap();
        write_string(&mut arena, src, &[], "abcde").unwrap();

        let bytes = codec().encode(&arena, src).unwrap();
        assert_eq!(bytes, b"abcde\0");

        let dst = allocate(&mut arena, Datatype::String, &[3], &[1]).unwrap();
        codec().decode(&mut arena, dst, &bytes).unwrap();
        assert_eq!(read_string(&arena, dst, &[]).unwrap(), "abc");
    }

    #[test]
    fn test_string_matrix_rows() {
        let mut arena = Arena::new();
        let src = allocate(&mut arena, Datatype::String, &[2, 4], &[1, 8]).unwrap();
        write_string(&mut arena, src, &[0], "ab").unwrap();
        write_string(&mut arena, src, &[1], "wxyz").unwrap();

        let bytes = codec().encode(&arena, src).unwrap();
        assert_eq!(bytes, b"ab\0\0wxyz");

        let dst = allocate(&mut arena, Datatype::String, &[2, 4], &[1, 8]).unwrap();
        codec().decode(&mut arena, dst, &bytes).unwrap();
        assert_eq!(read_string(&arena, dst, &[1]).unwrap(), "wxyz");
    }

    #[test]
    fn test_buffer_too_small() {
        let mut arena = Arena::new();
        let src = allocate(&mut arena, Datatype::Int32, &[2, 3], &[4, 8]).unwrap();
        let mut buf = [0u8; 20];
        let err = codec().encode_into(&arena, src, &mut buf).unwrap_err();
        assert_eq!(err.missing(), Some(4));
        assert!(!err.is_quiet());

        let quiet = NativeCodec::new(CodecOptions::default().quiet());
        assert!(quiet.encode_into(&arena, src, &mut buf).unwrap_err().is_quiet());
    }

    #[test]
    fn test_short_vector_source() {
        let mut arena = Arena::new();
        let dst = allocate(&mut arena, Datatype::Int16, &[4], &[2]).unwrap();
        let mut source = Vec::new();
        source.extend_from_slice(&5i16.to_ne_bytes());
        source.extend_from_slice(&6i16.to_ne_bytes());
        assert_eq!(codec().decode(&mut arena, dst, &source).unwrap(), 4);
        assert_eq!(read_elements::<i16>(&arena, dst).unwrap(), vec![5, 6, 0, 0]);
    }

    #[test]
    fn test_structure_names() {
        let mut arena = Arena::new();
        let records = allocate(&mut arena, Datatype::Record, &[2], &[8]).unwrap();
        write_elements::<u64>(&mut arena, records, &[10, 11]).unwrap();

        let mut names = NameTable::new();
        names.insert(10, "theta").insert(11, "two_theta");
        let codec = NativeCodec::new(CodecOptions::default()).with_resolver(&names);

        let bytes = codec.encode(&arena, records).unwrap();
        assert_eq!(bytes.len(), 2 * 41);
        assert_eq!(&bytes[..6], b"theta\0");
        assert_eq!(&bytes[41..50], b"two_theta");

        assert!(matches!(
            codec.decode(&mut arena, records, &bytes),
            Err(ArrayError::UnsupportedDatatype(_))
        ));
    }

    #[test]
    fn test_scalar_string_unsupported() {
        let mut arena = Arena::new();
        let array = allocate(&mut arena, Datatype::String, &[], &[]).unwrap();
        assert!(matches!(
            codec().encode(&arena, array),
            Err(ArrayError::Unsupported(_))
        ));
    }
}
