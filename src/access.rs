//! Element access through the overlay
//!
//! Typed reads and writes accept any plain-old-data `T` whose size matches
//! the array's scalar size. Indices are checked against the header before
//! any pointer level is followed.

use crate::array::TypedArray;
use crate::datatype::Datatype;
use crate::error::{ArrayError, Result};
use crate::header::ArrayHeader;
use crate::introspect;
use crate::raw::{Address, Arena, ADDRESS_SIZE};
use zerocopy::{FromBytes, Immutable, IntoBytes};

fn check_width<T>(header: &ArrayHeader) -> Result<()> {
    let width = std::mem::size_of::<T>();
    if width != header.scalar_size() {
        return Err(ArrayError::IllegalArgument(format!(
            "{}-byte element type used on a {} array ({} bytes)",
            width,
            header.datatype,
            header.scalar_size()
        )));
    }
    Ok(())
}

fn check_index(header: &ArrayHeader, index: &[usize]) -> Result<()> {
    if index.len() != header.rank {
        return Err(ArrayError::IllegalArgument(format!(
            "{} indices given for a rank-{} array",
            index.len(),
            header.rank
        )));
    }
    check_bounds(&header.dims, index)
}

fn check_bounds(dims: &[usize], index: &[usize]) -> Result<()> {
    for (axis, (&i, &dim)) in index.iter().zip(dims).enumerate() {
        if i >= dim {
            return Err(ArrayError::IllegalArgument(format!(
                "index {} out of range for axis {} of length {}",
                i, axis, dim
            )));
        }
    }
    Ok(())
}

/// Walk the pointer levels down to the row holding the innermost axis.
fn row_address(arena: &Arena, top: Address, outer: &[usize]) -> Result<Address> {
    let mut address = top;
    for &i in outer {
        address = arena
            .read_address(address.checked_add(i * ADDRESS_SIZE)?)?
            .ok_or_else(|| ArrayError::CorruptHeader(format!("null row pointer at {}", address)))?;
    }
    Ok(address)
}

fn locate(arena: &Arena, array: TypedArray, header: &ArrayHeader, index: &[usize]) -> Result<Address> {
    check_index(header, index)?;
    match index.split_last() {
        None => Ok(array.address()),
        Some((&last, outer)) => {
            let row = row_address(arena, array.address(), outer)?;
            row.checked_add(last * header.scalar_size())
        }
    }
}

/// Address of the scalar at `index` (one index per axis, outermost first).
pub fn element_address(arena: &Arena, array: TypedArray, index: &[usize]) -> Result<Address> {
    let header = introspect::header(arena, array)?;
    locate(arena, array, &header, index)
}

pub fn get<T: FromBytes>(arena: &Arena, array: TypedArray, index: &[usize]) -> Result<T> {
    let header = introspect::header(arena, array)?;
    check_width::<T>(&header)?;
    let address = locate(arena, array, &header, index)?;
    let bytes = arena.bytes(address, header.scalar_size())?;
    T::read_from_bytes(bytes)
        .map_err(|_| ArrayError::IllegalArgument(format!("cannot read element at {}", address)))
}

pub fn set<T: IntoBytes + Immutable>(
    arena: &mut Arena,
    array: TypedArray,
    index: &[usize],
    value: T,
) -> Result<()> {
    let header = introspect::header(arena, array)?;
    check_width::<T>(&header)?;
    let address = locate(arena, array, &header, index)?;
    arena
        .bytes_mut(address, header.scalar_size())?
        .copy_from_slice(value.as_bytes());
    Ok(())
}

/// The flat vector as raw bytes, row-major.
pub fn vector_bytes(arena: &Arena, array: TypedArray) -> Result<&[u8]> {
    let header = introspect::header(arena, array)?;
    let base = introspect::base_vector(arena, array)?;
    arena.bytes(base, header.byte_count())
}

/// Copy the whole flat vector out, row-major.
pub fn read_elements<T: FromBytes>(arena: &Arena, array: TypedArray) -> Result<Vec<T>> {
    let header = introspect::header(arena, array)?;
    check_width::<T>(&header)?;
    vector_bytes(arena, array)?
        .chunks_exact(header.scalar_size())
        .map(|chunk| {
            T::read_from_bytes(chunk)
                .map_err(|_| ArrayError::IllegalArgument("cannot read element".into()))
        })
        .collect()
}

/// Overwrite the whole flat vector. `values` must hold exactly one value
/// per element.
pub fn write_elements<T: IntoBytes + Immutable>(
    arena: &mut Arena,
    array: TypedArray,
    values: &[T],
) -> Result<()> {
    let header = introspect::header(arena, array)?;
    check_width::<T>(&header)?;
    if values.len() != header.element_count() {
        return Err(ArrayError::IllegalArgument(format!(
            "{} values given for {} elements",
            values.len(),
            header.element_count()
        )));
    }
    let base = introspect::base_vector(arena, array)?;
    arena
        .bytes_mut(base, header.byte_count())?
        .copy_from_slice(values.as_bytes());
    Ok(())
}

/// Locate the string row selected by `row` (one index per axis except the
/// innermost) and return its address and capacity.
fn string_row(
    arena: &Arena,
    array: TypedArray,
    row: &[usize],
) -> Result<(Address, usize)> {
    let header = introspect::header(arena, array)?;
    if header.datatype != Datatype::String || header.rank == 0 {
        return Err(ArrayError::UnsupportedDatatype(format!(
            "string access on a rank-{} {} array",
            header.rank, header.datatype
        )));
    }
    if row.len() + 1 != header.rank {
        return Err(ArrayError::IllegalArgument(format!(
            "{} row indices given for a rank-{} string array",
            row.len(),
            header.rank
        )));
    }
    check_bounds(&header.dims, row)?;
    let address = row_address(arena, array.address(), row)?;
    Ok((address, header.dims[header.rank - 1]))
}

/// Read one string up to its first NUL. Invalid UTF-8 is replaced.
pub fn read_string(arena: &Arena, array: TypedArray, row: &[usize]) -> Result<String> {
    let (address, capacity) = string_row(arena, array, row)?;
    let bytes = arena.bytes(address, capacity)?;
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(capacity);
    Ok(String::from_utf8_lossy(&bytes[..len]).into_owned())
}

/// Store one string, NUL-padding the rest of its row. A string longer
/// than the row is rejected.
pub fn write_string(arena: &mut Arena, array: TypedArray, row: &[usize], value: &str) -> Result<()> {
    let (address, capacity) = string_row(arena, array, row)?;
    if value.len() > capacity {
        return Err(ArrayError::WouldExceedLimit {
            needed: value.len(),
            available: capacity,
            quiet: false,
        });
    }
    let slot = arena.bytes_mut(address, capacity)?;
    slot[..value.len()].copy_from_slice(value.as_bytes());
    slot[value.len()..].fill(0);
    Ok(())
}
