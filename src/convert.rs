//! Element-wise copy between arrays of different datatypes

use crate::array::TypedArray;
use crate::element;
use crate::error::{ArrayError, Result};
use crate::introspect;
use crate::raw::Arena;
use tracing::debug;

/// Copy every element of `src` into `dst`, converting between datatypes.
///
/// Both arrays must be numeric (char and bool included) and hold the same
/// number of elements; a scalar matches a one-element array of any rank.
/// Integers wrap like `as` casts and floats round half away from zero.
pub fn convert_and_copy(arena: &mut Arena, src: TypedArray, dst: TypedArray) -> Result<()> {
    let src_header = introspect::header(arena, src)?;
    let dst_header = introspect::header(arena, dst)?;

    for datatype in [src_header.datatype, dst_header.datatype] {
        if !datatype.is_numeric() {
            return Err(ArrayError::UnsupportedDatatype(format!(
                "cannot convert {} elements",
                datatype
            )));
        }
    }
    let count = src_header.element_count();
    if count != dst_header.element_count() {
        return Err(ArrayError::IllegalArgument(format!(
            "source has {} elements {:?}, destination has {} {:?}",
            count,
            src_header.dims,
            dst_header.element_count(),
            dst_header.dims
        )));
    }

    let src_size = src_header.scalar_size();
    let dst_size = dst_header.scalar_size();
    let src_base = introspect::base_vector(arena, src)?;
    let values = arena
        .bytes(src_base, src_header.byte_count())?
        .chunks_exact(src_size)
        .map(|bytes| element::load(src_header.datatype, bytes))
        .collect::<Result<Vec<_>>>()?;

    let dst_base = introspect::base_vector(arena, dst)?;
    let out = arena.bytes_mut(dst_base, dst_header.byte_count())?;
    for (value, slot) in values.into_iter().zip(out.chunks_exact_mut(dst_size)) {
        element::store(dst_header.datatype, value, slot)?;
    }

    debug!(
        "Converted {} elements from {} to {}",
        count, src_header.datatype, dst_header.datatype
    );
    Ok(())
}
