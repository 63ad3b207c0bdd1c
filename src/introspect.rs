//! Header-driven queries on array handles

use crate::array::TypedArray;
use crate::error::Result;
use crate::header::{self, ArrayHeader, HandleState};
use crate::overlay::collect_levels;
use crate::raw::{Address, Arena};
use std::fmt::Write;

/// Classify the handle without side effects.
pub fn validate(arena: &Arena, array: TypedArray) -> HandleState {
    header::probe(arena, array.address())
}

/// Full header of a live array.
pub fn header(arena: &Arena, array: TypedArray) -> Result<ArrayHeader> {
    header::read_header(arena, array.address())
}

pub fn element_count(arena: &Arena, array: TypedArray) -> Result<u64> {
    Ok(header(arena, array)?.element_count() as u64)
}

pub fn byte_count(arena: &Arena, array: TypedArray) -> Result<u64> {
    Ok(header(arena, array)?.byte_count() as u64)
}

/// Address of the flat vector: the handle itself for rank 0 and 1, the
/// bottom of the overlay otherwise.
pub fn base_vector(arena: &Arena, array: TypedArray) -> Result<Address> {
    let header = header(arena, array)?;
    if header.rank <= 1 {
        return Ok(array.address());
    }
    Ok(collect_levels(arena, array.address(), header.rank)?[0])
}

/// Multi-line description of the header for diagnostics. Freed and foreign
/// handles get a one-line description instead of an error.
pub fn dump(arena: &Arena, array: TypedArray) -> Result<String> {
    let state = validate(arena, array);
    if state != HandleState::Live {
        return Ok(format!("Array at {}: {}\n", array.address(), state));
    }

    let header = header(arena, array)?;
    let mut out = String::new();
    let _ = writeln!(out, "Array at {}", array.address());
    let _ = writeln!(out, "  magic         = {:#x} ({})", header.magic, state);
    let _ = writeln!(
        out,
        "  header length = {} words ({} bytes)",
        header.header_words,
        header.header_bytes()
    );
    let _ = writeln!(
        out,
        "  datatype      = {} ({})",
        header.datatype,
        header.datatype.code()
    );
    let _ = writeln!(out, "  rank          = {}", header.rank);
    for (axis, dim) in header.dims.iter().enumerate() {
        let _ = writeln!(
            out,
            "  dimension[{}]  = {}, element size[{}] = {}",
            axis, dim, axis, header.elem_sizes[axis]
        );
    }
    if header.rank == 0 {
        let _ = writeln!(out, "  element size  = {}", header.scalar_size());
    }
    let _ = writeln!(
        out,
        "  elements      = {} ({} bytes)",
        header.element_count(),
        header.byte_count()
    );
    if array.is_borrowed() {
        let _ = writeln!(out, "  vector        = borrowed");
    }
    Ok(out)
}
