//! Array allocation
//!
//! Scalars and vectors share one block with their header. Rank ≥ 2 arrays
//! get a separate flat vector plus an overlay of pointer levels.

use crate::array::{TypedArray, VectorOwnership};
use crate::datatype::Datatype;
use crate::error::{ArrayError, Result};
use crate::header::{compute_header_length, scalar_header_length, write_header, write_scalar_header};
use crate::introspect;
use crate::lifecycle;
use crate::overlay::build_overlay;
use crate::raw::{Address, Arena, ADDRESS_SIZE};
use tracing::debug;

/// Check a caller-supplied shape and return the byte size of the flat
/// vector it describes.
///
/// Rank 0 takes no element sizes, or exactly the scalar size. Otherwise
/// there is one element size per axis: the scalar size first, then the
/// pointer size for every level above it.
pub(crate) fn check_shape(datatype: Datatype, dims: &[usize], elem_sizes: &[usize]) -> Result<usize> {
    let scalar = datatype.native_size();

    if dims.is_empty() {
        return match elem_sizes {
            [] => Ok(scalar),
            [size] if *size == scalar => Ok(scalar),
            _ => Err(ArrayError::IllegalArgument(format!(
                "scalar {} takes element size {}, got {:?}",
                datatype, scalar, elem_sizes
            ))),
        };
    }

    if elem_sizes.len() != dims.len() {
        return Err(ArrayError::IllegalArgument(format!(
            "{} dimensions but {} element sizes",
            dims.len(),
            elem_sizes.len()
        )));
    }
    if elem_sizes[0] != scalar {
        return Err(ArrayError::IllegalArgument(format!(
            "innermost element size {} does not match {} ({} bytes)",
            elem_sizes[0], datatype, scalar
        )));
    }
    if let Some(bad) = elem_sizes[1..].iter().find(|&&size| size != ADDRESS_SIZE) {
        return Err(ArrayError::IllegalArgument(format!(
            "pointer level element size must be {}, got {}",
            ADDRESS_SIZE, bad
        )));
    }

    dims.iter()
        .try_fold(scalar, |bytes, &dim| bytes.checked_mul(dim))
        .ok_or_else(|| ArrayError::OutOfMemory(format!("array of dimensions {:?} overflows", dims)))
}

/// The only element-size vector `allocate` accepts for this datatype and
/// rank: the scalar size, then one pointer size per level.
pub fn default_elem_sizes(datatype: Datatype, rank: usize) -> Vec<usize> {
    let mut sizes = vec![ADDRESS_SIZE; rank];
    if let Some(first) = sizes.first_mut() {
        *first = datatype.native_size();
    }
    sizes
}

/// Allocate a zero-filled array. The rank is `dims.len()`.
pub fn allocate(
    arena: &mut Arena,
    datatype: Datatype,
    dims: &[usize],
    elem_sizes: &[usize],
) -> Result<TypedArray> {
    let vector_bytes = check_shape(datatype, dims, elem_sizes)?;

    let address = match dims.len() {
        0 => {
            let header_len = scalar_header_length();
            let block = arena.alloc(header_len + vector_bytes)?;
            let data = block.checked_add(header_len)?;
            write_scalar_header(arena, data, datatype)?;
            data
        }
        1 => {
            let header_len = compute_header_length(1)?;
            let total = vector_bytes.checked_add(header_len).ok_or_else(|| {
                ArrayError::OutOfMemory(format!("vector of {} bytes overflows", vector_bytes))
            })?;
            let block = arena.alloc(total)?;
            let data = block.checked_add(header_len)?;
            write_header(arena, data, header_len, datatype, dims, elem_sizes)?;
            data
        }
        _ => {
            let vector = arena.alloc(vector_bytes)?;
            match build_overlay(arena, datatype, dims, elem_sizes, vector) {
                Ok(top) => top,
                Err(e) => {
                    let _ = arena.release(vector);
                    return Err(e);
                }
            }
        }
    };

    debug!(
        "Allocated {} array of dimensions {:?} at {}",
        datatype, dims, address
    );
    Ok(TypedArray::new(address, VectorOwnership::Owned))
}

/// Build a rank ≥ 2 array over a vector the caller already allocated in
/// the arena. The vector is left alone by `free`.
pub fn allocate_overlay(
    arena: &mut Arena,
    datatype: Datatype,
    dims: &[usize],
    elem_sizes: &[usize],
    vector: Address,
) -> Result<TypedArray> {
    if dims.len() < 2 {
        return Err(ArrayError::IllegalArgument(format!(
            "external vectors need rank 2 or more, got rank {}",
            dims.len()
        )));
    }
    let vector_bytes = check_shape(datatype, dims, elem_sizes)?;
    if !arena.is_in_use(vector) {
        return Err(ArrayError::BadAddress(format!(
            "external vector {} is not in a live block",
            vector
        )));
    }
    // Bounds check: the whole vector must lie inside its block
    arena.bytes(vector, vector_bytes)?;

    let top = build_overlay(arena, datatype, dims, elem_sizes, vector)?;
    Ok(TypedArray::new(top, VectorOwnership::Borrowed))
}

/// Resize an array, keeping every element whose multi-index exists in both
/// shapes. New elements are zero. The old handle is freed.
pub fn reallocate(arena: &mut Arena, array: TypedArray, new_dims: &[usize]) -> Result<TypedArray> {
    let header = introspect::header(arena, array)?;

    if new_dims.len() != header.rank {
        return Err(ArrayError::Unsupported(format!(
            "changing the number of dimensions from {} to {} is not supported",
            header.rank,
            new_dims.len()
        )));
    }
    if array.is_borrowed() {
        return Err(ArrayError::Unsupported(
            "cannot resize an overlay whose vector is owned by the caller".into(),
        ));
    }
    if header.rank == 0 || new_dims == header.dims.as_slice() {
        return Ok(array);
    }

    let resized = allocate(arena, header.datatype, new_dims, &header.elem_sizes)?;

    let copied = introspect::base_vector(arena, array).and_then(|old_vector| {
        let new_vector = introspect::base_vector(arena, resized)?;
        copy_overlap(
            arena,
            old_vector,
            &header.dims,
            new_vector,
            new_dims,
            header.scalar_size(),
        )
    });
    if let Err(e) = copied {
        let _ = lifecycle::free(arena, resized);
        return Err(e);
    }

    lifecycle::free(arena, array)?;
    debug!(
        "Reallocated {} array from {:?} to {:?}",
        header.datatype, header.dims, new_dims
    );
    Ok(resized)
}

/// Copy the common sub-block of two row-major vectors, one innermost run
/// at a time.
fn copy_overlap(
    arena: &mut Arena,
    src: Address,
    src_dims: &[usize],
    dst: Address,
    dst_dims: &[usize],
    scalar: usize,
) -> Result<()> {
    let rank = src_dims.len();
    let common: Vec<usize> = src_dims
        .iter()
        .zip(dst_dims)
        .map(|(&a, &b)| a.min(b))
        .collect();
    if common.iter().any(|&d| d == 0) {
        return Ok(());
    }

    let run = common[rank - 1] * scalar;
    let mut index = vec![0usize; rank - 1];
    loop {
        let src_offset = row_offset(&index, src_dims) * scalar;
        let dst_offset = row_offset(&index, dst_dims) * scalar;
        let chunk = arena.bytes(src.checked_add(src_offset)?, run)?.to_vec();
        arena
            .bytes_mut(dst.checked_add(dst_offset)?, run)?
            .copy_from_slice(&chunk);

        // Odometer over the outer axes of the common shape
        let mut axis = rank - 1;
        loop {
            if axis == 0 {
                return Ok(());
            }
            axis -= 1;
            index[axis] += 1;
            if index[axis] < common[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
}

/// Flat element offset of the start of the innermost row at `outer`.
fn row_offset(outer: &[usize], dims: &[usize]) -> usize {
    outer
        .iter()
        .zip(dims)
        .fold(0, |acc, (&i, &d)| acc * d + i)
        * dims[dims.len() - 1]
}
