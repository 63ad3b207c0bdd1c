//! Pointer-level overlays for rank ≥ 2 arrays
//!
//! Level 0 is the flat vector. Level `k` (1..rank) holds one address per
//! row of level `k - 1`, so level 1 has `product(dims[..rank-1])` slots and
//! the outermost level (`rank - 1`) has `dims[0]`. The outermost level
//! carries the array header and is what the handle points at.
//!
//! Every level reserves at least one slot. When an axis is empty, slot 0
//! still points at the level below so the vector stays reachable for
//! introspection and `free`.

use crate::datatype::Datatype;
use crate::error::{ArrayError, Result};
use crate::header::{compute_header_length, write_header};
use crate::raw::{Address, Arena, ADDRESS_SIZE};
use tracing::{debug, warn};

/// Number of pointers level `level` holds (not counting the reserved slot).
pub(crate) fn level_len(dims: &[usize], level: usize) -> usize {
    dims[..dims.len() - level].iter().product()
}

fn level_bytes(dims: &[usize], elem_sizes: &[usize], level: usize) -> Result<usize> {
    level_len(dims, level)
        .max(1)
        .checked_mul(elem_sizes[level])
        .ok_or_else(|| ArrayError::OutOfMemory(format!("pointer level {} overflows", level)))
}

/// Build the pointer levels above `vector` and return the address of the
/// outermost level, which is preceded by the array header.
///
/// On failure every level allocated so far is released again. `vector`
/// itself is never allocated or released here.
pub fn build_overlay(
    arena: &mut Arena,
    datatype: Datatype,
    dims: &[usize],
    elem_sizes: &[usize],
    vector: Address,
) -> Result<Address> {
    let rank = dims.len();
    if rank < 2 {
        return Err(ArrayError::IllegalArgument(format!(
            "overlay requested for rank {}, scalars and vectors carry no pointer levels",
            rank
        )));
    }
    if elem_sizes.len() != rank {
        return Err(ArrayError::IllegalArgument(format!(
            "{} dimensions but {} element sizes",
            rank,
            elem_sizes.len()
        )));
    }

    let header_len = compute_header_length(rank)?;
    let mut blocks = Vec::with_capacity(rank - 1);

    let result = allocate_levels(arena, dims, elem_sizes, header_len, vector, &mut blocks)
        .and_then(|levels| {
            wire_levels(arena, dims, elem_sizes, &levels)?;
            let top = levels[rank - 1];
            write_header(arena, top, header_len, datatype, dims, elem_sizes)?;
            Ok(top)
        });

    match result {
        Ok(top) => {
            debug!(
                "Built rank-{} {} overlay at {} over vector {}",
                rank, datatype, top, vector
            );
            Ok(top)
        }
        Err(e) => {
            warn!(
                "Overlay build failed, releasing {} level(s): {}",
                blocks.len(),
                e
            );
            for block in blocks {
                let _ = arena.release(block);
            }
            Err(e)
        }
    }
}

/// Allocate levels outermost first. Returns the data address of every
/// level, indexed by level number, with `levels[0] == vector`.
fn allocate_levels(
    arena: &mut Arena,
    dims: &[usize],
    elem_sizes: &[usize],
    header_len: usize,
    vector: Address,
    blocks: &mut Vec<Address>,
) -> Result<Vec<Address>> {
    let rank = dims.len();
    let mut levels = vec![vector; rank];

    for level in (1..rank).rev() {
        let bytes = level_bytes(dims, elem_sizes, level)?;
        if level == rank - 1 {
            let total = bytes.checked_add(header_len).ok_or_else(|| {
                ArrayError::OutOfMemory("top pointer level overflows".into())
            })?;
            let block = arena.alloc(total)?;
            blocks.push(block);
            levels[level] = block.checked_add(header_len)?;
        } else {
            let block = arena.alloc(bytes)?;
            blocks.push(block);
            levels[level] = block;
        }
    }
    Ok(levels)
}

/// Point each slot of level `k` at its row in level `k - 1`.
fn wire_levels(
    arena: &mut Arena,
    dims: &[usize],
    elem_sizes: &[usize],
    levels: &[Address],
) -> Result<()> {
    let rank = dims.len();
    for level in 1..rank {
        let below = levels[level - 1];
        let stride = elem_sizes[level - 1] * dims[rank - level];
        let slots = level_len(dims, level);

        if slots == 0 {
            arena.write_address(levels[level], Some(below))?;
            continue;
        }
        for index in 0..slots {
            let slot = levels[level].checked_add(index * elem_sizes[level])?;
            let target = below.checked_add(index * stride)?;
            arena.write_address(slot, Some(target))?;
        }
    }
    Ok(())
}

/// Follow slot 0 down from the outermost level. Returns every level's data
/// address indexed by level number; `levels[0]` is the vector.
pub(crate) fn collect_levels(arena: &Arena, top: Address, rank: usize) -> Result<Vec<Address>> {
    let mut levels = vec![top; rank.max(1)];
    for level in (1..rank).rev() {
        levels[level - 1] = arena.read_address(levels[level])?.ok_or_else(|| {
            ArrayError::CorruptHeader(format!("null pointer in level {} at {}", level, levels[level]))
        })?;
    }
    Ok(levels)
}
