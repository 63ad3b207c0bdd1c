//! Releasing arrays
//!
//! `free` stamps the header freed before any block goes back to the
//! arena. Released blocks keep their bytes until reused, so a second
//! `free` (or any other use) of a stale handle finds `MAGIC_FREED` and is
//! reported instead of silently succeeding. That detection is best effort:
//! once the arena hands the block out again the old header is gone.

use crate::array::{TypedArray, VectorOwnership};
use crate::error::{ArrayError, Result};
use crate::header::{mark_freed, read_header};
use crate::overlay::collect_levels;
use crate::raw::{Address, Arena};
use tracing::{debug, warn};

/// Release an array and every pointer level it owns.
///
/// The flat vector under a rank ≥ 2 overlay is released only when the
/// handle owns it.
pub fn free(arena: &mut Arena, array: TypedArray) -> Result<()> {
    let data = array.address();
    let header = read_header(arena, data)?;
    let header_start = data.checked_sub(header.header_bytes())?;

    if header.rank <= 1 {
        release_all(arena, data, &[header_start])?;
        debug!("Freed rank-{} {} array at {}", header.rank, header.datatype, data);
        return Ok(());
    }

    let levels = collect_levels(arena, data, header.rank)?;

    // Inner pointer levels are bare blocks
    let mut blocks: Vec<Address> = levels[1..header.rank - 1].to_vec();
    blocks.push(header_start);
    match array.vector_ownership() {
        VectorOwnership::Owned => blocks.push(levels[0]),
        VectorOwnership::Borrowed => {
            debug!("Leaving borrowed vector {} in place", levels[0]);
        }
    }
    release_all(arena, data, &blocks)?;

    debug!(
        "Freed rank-{} {} array at {} ({} pointer level(s))",
        header.rank,
        header.datatype,
        data,
        header.rank - 1
    );
    Ok(())
}

/// Stamp the header freed and release `blocks`.
///
/// Every block is checked before anything changes, so a stale or corrupt
/// level leaves the array live and whole. Once the header is stamped every
/// release is attempted and the first failure is returned.
fn release_all(arena: &mut Arena, data: Address, blocks: &[Address]) -> Result<()> {
    if let Some(&bad) = blocks
        .iter()
        .find(|&&block| block.offset() != 0 || !arena.is_in_use(block))
    {
        return Err(ArrayError::BadAddress(format!(
            "array at {} points at {}, which is not a live block",
            data, bad
        )));
    }

    mark_freed(arena, data)?;
    let mut first_error = None;
    for &block in blocks {
        if let Err(err) = arena.release(block) {
            warn!("Could not release block {} of array at {}: {}", block, data, err);
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}
