//! Array header codec
//!
//! The header sits immediately before the data it describes and is read
//! backward from the data address. Word `i` lives at
//! `data - (i + 1) * WORD_SIZE`:
//!
//! ```text
//!   ... padding | elem sizes | dims | rank | dtype | len | magic | data ...
//!                 4+r..4+2r   4..4+r    3      2       1     0
//! ```
//!
//! Dimensions are stored outermost first, element sizes innermost
//! (scalar) first. All words are native-width and native byte order. The
//! header is padded at its far end so `data` stays `MAX_ALIGN`-aligned.

use crate::datatype::Datatype;
use crate::error::{ArrayError, IdentityViolation, Result};
use crate::raw::{Address, Arena, ADDRESS_SIZE, MAX_ALIGN, WORD_SIZE};
use serde::Serialize;
use std::fmt;
use tracing::error;

/// Magic word of a live array
pub const MAGIC_LIVE: usize = 0x5DA7_A11C;

/// Magic word written by `free`
pub const MAGIC_FREED: usize = 0xDEAD_A11C;

const MAGIC_WORD: usize = 0;
const LENGTH_WORD: usize = 1;
const DATATYPE_WORD: usize = 2;
const RANK_WORD: usize = 3;
const FIXED_WORDS: usize = 4;

/// Result of probing an address for an array header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HandleState {
    Live,
    Freed,
    NotAnArray,
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleState::Live => f.write_str("live"),
            HandleState::Freed => f.write_str("freed"),
            HandleState::NotAnArray => f.write_str("not an array"),
        }
    }
}

/// Decoded header of a live array.
///
/// For rank 0 `dims` is empty and `elem_sizes` holds the scalar size alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArrayHeader {
    pub magic: usize,
    pub header_words: usize,
    pub datatype: Datatype,
    pub rank: usize,
    pub dims: Vec<usize>,
    pub elem_sizes: Vec<usize>,
}

impl ArrayHeader {
    pub fn header_bytes(&self) -> usize {
        self.header_words * WORD_SIZE
    }

    pub fn scalar_size(&self) -> usize {
        self.elem_sizes[0]
    }

    /// Product of the dimensions, 1 for a scalar.
    pub fn element_count(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn byte_count(&self) -> usize {
        self.element_count() * self.scalar_size()
    }
}

fn header_bytes_for(axis_slots: usize) -> usize {
    let raw = (FIXED_WORDS + 2 * axis_slots) * WORD_SIZE;
    raw.div_ceil(MAX_ALIGN) * MAX_ALIGN
}

/// Bytes reserved in front of the data for an array of `rank` axes,
/// rounded up to `MAX_ALIGN`.
pub fn compute_header_length(rank: usize) -> Result<usize> {
    if rank < 1 {
        return Err(ArrayError::IllegalArgument(format!(
            "header length requested for rank {}, rank must be at least 1",
            rank
        )));
    }
    Ok(header_bytes_for(rank))
}

/// Header length for a rank-0 scalar, which reserves one axis slot.
pub(crate) fn scalar_header_length() -> usize {
    header_bytes_for(1)
}

fn word_address(data: Address, index: usize) -> Result<Address> {
    data.checked_sub((index + 1) * WORD_SIZE)
}

/// Write a live header for `dims.len()` axes immediately before `data`.
pub fn write_header(
    arena: &mut Arena,
    data: Address,
    header_len: usize,
    datatype: Datatype,
    dims: &[usize],
    elem_sizes: &[usize],
) -> Result<()> {
    let needed = compute_header_length(dims.len())?;
    if elem_sizes.len() != dims.len() {
        return Err(ArrayError::IllegalArgument(format!(
            "{} dimensions but {} element sizes",
            dims.len(),
            elem_sizes.len()
        )));
    }
    write_words(arena, data, header_len, needed, datatype, dims.len(), dims, elem_sizes)
}

/// Write the header of a rank-0 scalar: one reserved axis slot holding a
/// dimension of 1 and the scalar size, with the rank word left at 0.
pub(crate) fn write_scalar_header(
    arena: &mut Arena,
    data: Address,
    datatype: Datatype,
) -> Result<()> {
    let header_len = scalar_header_length();
    write_words(
        arena,
        data,
        header_len,
        header_len,
        datatype,
        0,
        &[1],
        &[datatype.native_size()],
    )
}

#[allow(clippy::too_many_arguments)]
fn write_words(
    arena: &mut Arena,
    data: Address,
    header_len: usize,
    needed: usize,
    datatype: Datatype,
    rank: usize,
    dims: &[usize],
    elem_sizes: &[usize],
) -> Result<()> {
    if header_len < needed || header_len % MAX_ALIGN != 0 {
        return Err(ArrayError::IllegalArgument(format!(
            "header length {} is too short or misaligned (need {})",
            header_len, needed
        )));
    }
    if data.offset() < header_len {
        return Err(ArrayError::BadAddress(format!(
            "no room for a {}-byte header before {}",
            header_len, data
        )));
    }

    let total_words = header_len / WORD_SIZE;
    let mut words = vec![0usize; total_words];
    words[MAGIC_WORD] = MAGIC_LIVE;
    words[LENGTH_WORD] = total_words;
    words[DATATYPE_WORD] = datatype.code() as usize;
    words[RANK_WORD] = rank;
    words[FIXED_WORDS..FIXED_WORDS + dims.len()].copy_from_slice(dims);
    words[FIXED_WORDS + dims.len()..FIXED_WORDS + dims.len() + elem_sizes.len()]
        .copy_from_slice(elem_sizes);

    for (index, word) in words.into_iter().enumerate() {
        arena.write_word(word_address(data, index)?, word)?;
    }
    Ok(())
}

/// Classify `data` by its magic word. Never fails; anything unreadable is
/// `NotAnArray`.
pub fn probe(arena: &Arena, data: Address) -> HandleState {
    match word_address(data, MAGIC_WORD).and_then(|addr| arena.read_word(addr)) {
        Ok(MAGIC_LIVE) => HandleState::Live,
        Ok(MAGIC_FREED) => HandleState::Freed,
        _ => HandleState::NotAnArray,
    }
}

/// Log an identity violation and turn it into an error, or abort if the
/// arena is configured to fail fast.
pub(crate) fn identity_violation(
    arena: &Arena,
    address: Address,
    state: IdentityViolation,
) -> ArrayError {
    error!("Handle at {} is {}", address, state);
    if arena.config().abort_on_identity_violation {
        std::process::abort();
    }
    ArrayError::CorruptOrFreedHandle { address, state }
}

/// Read and validate the header before `data`. The magic word is checked
/// before any other field is trusted.
pub fn read_header(arena: &Arena, data: Address) -> Result<ArrayHeader> {
    match probe(arena, data) {
        HandleState::Live => {}
        HandleState::Freed => {
            return Err(identity_violation(arena, data, IdentityViolation::Freed))
        }
        HandleState::NotAnArray => {
            return Err(identity_violation(
                arena,
                data,
                IdentityViolation::NotAnArray,
            ))
        }
    }

    let word = |index: usize| word_address(data, index).and_then(|addr| arena.read_word(addr));

    let header_words = word(LENGTH_WORD)?;
    let code = word(DATATYPE_WORD)?;
    let rank = word(RANK_WORD)?;
    let slots = rank.max(1);

    let min_words = FIXED_WORDS
        .checked_add(slots.saturating_mul(2))
        .unwrap_or(usize::MAX);
    if header_words < min_words || header_words.saturating_mul(WORD_SIZE) > data.offset() {
        return Err(ArrayError::CorruptHeader(format!(
            "header at {} claims {} words for rank {}",
            data, header_words, rank
        )));
    }

    let datatype = u32::try_from(code)
        .ok()
        .and_then(Datatype::from_code)
        .ok_or_else(|| {
            ArrayError::CorruptHeader(format!("unknown datatype code {} at {}", code, data))
        })?;

    let mut dims = Vec::with_capacity(slots);
    for index in FIXED_WORDS..FIXED_WORDS + slots {
        dims.push(word(index)?);
    }
    let mut elem_sizes = Vec::with_capacity(slots);
    for index in FIXED_WORDS + slots..FIXED_WORDS + 2 * slots {
        elem_sizes.push(word(index)?);
    }

    if elem_sizes[0] != datatype.native_size() {
        return Err(ArrayError::CorruptHeader(format!(
            "scalar size {} does not match {} ({} bytes)",
            elem_sizes[0],
            datatype,
            datatype.native_size()
        )));
    }
    if let Some(bad) = elem_sizes.iter().skip(1).find(|&&size| size != ADDRESS_SIZE) {
        return Err(ArrayError::CorruptHeader(format!(
            "pointer level element size {} at {}",
            bad, data
        )));
    }

    if rank == 0 {
        dims.clear();
    }

    Ok(ArrayHeader {
        magic: MAGIC_LIVE,
        header_words,
        datatype,
        rank,
        dims,
        elem_sizes,
    })
}

/// Stamp the header freed: magic becomes `MAGIC_FREED` and the length word
/// is zeroed.
pub(crate) fn mark_freed(arena: &mut Arena, data: Address) -> Result<()> {
    arena.write_word(word_address(data, MAGIC_WORD)?, MAGIC_FREED)?;
    arena.write_word(word_address(data, LENGTH_WORD)?, 0)
}
