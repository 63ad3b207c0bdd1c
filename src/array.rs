//! The caller-facing array handle

use crate::error::Result;
use crate::header::{self, ArrayHeader, HandleState};
use crate::raw::{Address, Arena};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who owns the flat vector under a rank ≥ 2 overlay.
///
/// Scalars and vectors are always `Owned`: their data shares one block
/// with the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VectorOwnership {
    /// Released together with the array
    Owned,
    /// Supplied by the caller and never released by `free`
    Borrowed,
}

/// Handle to a self-describing array.
///
/// The address points at the data (or top pointer level); the header sits
/// immediately before it. The handle is `Copy`, so stale copies can
/// outlive a `free`. Using one afterwards is reported as a freed handle as
/// long as the arena has not reused the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypedArray {
    address: Address,
    vector: VectorOwnership,
}

impl TypedArray {
    pub(crate) fn new(address: Address, vector: VectorOwnership) -> Self {
        TypedArray { address, vector }
    }

    /// Rewrap an address obtained earlier from [`TypedArray::address`].
    /// Nothing is checked until the handle is used.
    pub fn from_raw(address: Address, vector: VectorOwnership) -> Self {
        TypedArray { address, vector }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn vector_ownership(&self) -> VectorOwnership {
        self.vector
    }

    pub fn is_borrowed(&self) -> bool {
        self.vector == VectorOwnership::Borrowed
    }

    pub fn header(&self, arena: &Arena) -> Result<ArrayHeader> {
        header::read_header(arena, self.address)
    }

    pub fn state(&self, arena: &Arena) -> HandleState {
        header::probe(arena, self.address)
    }
}

impl fmt::Display for TypedArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.vector {
            VectorOwnership::Owned => write!(f, "array@{}", self.address),
            VectorOwnership::Borrowed => write!(f, "array@{} (borrowed vector)", self.address),
        }
    }
}
