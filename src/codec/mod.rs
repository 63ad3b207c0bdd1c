//! Wire codecs
//!
//! [`NativeCodec`] produces the host-order network format with negotiable
//! `long` width. [`XdrCodec`] produces IETF XDR. Neither format carries
//! the datatype or the dimensions; the receiver already knows them from
//! the field description.

mod native;
mod xdr;

pub use native::NativeCodec;
pub use xdr::XdrCodec;

use crate::datatype::Datatype;
use crate::error::{ArrayError, Result};
use crate::raw::{Address, Arena, ADDRESS_SIZE};
use std::collections::HashMap;
use tracing::{trace, warn};

/// Maps structure reference ids to the names sent on the wire.
pub trait NameResolver {
    fn resolve(&self, datatype: Datatype, id: u64) -> Option<String>;
}

impl<F> NameResolver for F
where
    F: Fn(Datatype, u64) -> Option<String>,
{
    fn resolve(&self, datatype: Datatype, id: u64) -> Option<String> {
        self(datatype, id)
    }
}

/// Fixed id-to-name table
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    names: HashMap<u64, String>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: u64, name: impl Into<String>) -> &mut Self {
        self.names.insert(id, name.into());
        self
    }
}

impl NameResolver for NameTable {
    fn resolve(&self, _datatype: Datatype, id: u64) -> Option<String> {
        self.names.get(&id).cloned()
    }
}

/// Build a `WouldExceedLimit` error, logging it unless it is quiet.
pub(crate) fn overflow(needed: usize, available: usize, quiet: bool, what: &str) -> ArrayError {
    if quiet {
        trace!("{} needs {} bytes, buffer has {}", what, needed, available);
    } else {
        warn!("{} needs {} bytes, buffer has {}", what, needed, available);
    }
    ArrayError::WouldExceedLimit {
        needed,
        available,
        quiet,
    }
}

pub(crate) fn check_room(needed: usize, available: usize, quiet: bool, what: &str) -> Result<()> {
    if needed > available {
        return Err(overflow(needed, available, quiet, what));
    }
    Ok(())
}

pub(crate) fn no_structure_decode(datatype: Datatype) -> Result<()> {
    if datatype.is_structure_reference() {
        return Err(ArrayError::UnsupportedDatatype(format!(
            "writing to a {} field is not allowed",
            datatype
        )));
    }
    Ok(())
}

pub(crate) fn no_scalar_string(datatype: Datatype) -> Result<()> {
    if datatype == Datatype::String {
        return Err(ArrayError::Unsupported(
            "0-dimensional strings are not supported".into(),
        ));
    }
    Ok(())
}

/// Follow row pointer `index` of a pointer level.
pub(crate) fn row_pointer(arena: &Arena, level: Address, index: usize) -> Result<Address> {
    arena
        .read_address(level.checked_add(index * ADDRESS_SIZE)?)?
        .ok_or_else(|| ArrayError::CorruptHeader(format!("null row pointer at {}", level)))
}

/// Look up the name of the structure reference stored at `address`,
/// clipped to the datatype's name length.
pub(crate) fn structure_name(
    resolver: Option<&dyn NameResolver>,
    arena: &Arena,
    datatype: Datatype,
    address: Address,
) -> Result<Vec<u8>> {
    let resolver = resolver.ok_or_else(|| {
        ArrayError::UnsupportedDatatype(format!(
            "encoding {} references needs a name resolver",
            datatype
        ))
    })?;
    let mut id = [0u8; ADDRESS_SIZE];
    id.copy_from_slice(arena.bytes(address, ADDRESS_SIZE)?);
    let id = u64::from_ne_bytes(id);

    let name = resolver.resolve(datatype, id).ok_or_else(|| {
        ArrayError::IllegalArgument(format!("no {} is known by reference id {}", datatype, id))
    })?;
    let mut bytes = name.into_bytes();
    bytes.truncate(datatype.name_length());
    Ok(bytes)
}

/// Length of a NUL-terminated string stored in at most `bytes.len()` bytes.
pub(crate) fn c_strlen(bytes: &[u8]) -> usize {
    bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len())
}

pub(crate) fn checked_product(dims: &[usize], unit: usize) -> Result<usize> {
    dims.iter()
        .try_fold(unit, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| ArrayError::IllegalArgument(format!("dimensions {:?} overflow", dims)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_resolver() {
        let resolver = |_: Datatype, id: u64| (id == 7).then(|| "motor1".to_string());
        assert_eq!(resolver.resolve(Datatype::Record, 7).as_deref(), Some("motor1"));
        assert_eq!(resolver.resolve(Datatype::Record, 8), None);
    }

    #[test]
    fn test_name_table() {
        let mut names = NameTable::new();
        names.insert(1, "rs232").insert(2, "gpib");
        assert_eq!(names.resolve(Datatype::Interface, 1).as_deref(), Some("rs232"));
        assert_eq!(names.resolve(Datatype::Interface, 3), None);
    }

    #[test]
    fn test_structure_name_clipped() {
        let mut arena = Arena::new();
        let slot = arena.alloc(8).unwrap();
        arena.bytes_mut(slot, 8).unwrap().copy_from_slice(&3u64.to_ne_bytes());
        let long_name = "x".repeat(100);
        let resolver = move |_: Datatype, _: u64| Some(long_name.clone());

        let name = structure_name(Some(&resolver), &arena, Datatype::RecordType, slot).unwrap();
        assert_eq!(name.len(), 32);
        assert!(matches!(
            structure_name(None, &arena, Datatype::RecordType, slot),
            Err(ArrayError::UnsupportedDatatype(_))
        ));
    }

    #[test]
    fn test_overflow_missing() {
        let err = check_room(12, 8, true, "vector").unwrap_err();
        assert_eq!(err.missing(), Some(4));
        assert!(err.is_quiet());
    }
}
