use crate::raw::Address;
use thiserror::Error;

/// What a header read found at an address that failed identity checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityViolation {
    /// The magic word says the array was already freed.
    Freed,
    /// The magic word is neither sentinel: this was never an array.
    NotAnArray,
}

impl std::fmt::Display for IdentityViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityViolation::Freed => f.write_str("already freed"),
            IdentityViolation::NotAnArray => f.write_str("not an array"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ArrayError {
    #[error("Null argument: {0}")]
    NullArgument(String),

    #[error("Illegal argument: {0}")]
    IllegalArgument(String),

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Handle at {address} is {state}")]
    CorruptOrFreedHandle {
        address: Address,
        state: IdentityViolation,
    },

    #[error("Corrupt array header: {0}")]
    CorruptHeader(String),

    #[error("Would exceed limit: {needed} bytes needed, {available} available")]
    WouldExceedLimit {
        needed: usize,
        available: usize,
        quiet: bool,
    },

    #[error("Unsupported datatype: {0}")]
    UnsupportedDatatype(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Unparseable token '{token}': {reason}")]
    UnparseableToken { token: String, reason: String },

    #[error("Bad address: {0}")]
    BadAddress(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

impl ArrayError {
    /// Number of bytes a buffer was short by, for `WouldExceedLimit`.
    pub fn missing(&self) -> Option<usize> {
        match self {
            ArrayError::WouldExceedLimit {
                needed, available, ..
            } => Some(needed.saturating_sub(*available)),
            _ => None,
        }
    }

    /// True for overflow errors the caller asked to be reported quietly.
    pub fn is_quiet(&self) -> bool {
        matches!(self, ArrayError::WouldExceedLimit { quiet: true, .. })
    }

    /// True when the error means the handle's identity cannot be trusted.
    pub fn is_identity_violation(&self) -> bool {
        matches!(self, ArrayError::CorruptOrFreedHandle { .. })
    }
}

pub type Result<T> = std::result::Result<T, ArrayError>;
