//! # typed-array - Self-Describing Multidimensional Arrays
//!
//! Arrays of any rank whose datatype, dimensions and element sizes travel
//! with them in a header stored immediately before the data. Rank ≥ 2
//! arrays are addressed through an overlay of pointer levels built over a
//! flat row-major vector, so any row of any level can be reached by
//! following stored addresses, and the flat vector can be handed around on
//! its own.
//!
//! - **Allocation and lifecycle**: scalars, vectors and overlays, with
//!   double-free and foreign-handle detection
//! - **Introspection**: header reads, element and byte counts, dumps
//! - **Wire codecs**: a host-order native format with negotiable `long`
//!   width, and IETF XDR
//! - **ASCII bridge**: whitespace separated tokens, one per element
//!
//! ## Quick Start
//!
//! ```rust
//! use typed_array::{access, Datatype, Engine, HandleState, Result};
//!
//! # fn main() -> Result<()> {
//! let mut engine = Engine::new();
//!
//! // 3 x 4 matrix of 16-bit values: element sizes are 2 (scalar) and 8
//! // (one stored address per row)
//! let matrix = engine.allocate_with_sizes(Datatype::UInt16, &[3, 4], &[2, 8])?;
//! access::set::<u16>(engine.arena_mut(), matrix, &[1, 2], 512)?;
//!
//! let header = engine.header(matrix)?;
//! assert_eq!(header.element_count(), 12);
//! assert_eq!(header.byte_count(), 24);
//!
//! engine.free(matrix)?;
//! assert_eq!(engine.validate(matrix), HandleState::Freed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Threads
//!
//! The engine is single-threaded and never locks. Operations that change
//! an [`Arena`] take `&mut Arena`, so the borrow checker already forbids
//! unsynchronized sharing. To use one arena from several threads, wrap it
//! yourself, for example in a `parking_lot::Mutex<Arena>`.
//!
//! ## Logging
//!
//! The crate emits `tracing` events and never installs a subscriber.
//! Identity violations are logged at `error`, truncation and buffer
//! overflow at `warn` (or `trace` when quiet), allocation and codec steps
//! at `debug`.

pub mod access;
pub mod allocator;
pub mod array;
pub mod ascii;
pub mod codec;
pub mod config;
pub mod convert;
pub mod datatype;
pub mod element;
pub mod engine;
pub mod error;
pub mod header;
pub mod introspect;
pub mod lifecycle;
pub mod overlay;
pub mod raw;

pub use allocator::{allocate, allocate_overlay, default_elem_sizes, reallocate};
pub use array::{TypedArray, VectorOwnership};
pub use ascii::{AsciiBridge, Tokenizer};
pub use codec::{NameResolver, NameTable, NativeCodec, XdrCodec};
pub use config::{ArenaConfig, AsciiOptions, CodecOptions, EngineConfig, LongWidth};
pub use convert::convert_and_copy;
pub use datatype::{datatype_name_from_code, Datatype};
pub use element::Value;
pub use engine::Engine;
pub use error::{ArrayError, IdentityViolation, Result};
pub use header::{compute_header_length, ArrayHeader, HandleState, MAGIC_FREED, MAGIC_LIVE};
pub use lifecycle::free;
pub use raw::{Address, Arena, ArenaStats};
