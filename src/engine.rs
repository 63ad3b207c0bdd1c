//! One-stop wrapper around an arena and its configuration

use crate::allocator;
use crate::array::TypedArray;
use crate::ascii::AsciiBridge;
use crate::codec::{NativeCodec, XdrCodec};
use crate::config::EngineConfig;
use crate::convert;
use crate::datatype::Datatype;
use crate::error::Result;
use crate::header::{ArrayHeader, HandleState};
use crate::introspect;
use crate::lifecycle;
use crate::raw::{Address, Arena, ArenaStats};
use std::path::Path;
use tracing::info;

/// An arena plus the codec and text options configured for it.
///
/// # Examples
///
/// ```rust
/// use typed_array::{Datatype, Engine};
///
/// # fn main() -> typed_array::Result<()> {
/// let mut engine = Engine::new();
/// let matrix = engine.allocate(Datatype::UInt16, &[3, 4])?;
/// engine.ascii().tokens_to_array(engine.arena_mut(), matrix, "1 2 3 4 5 6 7 8 9 10 11 12")?;
///
/// let wire = engine.xdr().encode(engine.arena(), matrix)?;
/// assert_eq!(wire.len(), 3 * 20);
///
/// engine.free(matrix)?;
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    arena: Arena,
    config: EngineConfig,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Engine {
            arena: Arena::with_config(config.arena.clone()),
            config,
        }
    }

    /// Load a TOML configuration file and build an engine from it.
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = EngineConfig::load(path.as_ref())?;
        info!("Loaded engine configuration from {}", path.as_ref().display());
        Ok(Self::with_config(config))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    pub fn into_arena(self) -> Arena {
        self.arena
    }

    pub fn stats(&self) -> ArenaStats {
        self.arena.stats()
    }

    /// Allocate with the standard element sizes for `datatype`.
    pub fn allocate(&mut self, datatype: Datatype, dims: &[usize]) -> Result<TypedArray> {
        let elem_sizes = allocator::default_elem_sizes(datatype, dims.len());
        allocator::allocate(&mut self.arena, datatype, dims, &elem_sizes)
    }

    pub fn allocate_with_sizes(
        &mut self,
        datatype: Datatype,
        dims: &[usize],
        elem_sizes: &[usize],
    ) -> Result<TypedArray> {
        allocator::allocate(&mut self.arena, datatype, dims, elem_sizes)
    }

    pub fn allocate_overlay(&mut self, datatype: Datatype, dims: &[usize], vector: Address) -> Result<TypedArray> {
        let elem_sizes = allocator::default_elem_sizes(datatype, dims.len());
        allocator::allocate_overlay(&mut self.arena, datatype, dims, &elem_sizes, vector)
    }

    pub fn reallocate(&mut self, array: TypedArray, new_dims: &[usize]) -> Result<TypedArray> {
        allocator::reallocate(&mut self.arena, array, new_dims)
    }

    pub fn free(&mut self, array: TypedArray) -> Result<()> {
        lifecycle::free(&mut self.arena, array)
    }

    pub fn validate(&self, array: TypedArray) -> HandleState {
        introspect::validate(&self.arena, array)
    }

    pub fn header(&self, array: TypedArray) -> Result<ArrayHeader> {
        introspect::header(&self.arena, array)
    }

    pub fn dump(&self, array: TypedArray) -> Result<String> {
        introspect::dump(&self.arena, array)
    }

    pub fn convert_and_copy(&mut self, src: TypedArray, dst: TypedArray) -> Result<()> {
        convert::convert_and_copy(&mut self.arena, src, dst)
    }

    /// Native codec with the configured options. Attach a resolver with
    /// [`NativeCodec::with_resolver`] to encode structure references.
    pub fn native(&self) -> NativeCodec<'static> {
        NativeCodec::new(self.config.codec)
    }

    pub fn xdr(&self) -> XdrCodec<'static> {
        XdrCodec::new(self.config.codec)
    }

    pub fn ascii(&self) -> AsciiBridge {
        AsciiBridge::new(self.config.ascii)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
