//! Raw arena storage
//!
//! Every byte an array owns lives in an [`Arena`] block. Blocks are
//! 16-byte aligned byte buffers addressed by `(block, offset)` pairs, and
//! pointer levels store those pairs as packed 8-byte words. Nothing outside
//! this module touches block storage directly.
//!
//! Released blocks keep their contents until the arena hands them out
//! again. That is what lets a freed array's header still be read back as
//! "freed": detection is best effort and ends as soon as the block is
//! reused.

use crate::config::ArenaConfig;
use crate::error::{ArrayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, trace};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Maximum scalar alignment. Data addresses handed to callers are always
/// multiples of this.
pub const MAX_ALIGN: usize = 16;

/// Size of one header word (the platform pointer width).
pub const WORD_SIZE: usize = std::mem::size_of::<usize>();

/// Size of a stored address inside a pointer level.
pub const ADDRESS_SIZE: usize = std::mem::size_of::<u64>();

#[repr(C, align(16))]
#[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct Chunk([u8; MAX_ALIGN]);

const ZERO_CHUNK: Chunk = Chunk([0; MAX_ALIGN]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    InUse,
    Released,
}

struct Block {
    chunks: Vec<Chunk>,
    len: usize,
    state: BlockState,
}

impl Block {
    fn with_len(len: usize) -> Self {
        Block {
            chunks: vec![ZERO_CHUNK; len.div_ceil(MAX_ALIGN)],
            len,
            state: BlockState::InUse,
        }
    }

    fn capacity(&self) -> usize {
        self.chunks.len() * MAX_ALIGN
    }

    fn bytes(&self) -> &[u8] {
        &self.chunks.as_bytes()[..self.len]
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        let len = self.len;
        &mut self.chunks.as_mut_bytes()[..len]
    }
}

/// Location of a byte inside the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    block: u32,
    offset: u32,
}

impl Address {
    pub const fn new(block: u32, offset: u32) -> Self {
        Address { block, offset }
    }

    pub fn block(&self) -> u32 {
        self.block
    }

    pub fn offset(&self) -> usize {
        self.offset as usize
    }

    pub fn is_aligned(&self) -> bool {
        self.offset() % MAX_ALIGN == 0
    }

    pub fn checked_add(self, bytes: usize) -> Result<Address> {
        u32::try_from(bytes)
            .ok()
            .and_then(|b| self.offset.checked_add(b))
            .map(|offset| Address { offset, ..self })
            .ok_or_else(|| ArrayError::BadAddress(format!("{} + {} overflows", self, bytes)))
    }

    pub fn checked_sub(self, bytes: usize) -> Result<Address> {
        u32::try_from(bytes)
            .ok()
            .and_then(|b| self.offset.checked_sub(b))
            .map(|offset| Address { offset, ..self })
            .ok_or_else(|| ArrayError::BadAddress(format!("{} - {} underflows", self, bytes)))
    }

    /// Pack into the word stored in pointer levels. Zero is reserved for null.
    pub fn to_word(self) -> u64 {
        ((self.block as u64 + 1) << 32) | self.offset as u64
    }

    pub fn from_word(word: u64) -> Option<Address> {
        let block = (word >> 32) as u32;
        if block == 0 {
            return None;
        }
        Some(Address {
            block: block - 1,
            offset: word as u32,
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:#x}", self.block, self.offset)
    }
}

/// Arena occupancy counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    pub live_blocks: usize,
    pub released_blocks: usize,
    pub bytes_in_use: usize,
}

/// Block heap backing every array.
///
/// Not synchronized. Callers sharing an arena across threads wrap it in a
/// lock of their choosing.
pub struct Arena {
    blocks: Vec<Block>,
    /// Released block ids, oldest first
    free_list: VecDeque<u32>,
    bytes_in_use: usize,
    config: ArenaConfig,
}

impl Arena {
    pub fn new() -> Self {
        Self::with_config(ArenaConfig::default())
    }

    pub fn with_config(config: ArenaConfig) -> Self {
        Arena {
            blocks: Vec::new(),
            free_list: VecDeque::new(),
            bytes_in_use: 0,
            config,
        }
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Allocate a zero-filled block and return its start address.
    ///
    /// The oldest released block large enough is reused first so that a
    /// freed header survives as long as possible.
    pub fn alloc(&mut self, len: usize) -> Result<Address> {
        if u32::try_from(len).is_err() {
            return Err(ArrayError::OutOfMemory(format!(
                "block of {} bytes exceeds the arena's addressable range",
                len
            )));
        }

        if self.config.max_bytes != 0 && self.bytes_in_use + len > self.config.max_bytes {
            return Err(ArrayError::OutOfMemory(format!(
                "allocating {} bytes would exceed the arena limit of {} bytes ({} in use)",
                len, self.config.max_bytes, self.bytes_in_use
            )));
        }

        let reuse = self
            .free_list
            .iter()
            .position(|&id| self.blocks[id as usize].capacity() >= len);

        let id = match reuse {
            Some(pos) => {
                let id = self.free_list.remove(pos).unwrap_or_default();
                let block = &mut self.blocks[id as usize];
                block.chunks.fill(ZERO_CHUNK);
                block.len = len;
                block.state = BlockState::InUse;
                trace!("Reusing block {} for {} bytes", id, len);
                id
            }
            None => {
                let id = u32::try_from(self.blocks.len())
                    .ok()
                    .filter(|&id| id < u32::MAX)
                    .ok_or_else(|| ArrayError::OutOfMemory("arena block table is full".into()))?;
                self.blocks.push(Block::with_len(len));
                id
            }
        };

        self.bytes_in_use += len;
        debug!("Allocated block {} ({} bytes)", id, len);
        Ok(Address::new(id, 0))
    }

    /// Return a block to the arena. Its bytes stay readable until reuse.
    pub fn release(&mut self, addr: Address) -> Result<()> {
        if addr.offset != 0 {
            return Err(ArrayError::BadAddress(format!(
                "{} is not the start of a block",
                addr
            )));
        }
        let block = self
            .blocks
            .get_mut(addr.block as usize)
            .ok_or_else(|| ArrayError::BadAddress(format!("{} names no block", addr)))?;

        if block.state == BlockState::Released {
            return Err(ArrayError::BadAddress(format!(
                "block {} was already released",
                addr.block
            )));
        }

        block.state = BlockState::Released;
        self.bytes_in_use -= block.len;
        self.free_list.push_back(addr.block);
        debug!("Released block {} ({} bytes)", addr.block, block.len);
        Ok(())
    }

    /// True when `addr` lies in a block that is currently allocated.
    pub fn is_in_use(&self, addr: Address) -> bool {
        self.blocks
            .get(addr.block as usize)
            .map(|b| b.state == BlockState::InUse && addr.offset() <= b.len)
            .unwrap_or(false)
    }

    pub fn block_len(&self, addr: Address) -> Option<usize> {
        self.blocks.get(addr.block as usize).map(|b| b.len)
    }

    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            live_blocks: self.blocks.len() - self.free_list.len(),
            released_blocks: self.free_list.len(),
            bytes_in_use: self.bytes_in_use,
        }
    }

    fn block(&self, addr: Address, len: usize) -> Result<&Block> {
        let block = self
            .blocks
            .get(addr.block as usize)
            .ok_or_else(|| ArrayError::BadAddress(format!("{} names no block", addr)))?;
        if addr.offset() + len > block.len {
            return Err(ArrayError::BadAddress(format!(
                "{} bytes at {} run past the end of a {}-byte block",
                len, addr, block.len
            )));
        }
        Ok(block)
    }

    /// Read `len` bytes at `addr`. Released blocks can still be read.
    pub fn bytes(&self, addr: Address, len: usize) -> Result<&[u8]> {
        let block = self.block(addr, len)?;
        Ok(&block.bytes()[addr.offset()..addr.offset() + len])
    }

    /// Mutable view of `len` bytes at `addr`. The block must be in use.
    pub fn bytes_mut(&mut self, addr: Address, len: usize) -> Result<&mut [u8]> {
        let block = self.block(addr, len)?;
        if block.state == BlockState::Released {
            return Err(ArrayError::BadAddress(format!(
                "write to released block at {}",
                addr
            )));
        }
        let block = &mut self.blocks[addr.block as usize];
        Ok(&mut block.bytes_mut()[addr.offset()..addr.offset() + len])
    }

    pub fn read_word(&self, addr: Address) -> Result<usize> {
        let bytes = self.bytes(addr, WORD_SIZE)?;
        let mut word = [0u8; WORD_SIZE];
        word.copy_from_slice(bytes);
        Ok(usize::from_ne_bytes(word))
    }

    pub fn write_word(&mut self, addr: Address, value: usize) -> Result<()> {
        self.bytes_mut(addr, WORD_SIZE)?
            .copy_from_slice(&value.to_ne_bytes());
        Ok(())
    }

    /// Interpret the word at `addr` as an address.
    pub fn read_address(&self, addr: Address) -> Result<Option<Address>> {
        let bytes = self.bytes(addr, ADDRESS_SIZE)?;
        let mut word = [0u8; ADDRESS_SIZE];
        word.copy_from_slice(bytes);
        Ok(Address::from_word(u64::from_ne_bytes(word)))
    }

    pub fn write_address(&mut self, addr: Address, target: Option<Address>) -> Result<()> {
        let word = target.map(Address::to_word).unwrap_or(0);
        self.bytes_mut(addr, ADDRESS_SIZE)?
            .copy_from_slice(&word.to_ne_bytes());
        Ok(())
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}
