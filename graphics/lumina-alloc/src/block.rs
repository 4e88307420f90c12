//! Block Records
//!
//! Blocks are the nodes of a pool's buddy list. Their records live in a
//! fixed-capacity [`BlockArena`] and are addressed by stable indices; the
//! arena recycles slots through a free stack and never grows after
//! construction.

use alloc::vec::Vec;

use crate::error::{AllocError, Result};

// ============================================================================
// Identifiers
// ============================================================================

/// Index of a block record in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct BlockIndex(u32);

impl BlockIndex {
    /// Raw slot index.
    #[inline]
    pub const fn get(self) -> usize {
        self.0 as usize
    }
}

/// Pool-scoped block id. Never reused within a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct BlockId(pub u64);

// ============================================================================
// Block
// ============================================================================

/// A sub-range of a pool's region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Size in bytes (power of two).
    pub size: u64,
    /// Byte offset within the pool's region.
    pub offset: u64,
    /// Block id.
    pub id: BlockId,
    /// Next block in the pool's list.
    pub next: Option<BlockIndex>,
    /// Handed out to a caller.
    pub allocated: bool,
}

impl Block {
    /// Create an unallocated, unlinked block.
    pub const fn new(offset: u64, size: u64, id: BlockId) -> Self {
        Self {
            size,
            offset,
            id,
            next: None,
            allocated: false,
        }
    }

    /// End offset (exclusive).
    #[inline]
    pub const fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Check whether `other` is this block's buddy: same size, adjacent, and
    /// the pair starts on a boundary of twice the size.
    pub const fn is_buddy_of(&self, other: &Block) -> bool {
        if self.size != other.size || self.size == 0 {
            return false;
        }
        let (left, right) = if self.offset < other.offset {
            (self, other)
        } else {
            (other, self)
        };
        left.end() == right.offset && left.offset % (left.size * 2) == 0
    }
}

const EMPTY_BLOCK: Block = Block::new(0, 0, BlockId(0));

/// Read-only view of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Offset in the region.
    pub offset: u64,
    /// Size.
    pub size: u64,
    /// Block id.
    pub id: BlockId,
    /// Allocated?
    pub allocated: bool,
}

impl From<&Block> for BlockInfo {
    fn from(block: &Block) -> Self {
        Self {
            offset: block.offset,
            size: block.size,
            id: block.id,
            allocated: block.allocated,
        }
    }
}

// ============================================================================
// Block Arena
// ============================================================================

/// Fixed-capacity store of block records.
#[derive(Debug)]
pub struct BlockArena {
    /// Record storage.
    slots: Vec<Block>,
    /// Unused slot indices (stack for O(1) acquire/release).
    free_stack: Vec<u32>,
    /// High water mark of live slots.
    peak_live: usize,
}

impl BlockArena {
    /// Create an arena with every slot free.
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize(capacity, EMPTY_BLOCK);

        let mut free_stack = Vec::with_capacity(capacity);
        // Reverse order so slot 0 is handed out first.
        free_stack.extend((0..capacity as u32).rev());

        Self {
            slots,
            free_stack,
            peak_live: 0,
        }
    }

    /// Pop a free slot.
    pub fn acquire(&mut self) -> Result<BlockIndex> {
        let index = self.free_stack.pop().ok_or(AllocError::ArenaExhausted)?;
        self.peak_live = self.peak_live.max(self.live());
        Ok(BlockIndex(index))
    }

    /// Push a slot back onto the free stack.
    ///
    /// The slot must be owned by the caller; it must not still be linked
    /// into a pool list.
    pub fn release(&mut self, index: BlockIndex) {
        debug_assert!(index.get() < self.slots.len());
        debug_assert!(self.free_stack.len() < self.slots.len());
        self.slots[index.get()] = EMPTY_BLOCK;
        self.free_stack.push(index.0);
    }

    /// Return every slot to the free stack.
    pub fn reset(&mut self) {
        let capacity = self.slots.len();
        self.slots.fill(EMPTY_BLOCK);
        self.free_stack.clear();
        self.free_stack.extend((0..capacity as u32).rev());
        self.peak_live = 0;
    }

    /// Get a record.
    #[inline]
    pub fn get(&self, index: BlockIndex) -> &Block {
        &self.slots[index.get()]
    }

    /// Get a record (mutable).
    #[inline]
    pub fn get_mut(&mut self, index: BlockIndex) -> &mut Block {
        &mut self.slots[index.get()]
    }

    /// Total slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Free slots.
    pub fn available(&self) -> usize {
        self.free_stack.len()
    }

    /// Slots referenced by pool lists.
    pub fn live(&self) -> usize {
        self.slots.len() - self.free_stack.len()
    }

    /// High water mark of live slots.
    pub fn peak_live(&self) -> usize {
        self.peak_live
    }
}
