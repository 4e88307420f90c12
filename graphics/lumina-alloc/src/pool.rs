//! Memory Pool
//!
//! Buddy sub-allocation of one device memory region.
//!
//! A pool keeps its blocks in a singly linked list threaded through the
//! [`BlockArena`]. Read in list order the blocks cover the region in
//! ascending offsets with no gaps. Allocation prefers an exact-size free
//! block, otherwise halves the smallest larger free block until it fits.
//! Freeing merges the block with a free buddy that is its immediate list
//! neighbour.

use log::{trace, warn};

use crate::block::{Block, BlockArena, BlockId, BlockIndex, BlockInfo};
use crate::config::CoalescePolicy;
use crate::error::{AllocError, Result};

// ============================================================================
// Size Rounding
// ============================================================================

/// Block size serving a request: `size` rounded up to a power of two, then
/// padded up to a multiple of `alignment`.
///
/// Zero-sized requests take the smallest block (1 byte before padding).
pub fn buddy_size(size: u64, alignment: u64) -> Result<u64> {
    if !alignment.is_power_of_two() {
        return Err(AllocError::InvalidAlignment);
    }

    let rounded = size.max(1).checked_next_power_of_two().ok_or(AllocError::NoFit)?;
    let padded = rounded.checked_add(alignment - 1).ok_or(AllocError::NoFit)? / alignment;
    Ok(padded * alignment)
}

// ============================================================================
// Pool Statistics
// ============================================================================

/// Pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total allocations
    pub allocations: u64,
    /// Total frees
    pub frees: u64,
    /// Blocks halved
    pub splits: u64,
    /// Buddy pairs merged
    pub merges: u64,
}

// ============================================================================
// List Cursor
// ============================================================================

/// A list position with the node before it.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    prev: Option<BlockIndex>,
    current: BlockIndex,
}

// ============================================================================
// Memory Pool
// ============================================================================

/// One device memory region carved into buddy blocks.
#[derive(Debug)]
pub struct MemoryPool<M> {
    /// Backing device memory.
    memory: M,
    /// Memory type index.
    memory_type: u32,
    /// Region size (power of two).
    size: u64,
    /// First block in the list.
    head: BlockIndex,
    /// Next block id to hand out.
    next_id: u64,
    /// Bytes in allocated blocks.
    used: u64,
    /// Allocated blocks.
    allocation_count: u32,
    /// Statistics
    stats: PoolStats,
}

impl<M: Copy> MemoryPool<M> {
    /// Create a pool over `memory` with a single free root block.
    pub fn new(memory: M, memory_type: u32, size: u64, arena: &mut BlockArena) -> Result<Self> {
        debug_assert!(size.is_power_of_two());

        let head = arena.acquire()?;
        let mut pool = Self {
            memory,
            memory_type,
            size,
            head,
            next_id: 0,
            used: 0,
            allocation_count: 0,
            stats: PoolStats::default(),
        };
        let id = pool.mint_id();
        *arena.get_mut(head) = Block::new(0, size, id);

        Ok(pool)
    }

    /// Allocate a block for `size` bytes aligned to `alignment`.
    pub fn allocate(&mut self, arena: &mut BlockArena, size: u64, alignment: u64) -> Result<BlockInfo> {
        let block_size = buddy_size(size, alignment)?;
        if block_size > self.size {
            warn!(
                "pool(type {}): request of {} bytes exceeds region of {} bytes",
                self.memory_type, block_size, self.size
            );
            return Err(AllocError::NoFit);
        }

        if let Some(index) = self.find_exact(arena, block_size) {
            return Ok(self.mark_allocated(arena, index));
        }

        let (prev, mut current) = match self.find_best_fit(arena, block_size) {
            Some(found) => found,
            None => {
                warn!(
                    "pool(type {}): no free block for {} bytes ({} of {} bytes used)",
                    self.memory_type, block_size, self.used, self.size
                );
                return Err(AllocError::NoFit);
            },
        };

        // Each halving takes two records and returns the parent's.
        let splits = (arena.get(current).size / block_size).trailing_zeros() as usize;
        if arena.available() < splits + 1 {
            return Err(AllocError::ArenaExhausted);
        }

        while arena.get(current).size > block_size {
            current = self.split(arena, prev, current)?;
        }

        Ok(self.mark_allocated(arena, current))
    }

    /// Free the block with `id`.
    pub fn free(&mut self, arena: &mut BlockArena, id: BlockId, policy: CoalescePolicy) -> Result<()> {
        let cursor = self
            .locate(arena, |_, block| block.id == id)
            .ok_or(AllocError::InvalidHandle)?;

        let block = arena.get_mut(cursor.current);
        if !block.allocated {
            return Err(AllocError::DoubleFree);
        }
        block.allocated = false;
        let size = block.size;

        self.used -= size;
        self.allocation_count -= 1;
        self.stats.frees += 1;

        let mut merged = self.coalesce(arena, cursor);
        if policy == CoalescePolicy::Recursive {
            while let Some(index) = merged {
                merged = self
                    .locate(arena, |i, _| i == index)
                    .and_then(|cursor| self.coalesce(arena, cursor));
            }
        }

        Ok(())
    }

    /// Return every block record to the arena, yielding the backing memory.
    pub fn release(self, arena: &mut BlockArena) -> M {
        let mut iter = Some(self.head);
        while let Some(index) = iter {
            iter = arena.get(index).next;
            arena.release(index);
        }
        self.memory
    }

    // ------------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------------

    /// First free block of exactly `size`, in list order.
    fn find_exact(&self, arena: &BlockArena, size: u64) -> Option<BlockIndex> {
        self.locate(arena, |_, block| !block.allocated && block.size == size)
            .map(|cursor| cursor.current)
    }

    /// Smallest free block strictly larger than `size`, with its predecessor.
    fn find_best_fit(&self, arena: &BlockArena, size: u64) -> Option<(Option<BlockIndex>, BlockIndex)> {
        let mut best: Option<(Option<BlockIndex>, BlockIndex)> = None;
        let mut best_size = u64::MAX;

        let mut prev = None;
        let mut iter = Some(self.head);
        while let Some(index) = iter {
            let block = arena.get(index);
            if !block.allocated && block.size > size && block.size < best_size {
                best = Some((prev, index));
                best_size = block.size;
            }
            prev = Some(index);
            iter = block.next;
        }

        best
    }

    /// Walk the list until `matches` accepts a node.
    fn locate<F>(&self, arena: &BlockArena, mut matches: F) -> Option<Cursor>
    where
        F: FnMut(BlockIndex, &Block) -> bool,
    {
        let mut prev = None;
        let mut iter = Some(self.head);
        while let Some(index) = iter {
            let block = arena.get(index);
            if matches(index, block) {
                return Some(Cursor {
                    prev,
                    current: index,
                });
            }
            prev = Some(index);
            iter = block.next;
        }
        None
    }

    // ------------------------------------------------------------------------
    // Split / Merge
    // ------------------------------------------------------------------------

    /// Replace `parent` with its two halves, returning the left half.
    fn split(
        &mut self,
        arena: &mut BlockArena,
        prev: Option<BlockIndex>,
        parent_index: BlockIndex,
    ) -> Result<BlockIndex> {
        let parent = *arena.get(parent_index);
        let half = parent.size / 2;

        let left_index = arena.acquire()?;
        let right_index = match arena.acquire() {
            Ok(index) => index,
            Err(e) => {
                arena.release(left_index);
                return Err(e);
            },
        };

        let mut left = Block::new(parent.offset, half, self.mint_id());
        let mut right = Block::new(parent.offset + half, half, self.mint_id());
        left.next = Some(right_index);
        right.next = parent.next;
        *arena.get_mut(left_index) = left;
        *arena.get_mut(right_index) = right;

        match prev {
            Some(p) => arena.get_mut(p).next = Some(left_index),
            None => self.head = left_index,
        }
        arena.release(parent_index);

        self.stats.splits += 1;
        trace!(
            "pool(type {}): split {:#x}+{} into {} byte halves",
            self.memory_type,
            parent.offset,
            parent.size,
            half
        );

        Ok(left_index)
    }

    /// Merge the block at `cursor` with a free buddy neighbour, if any.
    ///
    /// The preceding node is tried first, then the following one. Returns
    /// the merged block.
    fn coalesce(&mut self, arena: &mut BlockArena, cursor: Cursor) -> Option<BlockIndex> {
        let block = *arena.get(cursor.current);

        if let Some(prev) = cursor.prev {
            let neighbour = arena.get(prev);
            if !neighbour.allocated && neighbour.is_buddy_of(&block) {
                return Some(self.merge(arena, prev, cursor.current));
            }
        }

        if let Some(next) = block.next {
            let neighbour = arena.get(next);
            if !neighbour.allocated && neighbour.is_buddy_of(&block) {
                return Some(self.merge(arena, cursor.current, next));
            }
        }

        None
    }

    /// Fold two free buddies into their parent.
    ///
    /// Both records leave the list; the left slot is rewritten as the parent
    /// under a fresh id, so handles to either half go stale. The parent keeps
    /// the pair's list position.
    fn merge(&mut self, arena: &mut BlockArena, left_index: BlockIndex, right_index: BlockIndex) -> BlockIndex {
        let left = *arena.get(left_index);
        let right = *arena.get(right_index);
        debug_assert_eq!(left.next, Some(right_index));

        let mut parent = Block::new(left.offset, left.size * 2, self.mint_id());
        parent.next = right.next;
        *arena.get_mut(left_index) = parent;
        arena.release(right_index);

        self.stats.merges += 1;
        trace!(
            "pool(type {}): merged buddies at {:#x} into {} bytes",
            self.memory_type,
            parent.offset,
            parent.size
        );

        left_index
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn mint_id(&mut self) -> BlockId {
        let id = BlockId(self.next_id);
        self.next_id += 1;
        id
    }

    fn mark_allocated(&mut self, arena: &mut BlockArena, index: BlockIndex) -> BlockInfo {
        let block = arena.get_mut(index);
        block.allocated = true;
        let info = BlockInfo::from(&*block);

        self.used += info.size;
        self.allocation_count += 1;
        self.stats.allocations += 1;
        info
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    /// Backing memory handle.
    pub fn memory(&self) -> M {
        self.memory
    }

    /// Memory type index.
    pub fn memory_type(&self) -> u32 {
        self.memory_type
    }

    /// Region size.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bytes in allocated blocks.
    pub fn used(&self) -> u64 {
        self.used
    }

    /// Bytes in free blocks.
    pub fn available(&self) -> u64 {
        self.size - self.used
    }

    /// Number of allocated blocks.
    pub fn allocation_count(&self) -> u32 {
        self.allocation_count
    }

    /// Pool statistics.
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Blocks in list order.
    pub fn blocks<'a>(&self, arena: &'a BlockArena) -> Blocks<'a> {
        Blocks {
            arena,
            next: Some(self.head),
        }
    }

    /// Size of the largest free block, 0 if none.
    pub fn largest_free_block(&self, arena: &BlockArena) -> u64 {
        self.blocks(arena)
            .filter(|b| !b.allocated)
            .map(|b| b.size)
            .max()
            .unwrap_or(0)
    }

    /// Check the list partitions the region into aligned power-of-two
    /// blocks and the usage counters agree with it.
    pub fn is_consistent(&self, arena: &BlockArena) -> bool {
        let mut expected_offset = 0;
        let mut used = 0;
        let mut allocated = 0;

        for block in self.blocks(arena) {
            if block.offset != expected_offset
                || !block.size.is_power_of_two()
                || block.offset % block.size != 0
            {
                return false;
            }
            if block.allocated {
                used += block.size;
                allocated += 1;
            }
            expected_offset += block.size;
        }

        expected_offset == self.size && used == self.used && allocated == self.allocation_count
    }
}

/// Iterator over a pool's blocks.
#[derive(Debug)]
pub struct Blocks<'a> {
    arena: &'a BlockArena,
    next: Option<BlockIndex>,
}

impl Iterator for Blocks<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        let index = self.next?;
        let block = self.arena.get(index);
        self.next = block.next;
        Some(BlockInfo::from(block))
    }
}
