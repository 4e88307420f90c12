//! GPU Allocator
//!
//! The allocator facade: one buddy [`MemoryPool`] per memory type, created
//! on first use, all sharing one [`BlockArena`] of block records.
//!
//! ```text
//!   allocate(type, size, align)          free(allocation)
//!             │                                │
//!             ▼                                ▼
//!   ┌──────────────────────────────────────────────────────┐
//!   │ pool table  [type 0] [type 2] [ -- ] [ -- ] ...      │
//!   └──────┬──────────────────┬────────────────────────────┘
//!          │                  │
//!   ┌──────▼──────┐    ┌──────▼──────┐
//!   │ region 1MiB │    │ region 1MiB │   ◄── DeviceMemory
//!   └─────────────┘    └─────────────┘
//!          └────────┬─────────┘
//!            BlockArena (shared records)
//! ```

use alloc::vec::Vec;
use core::fmt;

use log::{debug, error, info, warn};
use spin::{Mutex, MutexGuard};

use crate::block::{BlockArena, BlockId};
use crate::config::AllocatorConfig;
use crate::device::DeviceMemory;
use crate::error::{AllocError, Result};
use crate::heap::{MemoryProperties, MemoryPropertyFlags};
use crate::pool::{buddy_size, Blocks, MemoryPool};

// ============================================================================
// Allocation
// ============================================================================

/// A block handed out by the [`Allocator`]. Valid until passed to
/// [`Allocator::free`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation<M> {
    memory: M,
    offset: u64,
    size: u64,
    id: BlockId,
    pool_index: u32,
    memory_type: u32,
}

impl<M: Copy> Allocation<M> {
    /// Backing device memory.
    #[inline]
    pub fn memory(&self) -> M {
        self.memory
    }

    /// Offset in the backing memory.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Block size (at least the requested size).
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Owning pool.
    #[inline]
    pub fn pool_index(&self) -> u32 {
        self.pool_index
    }

    /// Memory type index.
    #[inline]
    pub fn memory_type(&self) -> u32 {
        self.memory_type
    }
}

/// Memory requirements of a buffer or image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRequirements {
    /// Size in bytes
    pub size: u64,
    /// Alignment (power of two)
    pub alignment: u64,
    /// Bit `i` set when memory type `i` is usable
    pub memory_type_bits: u32,
}

impl MemoryRequirements {
    /// Creates requirements
    pub const fn new(size: u64, alignment: u64, memory_type_bits: u32) -> Self {
        Self {
            size,
            alignment,
            memory_type_bits,
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Allocator statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Pools holding a region
    pub active_pools: usize,
    /// Block records in use
    pub live_blocks: usize,
    /// High water mark of block records
    pub peak_live_blocks: usize,
    /// Block record capacity
    pub block_capacity: usize,
    /// Total allocations
    pub allocations: u64,
    /// Total frees
    pub frees: u64,
    /// Blocks halved
    pub splits: u64,
    /// Buddy pairs merged
    pub merges: u64,
    /// Bytes in allocated blocks
    pub bytes_allocated: u64,
    /// Bytes of device memory held
    pub bytes_reserved: u64,
}

// ============================================================================
// Allocator
// ============================================================================

/// Buddy sub-allocator over per-memory-type device regions.
#[derive(Debug)]
pub struct Allocator<D: DeviceMemory> {
    device: D,
    properties: MemoryProperties,
    config: AllocatorConfig,
    arena: BlockArena,
    pools: Vec<Option<MemoryPool<D::Memory>>>,
}

impl<D: DeviceMemory> Allocator<D> {
    /// Create an allocator. All storage is reserved here.
    pub fn new(device: D, config: AllocatorConfig) -> Result<Self> {
        config.validate()?;

        let properties = device.memory_properties();
        let mut pools = Vec::with_capacity(config.max_pools);
        pools.resize_with(config.max_pools, || None);

        debug!(
            "allocator: {} pools of {} bytes, {} block records, {} memory types",
            config.max_pools,
            config.region_size,
            config.max_blocks,
            properties.types().len()
        );

        Ok(Self {
            device,
            properties,
            config,
            arena: BlockArena::new(config.max_blocks),
            pools,
        })
    }

    /// Allocate `size` bytes aligned to `alignment` from memory type
    /// `memory_type_index`.
    pub fn allocate(
        &mut self,
        memory_type_index: u32,
        size: u64,
        alignment: u64,
    ) -> Result<Allocation<D::Memory>> {
        // Reject before a pool is created for the type.
        let block_size = buddy_size(size, alignment)?;
        if block_size > self.config.region_size {
            warn!(
                "allocator: request of {} bytes exceeds region of {} bytes",
                block_size, self.config.region_size
            );
            return Err(AllocError::NoFit);
        }

        let pool_index = match self.find_pool(memory_type_index) {
            Some(index) => index,
            None => self.create_pool(memory_type_index).map_err(|e| self.escalate(e))?,
        };

        let pool = self.pools[pool_index]
            .as_mut()
            .ok_or(AllocError::InvalidHandle)?;
        let block = match pool.allocate(&mut self.arena, size, alignment) {
            Ok(block) => block,
            Err(e) => return Err(self.escalate(e)),
        };

        Ok(Allocation {
            memory: pool.memory(),
            offset: block.offset,
            size: block.size,
            id: block.id,
            pool_index: pool_index as u32,
            memory_type: memory_type_index,
        })
    }

    /// Pick a memory type for `requirements` and allocate from it.
    pub fn allocate_for(
        &mut self,
        requirements: &MemoryRequirements,
        required: MemoryPropertyFlags,
        preferred: MemoryPropertyFlags,
    ) -> Result<Allocation<D::Memory>> {
        let memory_type =
            self.select_memory_type(requirements.memory_type_bits, required, preferred)?;
        self.allocate(memory_type, requirements.size, requirements.alignment)
    }

    /// Return an allocation to its pool.
    pub fn free(&mut self, allocation: Allocation<D::Memory>) -> Result<()> {
        let policy = self.config.coalesce;
        let pool = match self
            .pools
            .get_mut(allocation.pool_index as usize)
            .and_then(Option::as_mut)
        {
            Some(pool) if pool.memory() == allocation.memory => pool,
            _ => {
                warn!("allocator: free of allocation from unknown pool {}", allocation.pool_index);
                return Err(AllocError::InvalidHandle);
            },
        };

        pool.free(&mut self.arena, allocation.id, policy).map_err(|e| {
            warn!(
                "allocator: rejected free of {:#x}+{} in pool {}: {}",
                allocation.offset, allocation.size, allocation.pool_index, e
            );
            e
        })
    }

    /// Release every region back to the device. The allocator returns to its
    /// freshly created state; outstanding allocations become invalid.
    pub fn destroy(&mut self) {
        let mut released = 0;
        for slot in self.pools.iter_mut() {
            if let Some(pool) = slot.take() {
                let memory = pool.release(&mut self.arena);
                self.device.free_memory(memory);
                released += 1;
            }
        }
        self.arena.reset();

        info!("allocator: destroyed, released {} regions", released);
    }

    /// Find a memory type in the device's properties.
    pub fn select_memory_type(
        &self,
        type_bits: u32,
        required: MemoryPropertyFlags,
        preferred: MemoryPropertyFlags,
    ) -> Result<u32> {
        self.properties.select_memory_type(type_bits, required, preferred)
    }

    // ------------------------------------------------------------------------
    // Pools
    // ------------------------------------------------------------------------

    fn find_pool(&self, memory_type_index: u32) -> Option<usize> {
        self.pools.iter().position(|slot| {
            slot.as_ref()
                .map_or(false, |pool| pool.memory_type() == memory_type_index)
        })
    }

    fn create_pool(&mut self, memory_type_index: u32) -> Result<usize> {
        let slot = self
            .pools
            .iter()
            .position(Option::is_none)
            .ok_or(AllocError::PoolTableFull)?;

        let memory = self
            .device
            .allocate_memory(memory_type_index, self.config.region_size)
            .map_err(|e| {
                warn!("allocator: device refused region for type {}: {}", memory_type_index, e);
                AllocError::from(e)
            })?;

        let region_size = self.config.region_size;
        let pool = match MemoryPool::new(memory, memory_type_index, region_size, &mut self.arena) {
            Ok(pool) => pool,
            Err(e) => {
                self.device.free_memory(memory);
                return Err(e);
            },
        };
        self.pools[slot] = Some(pool);

        debug!(
            "allocator: pool {} created for memory type {} ({:?})",
            slot, memory_type_index, memory
        );
        Ok(slot)
    }

    /// Apply the strict-mode policy to an error.
    fn escalate(&self, e: AllocError) -> AllocError {
        if !e.is_capacity_violation() {
            return e;
        }

        if self.config.strict {
            error!(
                "allocator: {} ({} of {} block records, {} of {} pools)",
                e,
                self.arena.live(),
                self.arena.capacity(),
                self.pool_count(),
                self.config.max_pools
            );
            panic!("lumina-alloc: {}", e);
        }

        warn!(
            "allocator: {} ({} of {} block records, {} of {} pools)",
            e,
            self.arena.live(),
            self.arena.capacity(),
            self.pool_count(),
            self.config.max_pools
        );
        e
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    /// Configuration.
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Device memory properties snapshot.
    pub fn memory_properties(&self) -> &MemoryProperties {
        &self.properties
    }

    /// Device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Device (mutable).
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Pool in table slot `index`.
    pub fn pool(&self, index: u32) -> Option<&MemoryPool<D::Memory>> {
        self.pools.get(index as usize).and_then(Option::as_ref)
    }

    /// Number of pools holding a region.
    pub fn pool_count(&self) -> usize {
        self.pools.iter().filter(|slot| slot.is_some()).count()
    }

    /// Blocks of pool `index` in list order.
    pub fn pool_blocks(&self, index: u32) -> Option<Blocks<'_>> {
        self.pool(index).map(|pool| pool.blocks(&self.arena))
    }

    /// Aggregate statistics.
    pub fn stats(&self) -> AllocatorStats {
        let mut stats = AllocatorStats {
            live_blocks: self.arena.live(),
            peak_live_blocks: self.arena.peak_live(),
            block_capacity: self.arena.capacity(),
            ..AllocatorStats::default()
        };

        for pool in self.pools.iter().flatten() {
            let pool_stats = pool.stats();
            stats.active_pools += 1;
            stats.allocations += pool_stats.allocations;
            stats.frees += pool_stats.frees;
            stats.splits += pool_stats.splits;
            stats.merges += pool_stats.merges;
            stats.bytes_allocated += pool.used();
            stats.bytes_reserved += pool.size();
        }

        stats
    }
}

impl<D: DeviceMemory> Drop for Allocator<D> {
    fn drop(&mut self) {
        if self.pool_count() > 0 {
            self.destroy();
        }
    }
}

// ============================================================================
// Shared Allocator
// ============================================================================

/// An [`Allocator`] behind a spin lock, for callers on several threads.
pub struct SharedAllocator<D: DeviceMemory> {
    inner: Mutex<Allocator<D>>,
}

impl<D: DeviceMemory> SharedAllocator<D> {
    /// Wrap an allocator.
    pub fn new(allocator: Allocator<D>) -> Self {
        Self {
            inner: Mutex::new(allocator),
        }
    }

    /// See [`Allocator::allocate`].
    pub fn allocate(&self, memory_type_index: u32, size: u64, alignment: u64) -> Result<Allocation<D::Memory>> {
        self.inner.lock().allocate(memory_type_index, size, alignment)
    }

    /// See [`Allocator::allocate_for`].
    pub fn allocate_for(
        &self,
        requirements: &MemoryRequirements,
        required: MemoryPropertyFlags,
        preferred: MemoryPropertyFlags,
    ) -> Result<Allocation<D::Memory>> {
        self.inner.lock().allocate_for(requirements, required, preferred)
    }

    /// See [`Allocator::free`].
    pub fn free(&self, allocation: Allocation<D::Memory>) -> Result<()> {
        self.inner.lock().free(allocation)
    }

    /// See [`Allocator::stats`].
    pub fn stats(&self) -> AllocatorStats {
        self.inner.lock().stats()
    }

    /// Lock for a sequence of calls.
    pub fn lock(&self) -> MutexGuard<'_, Allocator<D>> {
        self.inner.lock()
    }

    /// Unwrap the allocator.
    pub fn into_inner(self) -> Allocator<D> {
        self.inner.into_inner()
    }
}

impl<D: DeviceMemory + fmt::Debug> fmt::Debug for SharedAllocator<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_lock() {
            Some(allocator) => f.debug_struct("SharedAllocator").field("inner", &*allocator).finish(),
            None => f.debug_struct("SharedAllocator").field("inner", &"<locked>").finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::vec::Vec;

    use super::*;
    use crate::config::CoalescePolicy;
    use crate::device::HeadlessDevice;
    use crate::error::DeviceError;

    const MIB: u64 = 1024 * 1024;

    fn allocator(config: AllocatorConfig) -> Allocator<HeadlessDevice> {
        Allocator::new(HeadlessDevice::default(), config).unwrap()
    }

    #[test]
    fn test_pools_created_lazily() {
        let mut allocator = allocator(AllocatorConfig::default());
        assert_eq!(allocator.pool_count(), 0);
        assert_eq!(allocator.device().live_regions(), 0);

        let a = allocator.allocate(0, 100, 256).unwrap();
        assert_eq!(allocator.pool_count(), 1);
        assert_eq!(allocator.device().live_regions(), 1);
        assert_eq!((a.offset(), a.size()), (0, 256));

        // Same type reuses the pool.
        let b = allocator.allocate(0, 100, 256).unwrap();
        assert_eq!(b.pool_index(), a.pool_index());
        assert_eq!(b.memory(), a.memory());
        assert_eq!(b.offset(), 256);
        assert_eq!(allocator.device().live_regions(), 1);

        // A new type gets its own region.
        let c = allocator.allocate(2, 100, 256).unwrap();
        assert_ne!(c.pool_index(), a.pool_index());
        assert_ne!(c.memory(), a.memory());
        assert_eq!(c.offset(), 0);
        assert_eq!(c.memory_type(), 2);
        assert_eq!(allocator.pool_count(), 2);
    }

    #[test]
    fn test_coalesced_block_is_reused() {
        let mut allocator = allocator(AllocatorConfig::default());

        let a = allocator.allocate(0, 100, 256).unwrap();
        let b = allocator.allocate(0, 100, 256).unwrap();
        let pool_index = a.pool_index();
        allocator.free(b).unwrap();
        allocator.free(a).unwrap();

        let splits = allocator.stats().splits;
        let c = allocator.allocate(0, 500, 1).unwrap();
        assert_eq!((c.offset(), c.size()), (0, 512));
        assert_eq!(allocator.stats().splits, splits);

        let pool = allocator.pool(pool_index).unwrap();
        assert_eq!(pool.used(), 512);
        let first = allocator.pool_blocks(pool_index).unwrap().next().unwrap();
        assert_eq!((first.offset, first.size, first.allocated), (0, 512, true));
    }

    #[test]
    fn test_whole_region_twice() {
        let mut allocator = allocator(AllocatorConfig::default());
        allocator.allocate(1, MIB, 1).unwrap();
        assert_eq!(allocator.allocate(1, MIB, 1), Err(AllocError::NoFit));
        // A full pool does not spill into a second region.
        assert_eq!(allocator.device().live_regions(), 1);
    }

    #[test]
    fn test_rejected_request_creates_no_pool() {
        let mut allocator = allocator(AllocatorConfig::default());

        assert_eq!(allocator.allocate(0, 64, 3), Err(AllocError::InvalidAlignment));
        assert_eq!(allocator.allocate(1, 4 * MIB, 1), Err(AllocError::NoFit));
        assert_eq!(allocator.allocate(2, 64, 2 * MIB), Err(AllocError::NoFit));

        assert_eq!(allocator.device().live_regions(), 0);
        assert_eq!(allocator.device().total_allocations(), 0);
        assert_eq!(allocator.pool_count(), 0);
        assert_eq!(allocator.stats().live_blocks, 0);
    }

    #[test]
    fn test_pool_table_full() {
        let mut allocator = allocator(AllocatorConfig::new().with_max_pools(2));
        allocator.allocate(0, 64, 64).unwrap();
        allocator.allocate(1, 64, 64).unwrap();
        assert_eq!(allocator.allocate(2, 64, 64), Err(AllocError::PoolTableFull));
        assert_eq!(allocator.device().live_regions(), 2);
    }

    #[test]
    #[should_panic(expected = "memory pool table full")]
    fn test_strict_pool_table_full_panics() {
        let mut allocator = allocator(AllocatorConfig::new().with_max_pools(1).strict());
        allocator.allocate(0, 64, 64).unwrap();
        let _ = allocator.allocate(1, 64, 64);
    }

    #[test]
    #[should_panic(expected = "block record arena exhausted")]
    fn test_strict_arena_exhausted_panics() {
        let mut allocator = allocator(AllocatorConfig::new().with_max_blocks(4).strict());
        let _ = allocator.allocate(0, 1, 1);
    }

    #[test]
    fn test_strict_mode_returns_other_errors() {
        let mut allocator = allocator(AllocatorConfig::new().strict());
        allocator.allocate(0, MIB, 1).unwrap();
        assert_eq!(allocator.allocate(0, 1, 1), Err(AllocError::NoFit));
        assert_eq!(allocator.allocate(0, 1, 5), Err(AllocError::InvalidAlignment));
    }

    #[test]
    fn test_arena_exhausted_at_pool_creation_returns_region() {
        let mut allocator = allocator(AllocatorConfig::new().with_max_blocks(1));
        allocator.allocate(0, MIB, 1).unwrap();

        assert_eq!(allocator.allocate(1, MIB, 1), Err(AllocError::ArenaExhausted));
        assert_eq!(allocator.pool_count(), 1);
        assert_eq!(allocator.device().live_regions(), 1);
    }

    #[test]
    fn test_device_failure() {
        let device = HeadlessDevice::default().with_region_limit(0);
        let mut allocator = Allocator::new(device, AllocatorConfig::default()).unwrap();

        assert_eq!(
            allocator.allocate(0, 64, 1),
            Err(AllocError::DeviceAllocationFailure(DeviceError::OutOfDeviceMemory))
        );
        assert_eq!(
            allocator.allocate(7, 64, 1),
            Err(AllocError::DeviceAllocationFailure(DeviceError::InvalidMemoryType))
        );
        assert_eq!(allocator.pool_count(), 0);
        assert_eq!(allocator.stats().live_blocks, 0);
    }

    #[test]
    fn test_invalid_config() {
        let result = Allocator::new(
            HeadlessDevice::default(),
            AllocatorConfig::new().with_region_size(1000),
        );
        assert!(matches!(result, Err(AllocError::InvalidConfig(_))));
    }

    #[test]
    fn test_free_rejects_stale_allocations() {
        let mut allocator = allocator(AllocatorConfig::default());

        let a = allocator.allocate(0, 4096, 1).unwrap();
        let _b = allocator.allocate(0, 4096, 1).unwrap();
        allocator.free(a.clone()).unwrap();
        assert_eq!(allocator.free(a.clone()), Err(AllocError::DoubleFree));

        // Destroy and recreate: same slot, new region.
        allocator.destroy();
        assert_eq!(allocator.free(a.clone()), Err(AllocError::InvalidHandle));
        let c = allocator.allocate(0, 4096, 1).unwrap();
        assert_eq!(c.pool_index(), a.pool_index());
        assert_eq!(allocator.free(a), Err(AllocError::InvalidHandle));
        allocator.free(c).unwrap();
    }

    #[test]
    fn test_allocate_for_selects_type() {
        let mut allocator = allocator(AllocatorConfig::default());

        let requirements = MemoryRequirements::new(1000, 256, 0b111);
        let vertex = allocator
            .allocate_for(&requirements, MemoryPropertyFlags::DEVICE_LOCAL, MemoryPropertyFlags::empty())
            .unwrap();
        assert_eq!(vertex.memory_type(), 0);
        assert_eq!(vertex.size(), 1024);

        let staging = allocator
            .allocate_for(
                &requirements,
                MemoryPropertyFlags::HOST_VISIBLE,
                MemoryPropertyFlags::HOST_CACHED,
            )
            .unwrap();
        assert_eq!(staging.memory_type(), 2);

        let device_only = MemoryRequirements::new(64, 64, 0b110);
        assert_eq!(
            allocator.allocate_for(
                &device_only,
                MemoryPropertyFlags::DEVICE_LOCAL,
                MemoryPropertyFlags::empty()
            ),
            Err(AllocError::NoMatchingMemoryType)
        );
        assert_eq!(allocator.pool_count(), 2);
    }

    #[test]
    fn test_destroy_releases_regions() {
        let mut allocator = allocator(AllocatorConfig::default());
        for memory_type in 0..3 {
            allocator.allocate(memory_type, 300, 16).unwrap();
        }
        assert_eq!(allocator.device().live_regions(), 3);

        allocator.destroy();
        assert_eq!(allocator.device().live_regions(), 0);
        assert_eq!(allocator.pool_count(), 0);

        let stats = allocator.stats();
        assert_eq!(stats.live_blocks, 0);
        assert_eq!(stats.bytes_reserved, 0);
        assert_eq!(stats.allocations, 0);
        assert_eq!(stats.peak_live_blocks, 0);

        // Usable again after teardown.
        allocator.allocate(0, 300, 16).unwrap();
        assert_eq!(allocator.device().live_regions(), 1);
    }

    #[test]
    fn test_drop_releases_regions() {
        let mut device = HeadlessDevice::default();
        {
            let mut allocator = Allocator::new(&mut device, AllocatorConfig::default()).unwrap();
            allocator.allocate(0, 64, 64).unwrap();
            allocator.allocate(1, 64, 64).unwrap();
        }
        assert_eq!(device.live_regions(), 0);
        assert_eq!(device.total_allocations(), 2);
    }

    #[test]
    fn test_stats() {
        let mut allocator = allocator(AllocatorConfig::default());
        let a = allocator.allocate(0, 100, 256).unwrap();
        let b = allocator.allocate(0, 100, 256).unwrap();
        allocator.allocate(1, MIB, 1).unwrap();

        let stats = allocator.stats();
        assert_eq!(stats.active_pools, 2);
        assert_eq!(stats.allocations, 3);
        assert_eq!(stats.splits, 12);
        assert_eq!(stats.bytes_allocated, 512 + MIB);
        assert_eq!(stats.bytes_reserved, 2 * MIB);
        assert_eq!(stats.live_blocks, 14);

        allocator.free(a).unwrap();
        allocator.free(b).unwrap();
        let stats = allocator.stats();
        assert_eq!(stats.frees, 2);
        assert_eq!(stats.merges, 1);
        assert_eq!(stats.live_blocks, 13);
        assert_eq!(stats.peak_live_blocks, 14);
    }

    #[test]
    fn test_recursive_policy() {
        let mut allocator =
            allocator(AllocatorConfig::new().with_coalesce(CoalescePolicy::Recursive));

        let blocks: Vec<_> = (0..8).map(|_| allocator.allocate(0, 4096, 1).unwrap()).collect();
        for block in blocks {
            allocator.free(block).unwrap();
        }

        let pool_blocks: Vec<_> = allocator.pool_blocks(0).unwrap().collect();
        assert_eq!(pool_blocks.len(), 1);
        assert_eq!(pool_blocks[0].size, MIB);
        assert!(!pool_blocks[0].allocated);
        assert_eq!(allocator.stats().live_blocks, 1);
    }

    #[test]
    fn test_shared_allocator_across_threads() {
        let shared = SharedAllocator::new(allocator(AllocatorConfig::default()));

        std::thread::scope(|s| {
            for t in 0..4u64 {
                let shared = &shared;
                s.spawn(move || {
                    for i in 0..50u64 {
                        let allocation = shared.allocate(0, 64 << ((t + i) % 6), 64).unwrap();
                        shared.free(allocation).unwrap();
                    }
                });
            }
        });

        let stats = shared.stats();
        assert_eq!(stats.allocations, 200);
        assert_eq!(stats.frees, 200);
        assert_eq!(stats.bytes_allocated, 0);

        let allocator = shared.lock();
        assert!(allocator.pool(0).unwrap().is_consistent(&allocator.arena));
    }
}
