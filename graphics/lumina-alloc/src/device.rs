//! Device Memory Interface
//!
//! The allocator never talks to a graphics API directly. The backend hands
//! it a [`DeviceMemory`] implementation that reports memory properties and
//! allocates or frees whole regions.

use alloc::vec::Vec;
use core::fmt;

use crate::error::DeviceError;
use crate::heap::MemoryProperties;

// ============================================================================
// Device Memory Trait
// ============================================================================

/// Region-level device memory provider.
pub trait DeviceMemory {
    /// Native device memory handle.
    type Memory: Copy + Eq + fmt::Debug;

    /// Snapshot of the device's memory heaps and types.
    fn memory_properties(&self) -> MemoryProperties;

    /// Allocate `size` bytes of memory type `memory_type_index`.
    fn allocate_memory(&mut self, memory_type_index: u32, size: u64) -> Result<Self::Memory, DeviceError>;

    /// Free memory previously returned by [`Self::allocate_memory`].
    fn free_memory(&mut self, memory: Self::Memory);
}

impl<D: DeviceMemory + ?Sized> DeviceMemory for &mut D {
    type Memory = D::Memory;

    fn memory_properties(&self) -> MemoryProperties {
        (**self).memory_properties()
    }

    fn allocate_memory(&mut self, memory_type_index: u32, size: u64) -> Result<Self::Memory, DeviceError> {
        (**self).allocate_memory(memory_type_index, size)
    }

    fn free_memory(&mut self, memory: Self::Memory) {
        (**self).free_memory(memory)
    }
}

// ============================================================================
// Headless Device
// ============================================================================

/// Handle to a region of a [`HeadlessDevice`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct RegionHandle(pub u64);

/// A live region of a [`HeadlessDevice`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Region {
    handle: RegionHandle,
    memory_type_index: u32,
    size: u64,
}

/// Device without a GPU: tracks region bookkeeping and enforces heap sizes.
///
/// Useful for running the allocator in tools and tests.
#[derive(Debug, Clone)]
pub struct HeadlessDevice {
    properties: MemoryProperties,
    regions: Vec<Region>,
    next_handle: u64,
    region_limit: Option<usize>,
    total_allocations: u64,
}

impl HeadlessDevice {
    /// Create a device reporting `properties`.
    pub fn new(properties: MemoryProperties) -> Self {
        Self {
            properties,
            regions: Vec::new(),
            next_handle: 1,
            region_limit: None,
            total_allocations: 0,
        }
    }

    /// Fail allocations once `limit` regions are live.
    pub fn with_region_limit(mut self, limit: usize) -> Self {
        self.region_limit = Some(limit);
        self
    }

    /// Number of live regions.
    pub fn live_regions(&self) -> usize {
        self.regions.len()
    }

    /// Regions ever allocated.
    pub fn total_allocations(&self) -> u64 {
        self.total_allocations
    }

    /// Bytes live in heap `heap_index`.
    pub fn heap_usage(&self, heap_index: u32) -> u64 {
        self.regions
            .iter()
            .filter(|r| {
                self.properties
                    .memory_type(r.memory_type_index)
                    .map_or(false, |t| t.heap_index == heap_index)
            })
            .map(|r| r.size)
            .sum()
    }

    /// Check if `handle` is live.
    pub fn is_live(&self, handle: RegionHandle) -> bool {
        self.regions.iter().any(|r| r.handle == handle)
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new(MemoryProperties::discrete())
    }
}

impl DeviceMemory for HeadlessDevice {
    type Memory = RegionHandle;

    fn memory_properties(&self) -> MemoryProperties {
        self.properties.clone()
    }

    fn allocate_memory(&mut self, memory_type_index: u32, size: u64) -> Result<RegionHandle, DeviceError> {
        let heap_index = self
            .properties
            .memory_type(memory_type_index)
            .ok_or(DeviceError::InvalidMemoryType)?
            .heap_index;

        if self.region_limit.map_or(false, |limit| self.regions.len() >= limit) {
            return Err(DeviceError::OutOfDeviceMemory);
        }

        let heap_size = self.properties.heap(heap_index).map_or(0, |h| h.size);
        if self.heap_usage(heap_index).saturating_add(size) > heap_size {
            return Err(DeviceError::OutOfDeviceMemory);
        }

        let handle = RegionHandle(self.next_handle);
        self.next_handle += 1;
        self.total_allocations += 1;
        self.regions.push(Region {
            handle,
            memory_type_index,
            size,
        });

        Ok(handle)
    }

    fn free_memory(&mut self, memory: RegionHandle) {
        match self.regions.iter().position(|r| r.handle == memory) {
            Some(pos) => {
                self.regions.swap_remove(pos);
            },
            None => log::warn!("headless device: free of unknown region {:?}", memory),
        }
    }
}
