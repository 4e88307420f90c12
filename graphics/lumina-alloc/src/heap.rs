//! Memory Heaps and Types
//!
//! Snapshot of the device's memory properties and memory type selection.

use arrayvec::ArrayVec;
use bitflags::bitflags;

use crate::error::{AllocError, Result};

/// Most memory types a device can report.
pub const MAX_MEMORY_TYPES: usize = 32;

/// Most memory heaps a device can report.
pub const MAX_MEMORY_HEAPS: usize = 16;

// ============================================================================
// Flags
// ============================================================================

bitflags! {
    /// Memory type property flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryPropertyFlags: u32 {
        /// Device local memory.
        const DEVICE_LOCAL = 1 << 0;
        /// Host visible memory.
        const HOST_VISIBLE = 1 << 1;
        /// Host coherent memory.
        const HOST_COHERENT = 1 << 2;
        /// Host cached memory.
        const HOST_CACHED = 1 << 3;
        /// Lazily allocated.
        const LAZILY_ALLOCATED = 1 << 4;
        /// Protected memory.
        const PROTECTED = 1 << 5;
    }
}

impl Default for MemoryPropertyFlags {
    fn default() -> Self {
        MemoryPropertyFlags::empty()
    }
}

bitflags! {
    /// Memory heap flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HeapFlags: u32 {
        /// Heap is device local.
        const DEVICE_LOCAL = 1 << 0;
        /// Multi-instance heap.
        const MULTI_INSTANCE = 1 << 1;
    }
}

impl Default for HeapFlags {
    fn default() -> Self {
        HeapFlags::empty()
    }
}

// ============================================================================
// Heap / Type
// ============================================================================

/// A memory heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryHeap {
    /// Heap size in bytes.
    pub size: u64,
    /// Heap flags.
    pub flags: HeapFlags,
}

impl MemoryHeap {
    /// Create a new heap.
    pub const fn new(size: u64, flags: HeapFlags) -> Self {
        Self { size, flags }
    }

    /// Check if device local.
    pub fn is_device_local(&self) -> bool {
        self.flags.contains(HeapFlags::DEVICE_LOCAL)
    }
}

/// Memory type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType {
    /// Heap index.
    pub heap_index: u32,
    /// Property flags.
    pub flags: MemoryPropertyFlags,
}

impl MemoryType {
    /// Create a new memory type.
    pub const fn new(heap_index: u32, flags: MemoryPropertyFlags) -> Self {
        Self { heap_index, flags }
    }

    /// Check if device local.
    pub fn is_device_local(&self) -> bool {
        self.flags.contains(MemoryPropertyFlags::DEVICE_LOCAL)
    }

    /// Check if host visible.
    pub fn is_host_visible(&self) -> bool {
        self.flags.contains(MemoryPropertyFlags::HOST_VISIBLE)
    }
}

// ============================================================================
// Memory Properties
// ============================================================================

/// GPU memory properties, in the order the device reports them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryProperties {
    /// Memory heaps.
    heaps: ArrayVec<MemoryHeap, MAX_MEMORY_HEAPS>,
    /// Memory types. A type's index is its position.
    types: ArrayVec<MemoryType, MAX_MEMORY_TYPES>,
}

impl MemoryProperties {
    /// Create empty memory properties.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discrete GPU: VRAM heap plus a host heap.
    pub fn discrete() -> Self {
        let mut props = Self::new();
        props.heaps.push(MemoryHeap::new(4 * 1024 * 1024 * 1024, HeapFlags::DEVICE_LOCAL)); // 4GB VRAM
        props.heaps.push(MemoryHeap::new(16 * 1024 * 1024 * 1024, HeapFlags::empty())); // 16GB system
        props.types.push(MemoryType::new(0, MemoryPropertyFlags::DEVICE_LOCAL));
        props.types.push(MemoryType::new(
            1,
            MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
        ));
        props.types.push(MemoryType::new(
            1,
            MemoryPropertyFlags::HOST_VISIBLE
                | MemoryPropertyFlags::HOST_COHERENT
                | MemoryPropertyFlags::HOST_CACHED,
        ));
        props
    }

    /// Integrated GPU: one shared heap, every type device local.
    pub fn unified() -> Self {
        let mut props = Self::new();
        props.heaps.push(MemoryHeap::new(8 * 1024 * 1024 * 1024, HeapFlags::DEVICE_LOCAL));
        props.types.push(MemoryType::new(0, MemoryPropertyFlags::DEVICE_LOCAL));
        props.types.push(MemoryType::new(
            0,
            MemoryPropertyFlags::DEVICE_LOCAL
                | MemoryPropertyFlags::HOST_VISIBLE
                | MemoryPropertyFlags::HOST_COHERENT,
        ));
        props.types.push(MemoryType::new(
            0,
            MemoryPropertyFlags::DEVICE_LOCAL
                | MemoryPropertyFlags::HOST_VISIBLE
                | MemoryPropertyFlags::HOST_COHERENT
                | MemoryPropertyFlags::HOST_CACHED,
        ));
        props
    }

    /// Add a heap, returning its index. `None` when the table is full.
    pub fn add_heap(&mut self, heap: MemoryHeap) -> Option<u32> {
        let index = self.heaps.len() as u32;
        self.heaps.try_push(heap).ok()?;
        Some(index)
    }

    /// Add a memory type, returning its index. `None` when the table is full
    /// or the heap index is unknown.
    pub fn add_type(&mut self, memory_type: MemoryType) -> Option<u32> {
        if memory_type.heap_index as usize >= self.heaps.len() {
            return None;
        }
        let index = self.types.len() as u32;
        self.types.try_push(memory_type).ok()?;
        Some(index)
    }

    /// Memory heaps.
    pub fn heaps(&self) -> &[MemoryHeap] {
        &self.heaps
    }

    /// Memory types.
    pub fn types(&self) -> &[MemoryType] {
        &self.types
    }

    /// Get a memory type by index.
    pub fn memory_type(&self, index: u32) -> Option<&MemoryType> {
        self.types.get(index as usize)
    }

    /// Get a heap by index.
    pub fn heap(&self, index: u32) -> Option<&MemoryHeap> {
        self.heaps.get(index as usize)
    }

    /// Find a memory type.
    ///
    /// Returns the first type allowed by `type_bits` whose flags contain
    /// `required | preferred`, falling back to the first allowed type with
    /// `required` alone.
    pub fn select_memory_type(
        &self,
        type_bits: u32,
        required: MemoryPropertyFlags,
        preferred: MemoryPropertyFlags,
    ) -> Result<u32> {
        self.find_type(type_bits, required | preferred)
            .or_else(|| self.find_type(type_bits, required))
            .ok_or(AllocError::NoMatchingMemoryType)
    }

    fn find_type(&self, type_bits: u32, flags: MemoryPropertyFlags) -> Option<u32> {
        self.types
            .iter()
            .enumerate()
            .find(|(i, t)| (type_bits & (1 << i)) != 0 && t.flags.contains(flags))
            .map(|(i, _)| i as u32)
    }

    /// Find device local memory type.
    pub fn find_device_local(&self, type_bits: u32) -> Result<u32> {
        self.select_memory_type(
            type_bits,
            MemoryPropertyFlags::DEVICE_LOCAL,
            MemoryPropertyFlags::empty(),
        )
    }

    /// Find upload memory type.
    pub fn find_upload(&self, type_bits: u32) -> Result<u32> {
        self.select_memory_type(
            type_bits,
            MemoryPropertyFlags::HOST_VISIBLE,
            MemoryPropertyFlags::HOST_COHERENT,
        )
    }

    /// Find readback memory type.
    pub fn find_readback(&self, type_bits: u32) -> Result<u32> {
        self.select_memory_type(
            type_bits,
            MemoryPropertyFlags::HOST_VISIBLE,
            MemoryPropertyFlags::HOST_COHERENT | MemoryPropertyFlags::HOST_CACHED,
        )
    }

    /// Get total VRAM.
    pub fn total_vram(&self) -> u64 {
        self.heaps
            .iter()
            .filter(|h| h.is_device_local())
            .map(|h| h.size)
            .sum()
    }
}
