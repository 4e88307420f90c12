//! LUMINA Alloc - GPU Device Memory Sub-allocation
//!
//! This crate carves large device memory regions into power-of-two blocks
//! for buffers and images, so a renderer makes one device allocation per
//! memory type instead of one per resource.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            Allocator / SharedAllocator (facade)         │
//! ├──────────────────┬──────────────────┬───────────────────┤
//! │   Memory Types   │   Memory Pools   │   Block Arena     │
//! │ (select by flags)│ (buddy per type) │ (fixed records)   │
//! ├──────────────────┴──────────────────┴───────────────────┤
//! │          DeviceMemory (backend region provider)         │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use lumina_alloc::{
//!     AllocError, Allocator, AllocatorConfig, HeadlessDevice, MemoryPropertyFlags,
//!     MemoryRequirements,
//! };
//!
//! let mut allocator = Allocator::new(HeadlessDevice::default(), AllocatorConfig::default())?;
//!
//! let requirements = MemoryRequirements::new(100, 256, u32::MAX);
//! let vertices = allocator.allocate_for(
//!     &requirements,
//!     MemoryPropertyFlags::DEVICE_LOCAL,
//!     MemoryPropertyFlags::empty(),
//! )?;
//! assert_eq!((vertices.offset(), vertices.size()), (0, 256));
//!
//! allocator.free(vertices)?;
//! # Ok::<(), AllocError>(())
//! ```

#![no_std]
#![deny(unsafe_code)]

extern crate alloc;

pub mod allocator;
pub mod block;
pub mod config;
pub mod device;
pub mod error;
pub mod heap;
pub mod pool;

/// Prelude for common imports
pub mod prelude {
    pub use crate::allocator::{
        Allocation, Allocator, AllocatorStats, MemoryRequirements, SharedAllocator,
    };
    pub use crate::block::{BlockId, BlockInfo};
    pub use crate::config::{AllocatorConfig, CoalescePolicy};
    pub use crate::device::{DeviceMemory, HeadlessDevice, RegionHandle};
    pub use crate::error::{AllocError, DeviceError, Result};
    pub use crate::heap::{
        HeapFlags, MemoryHeap, MemoryProperties, MemoryPropertyFlags, MemoryType,
    };
    pub use crate::pool::{MemoryPool, PoolStats};
}

pub use prelude::*;
