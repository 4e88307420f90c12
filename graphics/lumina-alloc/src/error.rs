//! Error Handling
//!
//! Error types for the device memory sub-allocator.
//!
//! Every failure is reported as a value. Capacity violations can be turned
//! into panics through [`AllocatorConfig::strict`](crate::AllocatorConfig).

use core::fmt;

// ============================================================================
// Result Type
// ============================================================================

/// Allocator result type alias.
pub type Result<T> = core::result::Result<T, AllocError>;

// ============================================================================
// Allocator Error
// ============================================================================

/// Allocator error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AllocError {
    // ========================================================================
    // Capacity Errors
    // ========================================================================
    /// No free block record slot is left in the arena.
    ArenaExhausted,
    /// A new memory type was requested but every pool slot is taken.
    PoolTableFull,

    // ========================================================================
    // Allocation Errors
    // ========================================================================
    /// No memory type satisfies the required property flags.
    NoMatchingMemoryType,
    /// The pool has no unallocated block large enough for the request.
    NoFit,
    /// The device could not provide a backing region.
    DeviceAllocationFailure(DeviceError),

    // ========================================================================
    // Caller Errors
    // ========================================================================
    /// Alignment is zero or not a power of two.
    InvalidAlignment,
    /// The allocation does not belong to any live block.
    InvalidHandle,
    /// The block is already free.
    DoubleFree,
    /// The allocator configuration is unusable.
    InvalidConfig(&'static str),
}

impl AllocError {
    /// Capacity violations signal an undersized configuration.
    pub const fn is_capacity_violation(&self) -> bool {
        matches!(self, Self::ArenaExhausted | Self::PoolTableFull)
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Capacity
            Self::ArenaExhausted => write!(f, "block record arena exhausted"),
            Self::PoolTableFull => write!(f, "memory pool table full"),

            // Allocation
            Self::NoMatchingMemoryType => write!(f, "no matching memory type"),
            Self::NoFit => write!(f, "no free block large enough"),
            Self::DeviceAllocationFailure(e) => write!(f, "device allocation failed: {}", e),

            // Caller
            Self::InvalidAlignment => write!(f, "alignment is not a power of two"),
            Self::InvalidHandle => write!(f, "invalid allocation handle"),
            Self::DoubleFree => write!(f, "block freed twice"),
            Self::InvalidConfig(reason) => write!(f, "invalid allocator config: {}", reason),
        }
    }
}

// ============================================================================
// Device Error
// ============================================================================

/// Failure reported by the device memory collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// Device memory exhausted.
    OutOfDeviceMemory,
    /// Host memory exhausted.
    OutOfHostMemory,
    /// The device does not expose the requested memory type.
    InvalidMemoryType,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfDeviceMemory => write!(f, "out of device memory"),
            Self::OutOfHostMemory => write!(f, "out of host memory"),
            Self::InvalidMemoryType => write!(f, "invalid memory type"),
        }
    }
}

impl From<DeviceError> for AllocError {
    fn from(e: DeviceError) -> Self {
        AllocError::DeviceAllocationFailure(e)
    }
}
