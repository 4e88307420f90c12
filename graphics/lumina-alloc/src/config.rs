//! Allocator Configuration
//!
//! Capacity limits and policies fixed at allocator construction.

use static_assertions::const_assert;

use crate::error::{AllocError, Result};

// ============================================================================
// Defaults
// ============================================================================

/// Size of each pool's device memory region (1 MiB).
pub const DEFAULT_REGION_SIZE: u64 = 1024 * 1024;

/// Maximum number of pools alive at once.
pub const DEFAULT_MAX_POOLS: usize = 10;

/// Maximum number of block records alive at once.
pub const DEFAULT_MAX_BLOCKS: usize = 1000;

const_assert!(DEFAULT_REGION_SIZE.is_power_of_two());
const_assert!(DEFAULT_MAX_POOLS > 0);
// A pool needs its root record plus two records per split.
const_assert!(DEFAULT_MAX_BLOCKS >= 3);
const_assert!(DEFAULT_MAX_BLOCKS <= u32::MAX as usize);

// ============================================================================
// Coalesce Policy
// ============================================================================

/// How far a free call merges buddies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CoalescePolicy {
    /// One merge attempt per free call.
    #[default]
    Single,
    /// Keep merging the enlarged block with its buddy up the tree.
    Recursive,
}

// ============================================================================
// Allocator Config
// ============================================================================

/// Allocator create info.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Bytes requested from the device for each pool. Power of two.
    pub region_size: u64,
    /// Pool table capacity.
    pub max_pools: usize,
    /// Block record arena capacity.
    pub max_blocks: usize,
    /// Coalescing policy on free.
    pub coalesce: CoalescePolicy,
    /// Panic on capacity violations instead of returning errors.
    pub strict: bool,
}

impl AllocatorConfig {
    /// Creates the default configuration.
    pub const fn new() -> Self {
        Self {
            region_size: DEFAULT_REGION_SIZE,
            max_pools: DEFAULT_MAX_POOLS,
            max_blocks: DEFAULT_MAX_BLOCKS,
            coalesce: CoalescePolicy::Single,
            strict: false,
        }
    }

    /// With region size
    pub const fn with_region_size(mut self, bytes: u64) -> Self {
        self.region_size = bytes;
        self
    }

    /// With max pools
    pub const fn with_max_pools(mut self, count: usize) -> Self {
        self.max_pools = count;
        self
    }

    /// With max blocks
    pub const fn with_max_blocks(mut self, count: usize) -> Self {
        self.max_blocks = count;
        self
    }

    /// With coalesce policy
    pub const fn with_coalesce(mut self, policy: CoalescePolicy) -> Self {
        self.coalesce = policy;
        self
    }

    /// Strict (fail-fast) mode
    pub const fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Check the limits are usable.
    pub fn validate(&self) -> Result<()> {
        if !self.region_size.is_power_of_two() {
            return Err(AllocError::InvalidConfig("region size must be a power of two"));
        }
        if self.max_pools == 0 {
            return Err(AllocError::InvalidConfig("max pools must be non-zero"));
        }
        if self.max_pools > u32::MAX as usize {
            return Err(AllocError::InvalidConfig("max pools exceeds u32 range"));
        }
        if self.max_blocks == 0 {
            return Err(AllocError::InvalidConfig("max blocks must be non-zero"));
        }
        if self.max_blocks > u32::MAX as usize {
            return Err(AllocError::InvalidConfig("max blocks exceeds u32 range"));
        }
        Ok(())
    }
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AllocatorConfig::default();
        assert_eq!(config.region_size, 1024 * 1024);
        assert_eq!(config.max_pools, 10);
        assert_eq!(config.max_blocks, 1000);
        assert_eq!(config.coalesce, CoalescePolicy::Single);
        assert!(!config.strict);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = AllocatorConfig::new()
            .with_region_size(4096)
            .with_max_pools(2)
            .with_max_blocks(64)
            .with_coalesce(CoalescePolicy::Recursive)
            .strict();

        assert_eq!(config.region_size, 4096);
        assert_eq!(config.max_pools, 2);
        assert_eq!(config.max_blocks, 64);
        assert_eq!(config.coalesce, CoalescePolicy::Recursive);
        assert!(config.strict);
    }

    #[test]
    fn test_validate_rejects_bad_limits() {
        assert!(matches!(
            AllocatorConfig::new().with_region_size(3000).validate(),
            Err(AllocError::InvalidConfig(_))
        ));
        assert!(matches!(
            AllocatorConfig::new().with_region_size(0).validate(),
            Err(AllocError::InvalidConfig(_))
        ));
        assert!(matches!(
            AllocatorConfig::new().with_max_pools(0).validate(),
            Err(AllocError::InvalidConfig(_))
        ));
        assert!(matches!(
            AllocatorConfig::new().with_max_blocks(0).validate(),
            Err(AllocError::InvalidConfig(_))
        ));
    }
}
