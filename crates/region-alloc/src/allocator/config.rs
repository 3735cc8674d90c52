//! Allocator configuration

/// What an allocator does when it is dropped with live allocations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeakPolicy {
    /// Log the leak and release the region anyway
    #[default]
    Log,
    /// Log the leak, then abort the process
    Abort,
}

/// Configuration shared by the linear, stack and pool allocators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Enable statistics tracking (peak usage, totals, failures)
    pub track_stats: bool,

    /// Fill pattern byte for newly allocated memory (for debugging)
    pub alloc_pattern: Option<u8>,
    /// Fill pattern byte for released memory (for debugging)
    pub dealloc_pattern: Option<u8>,

    /// Reject out-of-order stack deallocations instead of corrupting the top.
    /// Ignored by the linear and pool strategies.
    pub verify_lifo: bool,

    /// Behaviour when dropped with live allocations
    pub leak_policy: LeakPolicy,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            track_stats: cfg!(debug_assertions),
            alloc_pattern: if cfg!(debug_assertions) {
                Some(0xCC)
            } else {
                None
            },
            dealloc_pattern: if cfg!(debug_assertions) {
                Some(0xDD)
            } else {
                None
            },
            verify_lifo: cfg!(debug_assertions),
            leak_policy: LeakPolicy::Log,
        }
    }
}

impl AllocatorConfig {
    /// Production configuration - optimized for performance
    #[must_use]
    pub fn production() -> Self {
        Self {
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
            verify_lifo: false,
            leak_policy: LeakPolicy::Log,
        }
    }

    /// Debug configuration - optimized for debugging
    #[must_use]
    pub fn debug() -> Self {
        Self {
            track_stats: true,
            alloc_pattern: Some(0xCC),
            dealloc_pattern: Some(0xDD),
            verify_lifo: true,
            leak_policy: LeakPolicy::Abort,
        }
    }

    /// Performance configuration - minimal overhead, no stack order checks
    #[must_use]
    pub fn performance() -> Self {
        Self {
            track_stats: false,
            alloc_pattern: None,
            dealloc_pattern: None,
            verify_lifo: false,
            leak_policy: LeakPolicy::Log,
        }
    }

    /// Same configuration with statistics tracking switched on or off
    #[must_use]
    pub fn with_stats(mut self, track_stats: bool) -> Self {
        self.track_stats = track_stats;
        self
    }

    /// Same configuration with the given fill patterns
    #[must_use]
    pub fn with_patterns(mut self, alloc_pattern: Option<u8>, dealloc_pattern: Option<u8>) -> Self {
        self.alloc_pattern = alloc_pattern;
        self.dealloc_pattern = dealloc_pattern;
        self
    }

    /// Same configuration with the given leak policy
    #[must_use]
    pub fn with_leak_policy(mut self, leak_policy: LeakPolicy) -> Self {
        self.leak_policy = leak_policy;
        self
    }

    /// Same configuration with stack order verification switched on or off
    #[must_use]
    pub fn with_lifo_checks(mut self, verify_lifo: bool) -> Self {
        self.verify_lifo = verify_lifo;
        self
    }
}
