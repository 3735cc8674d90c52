//! Strategy seam and memory usage reporting
//!
//! # Safety
//!
//! [`Strategy::deallocate`] is unsafe: the pointer must come from a previous
//! `allocate` on the same strategy and region and must still be live.

use core::ptr::NonNull;

use super::base::Usage;
use super::region::Region;
use super::sealed::Sealed;
use crate::error::AllocResult;

/// Raw byte-level primitive behind every typed allocator operation
///
/// Implemented by [`Linear`](super::Linear), [`Stack`](super::Stack) and
/// [`Pool`](super::Pool). The allocator base checks `size > 0`, power-of-two
/// alignment and non-null pointers before calling in.
pub trait Strategy: Sealed + Send {
    /// Name used in logs and error messages
    const NAME: &'static str;

    /// Reserves `size` bytes aligned to `align`
    ///
    /// Returns `Ok(None)` without touching any state when the region cannot
    /// satisfy the request.
    fn allocate(
        &mut self,
        region: &Region<'_>,
        usage: &mut Usage,
        size: usize,
        align: usize,
    ) -> AllocResult<Option<NonNull<u8>>>;

    /// Checks that `ptr` may be deallocated right now, without changing state
    ///
    /// Typed deallocation calls this before dropping any value so that a
    /// rejected free leaves the values intact.
    fn validate(&self, region: &Region<'_>, ptr: NonNull<u8>) -> AllocResult<()>;

    /// Returns a block to the strategy
    ///
    /// # Safety
    /// `ptr` must have been returned by `allocate` on this strategy and region
    /// and must not have been deallocated since.
    unsafe fn deallocate(
        &mut self,
        region: &Region<'_>,
        usage: &mut Usage,
        ptr: NonNull<u8>,
    ) -> AllocResult<()>;
}

/// Byte-level occupancy of a memory region
///
/// Implemented by every [`Allocator`](super::Allocator), where used memory
/// includes alignment padding and headers.
pub trait MemoryUsage {
    /// Bytes currently handed out
    fn used_memory(&self) -> usize;

    /// Bytes still free, if bounded
    fn available_memory(&self) -> Option<usize>;

    /// Capacity in bytes, if bounded
    fn total_memory(&self) -> Option<usize> {
        self.available_memory()
            .map(|available| self.used_memory() + available)
    }

    /// Occupancy snapshot
    fn memory_usage(&self) -> BasicMemoryUsage {
        let used = self.used_memory();
        let total = self.total_memory();
        BasicMemoryUsage {
            used,
            available: self.available_memory(),
            total,
            usage_percent: total.map(|total| {
                if total == 0 { 0.0 } else { used as f32 / total as f32 * 100.0 }
            }),
        }
    }
}

/// Snapshot returned by [`MemoryUsage::memory_usage`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasicMemoryUsage {
    pub used: usize,
    pub available: Option<usize>,
    pub total: Option<usize>,
    /// `used / total` in percent
    pub usage_percent: Option<f32>,
}

impl core::fmt::Display for BasicMemoryUsage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} bytes used", self.used)?;
        if let (Some(total), Some(percent)) = (self.total, self.usage_percent) {
            write!(f, " of {total} ({percent:.1}%)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        used: usize,
        available: usize,
    }

    impl MemoryUsage for Fixed {
        fn used_memory(&self) -> usize {
            self.used
        }

        fn available_memory(&self) -> Option<usize> {
            Some(self.available)
        }
    }

    #[test]
    fn test_memory_usage_defaults() {
        let usage = Fixed { used: 25, available: 75 }.memory_usage();
        assert_eq!(usage.total, Some(100));
        assert_eq!(usage.usage_percent, Some(25.0));
        assert_eq!(usage.to_string(), "25 bytes used of 100 (25.0%)");
    }
}
