//! Linear (bump) allocator
//!
//! # Safety
//!
//! Allocation only moves a cursor forward through the region:
//! - Every block starts at or after the previous block's end, so blocks
//!   never overlap
//! - `used_memory` always equals `cursor - start` (padding included), so the
//!   `used + size + adjustment <= size` check keeps every block in bounds
//! - Individual blocks are never released; [`clear`](Allocator::clear) and
//!   [`rewind`](Allocator::rewind) hand memory back wholesale
//!
//! ## Invariants
//!
//! - Cursor only moves forward within a generation
//! - Checkpoints are validated by the generation counter, which every
//!   `clear` bumps

use core::ptr::NonNull;

#[cfg(feature = "logging")]
use tracing::debug;

use super::base::{Allocator, Usage};
use super::config::AllocatorConfig;
use super::region::Region;
use super::traits::Strategy;
use crate::error::{AllocError, AllocResult};
use crate::utils::adjustment;

mod checkpoint;

pub use checkpoint::{LinearCheckpoint, LinearScope};

/// Bump allocator over one region
///
/// # Examples
/// ```
/// use region_alloc::allocator::LinearAllocator;
///
/// let mut linear = LinearAllocator::new(4096)?;
/// let value = linear.allocate(42u64)?.expect("region has room");
/// assert_eq!(unsafe { *value.as_ptr() }, 42);
///
/// linear.clear();
/// assert_eq!(linear.used_memory(), 0);
/// # Ok::<(), region_alloc::error::AllocError>(())
/// ```
pub type LinearAllocator<'r> = Allocator<'r, Linear>;

/// Bump strategy state
#[derive(Debug)]
pub struct Linear {
    next_free: usize,
    generation: u32,
}

impl Linear {
    fn new(region: &Region<'_>) -> Self {
        Self {
            next_free: region.start_addr(),
            generation: 0,
        }
    }

    /// Releases everything after `position`, restoring `num_allocations`
    fn rewind_to(
        &mut self,
        region: &Region<'_>,
        usage: &mut Usage,
        dealloc_pattern: Option<u8>,
        position: usize,
        num_allocations: usize,
    ) {
        if let Some(pattern) = dealloc_pattern {
            // SAFETY: [position, next_free) was handed out and is being
            // reclaimed as a whole.
            unsafe { region.fill(position, self.next_free - position, pattern) };
        }
        self.next_free = position;
        usage.restore(position - region.start_addr(), num_allocations);
    }

    fn clear(&mut self, region: &Region<'_>, usage: &mut Usage, dealloc_pattern: Option<u8>) {
        self.rewind_to(region, usage, dealloc_pattern, region.start_addr(), 0);
        self.generation = self.generation.wrapping_add(1);
    }

    fn checkpoint(&self, usage: &Usage) -> LinearCheckpoint {
        LinearCheckpoint {
            position: self.next_free,
            num_allocations: usage.num_allocations(),
            generation: self.generation,
        }
    }

    fn rewind(
        &mut self,
        region: &Region<'_>,
        usage: &mut Usage,
        dealloc_pattern: Option<u8>,
        checkpoint: LinearCheckpoint,
    ) -> AllocResult<()> {
        if checkpoint.generation != self.generation {
            return Err(AllocError::invalid_state(
                "checkpoint.generation == generation",
                "checkpoint taken before the allocator was cleared",
            ));
        }
        if checkpoint.position < region.start_addr() || checkpoint.position > region.end_addr() {
            return Err(AllocError::invalid_state(
                "region.contains(checkpoint.position)",
                "checkpoint position out of bounds",
            ));
        }
        if checkpoint.position > self.next_free {
            return Err(AllocError::invalid_state(
                "checkpoint.position <= next_free",
                "checkpoint is ahead of the cursor",
            ));
        }

        self.rewind_to(
            region,
            usage,
            dealloc_pattern,
            checkpoint.position,
            checkpoint.num_allocations,
        );
        Ok(())
    }
}

impl Strategy for Linear {
    const NAME: &'static str = "linear";

    fn allocate(
        &mut self,
        region: &Region<'_>,
        usage: &mut Usage,
        size: usize,
        align: usize,
    ) -> AllocResult<Option<NonNull<u8>>> {
        let adjustment = adjustment(self.next_free, align);
        let Some(total) = size.checked_add(adjustment) else {
            return Ok(None);
        };
        if usage
            .used_memory()
            .checked_add(total)
            .is_none_or(|needed| needed > region.size())
        {
            return Ok(None);
        }

        let aligned = self.next_free + adjustment;
        self.next_free = aligned + size;
        usage.record_allocation(total);

        Ok(Some(region.block_at(aligned)))
    }

    fn validate(&self, _region: &Region<'_>, _ptr: NonNull<u8>) -> AllocResult<()> {
        Err(AllocError::unsupported("deallocate", Self::NAME))
    }

    unsafe fn deallocate(
        &mut self,
        _region: &Region<'_>,
        _usage: &mut Usage,
        _ptr: NonNull<u8>,
    ) -> AllocResult<()> {
        Err(AllocError::unsupported("deallocate", Self::NAME))
    }
}

impl Allocator<'static, Linear> {
    /// Creates a linear allocator over `size` bytes of owned memory
    pub fn new(size: usize) -> AllocResult<Self> {
        Ok(Self::with_config(Region::acquire(size)?, AllocatorConfig::default()))
    }
}

impl<'r> Allocator<'r, Linear> {
    /// Creates a linear allocator over a caller-provided buffer
    pub fn from_slice(buffer: &'r mut [u8]) -> AllocResult<Self> {
        Ok(Self::with_config(Region::borrowed(buffer)?, AllocatorConfig::default()))
    }

    /// Creates a linear allocator over `region` with an explicit configuration
    pub fn with_config(region: Region<'r>, config: AllocatorConfig) -> Self {
        let strategy = Linear::new(&region);
        Self::from_parts(region, config, strategy)
    }

    /// Releases every allocation at once and moves the cursor back to the
    /// region start
    ///
    /// Values placed in the region are not dropped.
    pub fn clear(&mut self) {
        let (region, config, state) = self.parts_mut();
        state
            .strategy
            .clear(region, &mut state.usage, config.dealloc_pattern);

        #[cfg(feature = "logging")]
        debug!(strategy = Linear::NAME, size = region.size(), "allocator cleared");
    }

    /// [`clear`](Self::clear) under the allocator lock
    pub fn clear_sync(&self) {
        let (region, config, mut state) = self.parts_locked();
        let state = &mut *state;
        state
            .strategy
            .clear(region, &mut state.usage, config.dealloc_pattern);

        #[cfg(feature = "logging")]
        debug!(strategy = Linear::NAME, size = region.size(), "allocator cleared");
    }

    /// Captures the current cursor position
    pub fn checkpoint(&mut self) -> LinearCheckpoint {
        let (_, _, state) = self.parts_mut();
        state.strategy.checkpoint(&state.usage)
    }

    /// [`checkpoint`](Self::checkpoint) under the allocator lock
    pub fn checkpoint_sync(&self) -> LinearCheckpoint {
        let (_, _, state) = self.parts_locked();
        state.strategy.checkpoint(&state.usage)
    }

    /// Releases everything allocated since `checkpoint` was taken
    ///
    /// Fails with `InvalidState` if the allocator was cleared since, or if
    /// the checkpoint lies ahead of the cursor.
    pub fn rewind(&mut self, checkpoint: LinearCheckpoint) -> AllocResult<()> {
        let (region, config, state) = self.parts_mut();
        state
            .strategy
            .rewind(region, &mut state.usage, config.dealloc_pattern, checkpoint)
    }

    /// [`rewind`](Self::rewind) under the allocator lock
    pub fn rewind_sync(&self, checkpoint: LinearCheckpoint) -> AllocResult<()> {
        let (region, config, mut state) = self.parts_locked();
        let state = &mut *state;
        state
            .strategy
            .rewind(region, &mut state.usage, config.dealloc_pattern, checkpoint)
    }

    /// Opens a scope that rewinds the allocator when dropped
    pub fn scope(&mut self) -> LinearScope<'_, 'r> {
        LinearScope::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn plain_config() -> AllocatorConfig {
        AllocatorConfig::production().with_stats(true)
    }

    #[test]
    fn test_bump_accounts_padding() {
        let mut buf = [0u8; 64];
        let region = Region::borrowed(&mut buf).unwrap();
        let start = region.start_addr();
        let mut linear = LinearAllocator::with_config(region, plain_config());

        let first = linear.allocate_raw(3, 1).unwrap().unwrap();
        let second = linear.allocate_raw(8, 8).unwrap().unwrap();

        assert_eq!(first.as_ptr() as usize, start);
        assert_eq!(second.as_ptr() as usize % 8, 0);
        let padding = second.as_ptr() as usize - (start + 3);
        assert_eq!(linear.used_memory(), 3 + padding + 8);
        assert_eq!(linear.num_allocations(), 2);

        linear.clear();
    }

    #[test]
    fn test_exhaustion_leaves_state_untouched() {
        let mut linear = LinearAllocator::with_config(Region::acquire(16).unwrap(), plain_config());
        linear.allocate_raw(10, 1).unwrap().unwrap();

        assert!(linear.allocate_raw(7, 1).unwrap().is_none());
        assert_eq!(linear.used_memory(), 10);
        assert_eq!(linear.num_allocations(), 1);
        assert_eq!(linear.stats().failed_allocations, 1);

        assert!(linear.allocate_raw(6, 1).unwrap().is_some());
        linear.clear();
    }

    #[test]
    fn test_oversized_request_is_exhaustion() {
        let mut linear = LinearAllocator::new(16).unwrap();
        assert!(linear.allocate_raw(usize::MAX, 1).unwrap().is_none());
        assert!(linear.allocate_raw(usize::MAX - 2, 8).unwrap().is_none());
    }

    #[test]
    fn test_deallocate_unsupported() {
        let mut linear = LinearAllocator::new(64).unwrap();
        let block = linear.allocate_raw(8, 8).unwrap().unwrap();
        let err = unsafe { linear.deallocate_raw(block.as_ptr()) }.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(linear.num_allocations(), 1);
        linear.clear();
    }

    #[test]
    fn test_clear_fills_pattern() {
        let mut buf = [0u8; 8];
        {
            let config = AllocatorConfig::production().with_patterns(None, Some(0xDD));
            let mut linear =
                LinearAllocator::with_config(Region::borrowed(&mut buf).unwrap(), config);
            linear.allocate_raw(4, 1).unwrap().unwrap();
            linear.clear();
        }
        assert_eq!(buf, [0xDD, 0xDD, 0xDD, 0xDD, 0, 0, 0, 0]);
    }

    #[test]
    fn test_checkpoint_rewind() {
        let mut linear = LinearAllocator::with_config(Region::acquire(64).unwrap(), plain_config());
        linear.allocate_raw(8, 1).unwrap().unwrap();
        let checkpoint = linear.checkpoint();

        let scratch = linear.allocate_raw(16, 8).unwrap().unwrap();
        linear.allocate_raw(16, 8).unwrap().unwrap();
        assert_eq!(linear.num_allocations(), 3);

        linear.rewind(checkpoint).unwrap();
        assert_eq!(linear.used_memory(), 8);
        assert_eq!(linear.num_allocations(), 1);

        // the same block comes back after a rewind
        let again = linear.allocate_raw(16, 8).unwrap().unwrap();
        assert_eq!(again, scratch);
        linear.clear();
    }

    #[test]
    fn test_rewind_rejects_future_and_stale_checkpoints() {
        let mut linear = LinearAllocator::new(64).unwrap();
        linear.allocate_raw(8, 1).unwrap().unwrap();
        let ahead = linear.checkpoint();

        linear.clear();
        let err = linear.rewind(ahead).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let fresh = linear.checkpoint();
        linear.allocate_raw(8, 1).unwrap().unwrap();
        let later = linear.checkpoint();
        linear.rewind(fresh).unwrap();
        assert_eq!(linear.rewind(later).unwrap_err().kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_scope_rewinds_on_drop() {
        let mut linear = LinearAllocator::new(64).unwrap();
        linear.allocate_raw(4, 1).unwrap().unwrap();
        {
            let mut scope = linear.scope();
            scope.allocate_raw(32, 8).unwrap().unwrap();
            assert!(scope.used_memory() > 32);
        }
        assert_eq!(linear.used_memory(), 4);
        assert_eq!(linear.num_allocations(), 1);
        linear.clear();
    }
}
