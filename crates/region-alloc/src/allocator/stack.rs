//! Stack (LIFO) allocator
//!
//! # Safety
//!
//! Each block is preceded by a one-byte header holding its adjustment:
//! - The header-aware adjustment is always at least one byte, so the header
//!   lies between the previous top and the aligned address
//! - Allocation checks both the usage bound and `top + adjustment + size <=
//!   end`, so blocks stay in bounds even after an out-of-order free
//! - Deallocation moves the top back to `address - adjustment`, which is the
//!   top the block was carved from
//!
//! ## Invariants
//!
//! - Callers free the most recent live block first
//! - With `verify_lifo`, out-of-order frees are rejected before any state
//!   changes; without it they are not detected
//!
//! # Memory Layout
//! ```text
//! [prev top][padding..][adj][block......][new top]
//!           '--- adjustment ---'
//! ```

use core::ptr::NonNull;

use super::base::{Allocator, Usage};
use super::config::AllocatorConfig;
use super::region::Region;
use super::traits::Strategy;
use crate::alloc_ensure;
use crate::error::{AllocError, AllocResult, ErrorKind};
use crate::utils::adjustment_with_header;

/// Bytes of header stored in front of every block
pub const HEADER_SIZE: usize = 1;

/// Largest alignment whose adjustment still fits the one-byte header
pub const MAX_ALIGNMENT: usize = 128;

/// LIFO allocator over one region
///
/// # Examples
/// ```
/// use region_alloc::allocator::StackAllocator;
///
/// let mut stack = StackAllocator::new(256)?;
/// let a = stack.allocate(1u32)?.expect("room for a");
/// let b = stack.allocate(2u64)?.expect("room for b");
///
/// unsafe {
///     stack.deallocate(b.as_ptr())?;
///     stack.deallocate(a.as_ptr())?;
/// }
/// assert_eq!(stack.used_memory(), 0);
/// # Ok::<(), region_alloc::error::AllocError>(())
/// ```
pub type StackAllocator<'r> = Allocator<'r, Stack>;

/// LIFO strategy state
#[derive(Debug)]
pub struct Stack {
    top: usize,
    previous_top: Option<usize>,
    /// Live block addresses, oldest first; only kept with `verify_lifo`
    live: Option<Vec<usize>>,
    dealloc_pattern: Option<u8>,
}

impl Stack {
    fn new(region: &Region<'_>, config: &AllocatorConfig) -> Self {
        Self {
            top: region.start_addr(),
            previous_top: None,
            live: config.verify_lifo.then(Vec::new),
            dealloc_pattern: config.dealloc_pattern,
        }
    }
}

impl Strategy for Stack {
    const NAME: &'static str = "stack";

    fn allocate(
        &mut self,
        region: &Region<'_>,
        usage: &mut Usage,
        size: usize,
        align: usize,
    ) -> AllocResult<Option<NonNull<u8>>> {
        alloc_ensure!(
            align <= MAX_ALIGNMENT,
            ErrorKind::InvalidAlignment,
            "stack alignment {} exceeds the one-byte header limit of {}",
            align,
            MAX_ALIGNMENT
        );

        let adjustment = adjustment_with_header(self.top, align, HEADER_SIZE);
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
        if (self.top - region.start_addr())
            .checked_add(total)
            .is_none_or(|end| end > region.size())
        {
            return Ok(None);
        }

        let header = u8::try_from(adjustment).map_err(|_| AllocError::invalid_alignment(align))?;
        let aligned = self.top + adjustment;

        // SAFETY: `aligned - 1` lies in [top, aligned), inside the region and
        // outside every live block.
        unsafe { region.ptr_at(aligned - HEADER_SIZE).write(header) };

        self.previous_top = Some(self.top);
        self.top = aligned + size;
        usage.record_allocation(total);
        if let Some(live) = &mut self.live {
            live.push(aligned);
        }

        Ok(Some(region.block_at(aligned)))
    }

    fn validate(&self, region: &Region<'_>, ptr: NonNull<u8>) -> AllocResult<()> {
        let address = ptr.as_ptr() as usize;
        if address <= region.start_addr() || address >= self.top {
            return Err(AllocError::invalid_pointer(address));
        }

        if let Some(live) = &self.live {
            match live.last() {
                Some(&expected) if expected == address => {}
                Some(&expected) => return Err(AllocError::out_of_order(address, expected)),
                None => return Err(AllocError::invalid_pointer(address)),
            }
        }

        Ok(())
    }

    unsafe fn deallocate(
        &mut self,
        region: &Region<'_>,
        usage: &mut Usage,
        ptr: NonNull<u8>,
    ) -> AllocResult<()> {
        self.validate(region, ptr)?;

        let address = ptr.as_ptr() as usize;
        // SAFETY: `allocate` wrote the header right before every block and
        // `validate` keeps `address - 1` inside the region.
        let adjustment = usize::from(unsafe { region.ptr_at(address - HEADER_SIZE).read() });
        if adjustment == 0 || adjustment > address - region.start_addr() {
            return Err(AllocError::invalid_pointer(address));
        }

        if let Some(pattern) = self.dealloc_pattern {
            // SAFETY: [address, top) is the block being released plus any
            // blocks above it, which the LIFO contract says are gone.
            unsafe { region.fill(address, self.top - address, pattern) };
        }

        usage.record_deallocation(self.top - address + adjustment);
        self.top = address - adjustment;
        if let Some(live) = &mut self.live {
            live.pop();
        }

        Ok(())
    }
}

impl Allocator<'static, Stack> {
    /// Creates a stack allocator over `size` bytes of owned memory
    pub fn new(size: usize) -> AllocResult<Self> {
        Ok(Self::with_config(Region::acquire(size)?, AllocatorConfig::default()))
    }
}

impl<'r> Allocator<'r, Stack> {
    /// Creates a stack allocator over a caller-provided buffer
    pub fn from_slice(buffer: &'r mut [u8]) -> AllocResult<Self> {
        Ok(Self::with_config(Region::borrowed(buffer)?, AllocatorConfig::default()))
    }

    /// Creates a stack allocator over `region` with an explicit configuration
    pub fn with_config(region: Region<'r>, config: AllocatorConfig) -> Self {
        let strategy = Stack::new(&region, &config);
        Self::from_parts(region, config, strategy)
    }

    /// Pointer to the next free byte
    pub fn top(&self) -> NonNull<u8> {
        let (region, _, state) = self.parts_locked();
        region.block_at(state.strategy.top)
    }

    /// Top before the most recent allocation, if any allocation was made
    pub fn previous_top(&self) -> Option<NonNull<u8>> {
        let (region, _, state) = self.parts_locked();
        state
            .strategy
            .previous_top
            .map(|address| region.block_at(address))
    }
}
